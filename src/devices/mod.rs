//! Peripheral chips and the collaborator seams they plug into.
//!
//! The core emulates the CIAs itself; video rendering and host input are
//! external collaborators reached through the [`VideoDevice`] and
//! [`PortHook`] traits.

pub mod cia;
pub mod keyboard;

/// Collaborator owning the VIC-II register file and color RAM.
///
/// The address space routes every I/O-window access that is not a CIA, SID,
/// or expansion address here ($D000-$D3FF registers and $D800-$DBFF color
/// RAM). The orchestrator also grants it time after every instruction.
pub trait VideoDevice {
    fn read8(&mut self, addr: u16) -> u8;
    fn write8(&mut self, addr: u16, value: u8);
    /// `cycles` CPU cycles have elapsed since the previous call.
    fn advance(&mut self, cycles: u64);
}

/// Video collaborator for a machine with no display attached. Reads return
/// the open-bus value and writes vanish.
#[derive(Debug, Default)]
pub struct NullVideo;

impl VideoDevice for NullVideo {
    fn read8(&mut self, _addr: u16) -> u8 {
        0xFF
    }

    fn write8(&mut self, _addr: u16, _value: u8) {}

    fn advance(&mut self, _cycles: u64) {}
}

/// Pre-read hook on a CIA's port registers.
///
/// Called just before PRA or PRB is returned to the CPU, after undriven
/// bits have floated up to 1. The hook may pull input bits low to model
/// whatever hardware hangs off the port; on CIA 1 that is the keyboard
/// matrix.
pub trait PortHook {
    fn update_port(&mut self, pra: &mut u8, prb: &mut u8, ddra: u8, ddrb: u8);
}
