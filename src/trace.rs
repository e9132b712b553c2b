//! Observation hooks for debuggers and test harnesses.
//!
//! The core never prints. A host that wants an execution trace installs a
//! [`TraceSink`] on the CPU (and optionally the address space); every hook
//! has an empty default body, so a sink implements only what it cares about.

use crate::opcodes::Opcode;

/// Receiver for execution and I/O events.
///
/// All methods default to no-ops. Implementations must not assume they see
/// every event kind: the CPU reports instructions and interrupts, the
/// address space reports I/O-window traffic, and each sink is installed
/// independently.
pub trait TraceSink {
    /// An instruction is about to execute. `pc` is the address of the opcode
    /// byte, `meta` its decode-table entry, and the registers are the values
    /// going into the instruction.
    fn instruction(&mut self, pc: u16, opcode: u8, meta: &Opcode, a: u8, x: u8, y: u8, p: u8) {
        let _ = (pc, opcode, meta, a, x, y, p);
    }

    /// An interrupt was accepted; the CPU is about to vector to `target`.
    fn interrupt(&mut self, return_pc: u16, target: u16) {
        let _ = (return_pc, target);
    }

    /// A read hit the I/O window ($D000-$DFFF). `value` is what the chip
    /// returned.
    fn io_read(&mut self, addr: u16, value: u8) {
        let _ = (addr, value);
    }

    /// A write hit the I/O window ($D000-$DFFF).
    fn io_write(&mut self, addr: u16, value: u8) {
        let _ = (addr, value);
    }
}
