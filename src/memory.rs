//! # Memory Bus and Banked Address Space
//!
//! [`MemoryBus`] is the seam between the CPU and whatever it executes out
//! of: tests run against [`FlatRam`], the machine runs against
//! [`AddressSpace`]. Reads take `&mut self` because reading is not passive
//! on this bus: a CIA flag-register read clears the flags, a timer read
//! catches the counter up to the clock.
//!
//! ## Banking
//!
//! [`AddressSpace`] holds 64K of RAM plus the KERNAL, BASIC, and character
//! ROM images. The 6510's on-chip port at addresses 0 (direction register)
//! and 1 (data register) selects which overlays are visible; the decode is
//! recomputed on every access from the effective port value, so a bank
//! switch takes effect on the very next cycle. ROMs only ever overlay
//! reads; a write under a visible ROM always lands in the RAM below.
//!
//! The I/O window at $D000-$DFFF routes to the CIAs and the video
//! collaborator. The SID range and the expansion areas have no device
//! behind them and read as open bus.

use crate::devices::cia::Cia;
use crate::devices::VideoDevice;
use crate::trace::TraceSink;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Byte-addressed bus with side-effecting reads.
pub trait MemoryBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

/// 64K of plain RAM. The memory bus the CPU tests run against.
pub struct FlatRam {
    bytes: Box<[u8; 0x10000]>,
}

impl FlatRam {
    pub fn new() -> Self {
        FlatRam { bytes: Box::new([0; 0x10000]) }
    }

    /// Copy `data` into memory starting at `addr`.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.bytes[addr as usize + i] = byte;
        }
    }
}

impl Default for FlatRam {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus for FlatRam {
    fn read(&mut self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize] = value;
    }
}

/// Bank-control bits of the 6510 port.
pub mod bank {
    /// With HIRAM, makes BASIC ROM visible at $A000-$BFFF.
    pub const LORAM: u8 = 0x01;
    /// Makes KERNAL ROM visible at $E000-$FFFF.
    pub const HIRAM: u8 = 0x02;
    /// I/O space at $D000-$DFFF when set, character ROM when clear.
    pub const CHAREN: u8 = 0x04;
}

/// Power-on value of the port direction register.
pub const RESET_DDR: u8 = 0x2F;
/// Power-on value of the port data register: all three ROM overlays in.
pub const RESET_PORT: u8 = 0x37;

const KERNAL_BASE: u16 = 0xE000;
const BASIC_BASE: u16 = 0xA000;
const IO_BASE: u16 = 0xD000;

/// Sizes of the three ROM images in bytes.
pub const KERNAL_LEN: usize = 8192;
pub const BASIC_LEN: usize = 8192;
pub const CHARGEN_LEN: usize = 4096;

/// The three ROM images the address space overlays onto RAM.
pub struct RomSet {
    pub kernal: Box<[u8; KERNAL_LEN]>,
    pub basic: Box<[u8; BASIC_LEN]>,
    pub chargen: Box<[u8; CHARGEN_LEN]>,
}

impl RomSet {
    /// A set of all-zero images, for tests and headless bring-up.
    pub fn blank() -> Self {
        RomSet {
            kernal: Box::new([0; KERNAL_LEN]),
            basic: Box::new([0; BASIC_LEN]),
            chargen: Box::new([0; CHARGEN_LEN]),
        }
    }

    /// Load the three images from files, checking each is exactly the size
    /// of the chip it stands in for.
    pub fn from_files(kernal: &Path, basic: &Path, chargen: &Path) -> Result<Self, RomError> {
        Ok(RomSet {
            kernal: load_rom(kernal)?,
            basic: load_rom(basic)?,
            chargen: load_rom(chargen)?,
        })
    }
}

fn load_rom<const N: usize>(path: &Path) -> Result<Box<[u8; N]>, RomError> {
    let data = fs::read(path).map_err(|source| RomError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image: Box<[u8; N]> = data.into_boxed_slice().try_into().map_err(
        |data: Box<[u8]>| RomError::BadLength {
            path: path.to_path_buf(),
            expected: N,
            actual: data.len(),
        },
    )?;
    Ok(image)
}

/// Failure to load a ROM image.
#[derive(Debug)]
pub enum RomError {
    Io { path: PathBuf, source: io::Error },
    BadLength { path: PathBuf, expected: usize, actual: usize },
}

impl fmt::Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RomError::Io { path, source } => {
                write!(f, "failed to read ROM image {}: {}", path.display(), source)
            }
            RomError::BadLength { path, expected, actual } => write!(
                f,
                "ROM image {} is {} bytes, expected {}",
                path.display(),
                actual,
                expected
            ),
        }
    }
}

impl std::error::Error for RomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RomError::Io { source, .. } => Some(source),
            RomError::BadLength { .. } => None,
        }
    }
}

/// The banked 64K address space of the machine.
pub struct AddressSpace {
    ram: Box<[u8; 0x10000]>,
    roms: RomSet,
    ddr: u8,
    port: u8,
    pub cia1: Cia,
    pub cia2: Cia,
    video: Box<dyn VideoDevice>,
    trace: Option<Box<dyn TraceSink>>,
}

impl AddressSpace {
    pub fn new(roms: RomSet, cia1: Cia, cia2: Cia, video: Box<dyn VideoDevice>) -> Self {
        AddressSpace {
            ram: Box::new([0; 0x10000]),
            roms,
            ddr: RESET_DDR,
            port: RESET_PORT,
            cia1,
            cia2,
            video,
            trace: None,
        }
    }

    /// Install an I/O trace sink, replacing any previous one.
    pub fn set_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Restore the power-on banking state and reset both CIAs. RAM contents
    /// survive, as they do through a real reset.
    pub fn reset(&mut self) {
        self.ddr = RESET_DDR;
        self.port = RESET_PORT;
        self.cia1.reset();
        self.cia2.reset();
    }

    /// The video collaborator, for hosts that need to reach it.
    pub fn video_mut(&mut self) -> &mut dyn VideoDevice {
        self.video.as_mut()
    }

    /// Port value as the processor sees it: input bits (DDR 0) float up to
    /// 1 unless externally driven; the top two bits have no pin.
    pub fn effective_port(&self) -> u8 {
        (self.port | !self.ddr) & 0x3F
    }

    /// Write straight into the underlying RAM, bypassing banking. Used to
    /// seed test programs and by hosts injecting data.
    pub fn poke_ram(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0xD400..=0xD7FF => 0xFF, // SID, unimplemented
            0xDE00..=0xDFFF => 0xFF, // expansion I/O
            0xDD00..=0xDDFF => self.cia2.read(addr),
            0xDC00..=0xDCFF => self.cia1.read(addr),
            _ => self.video.read8(addr),
        };
        if let Some(sink) = self.trace.as_mut() {
            sink.io_read(addr, value);
        }
        value
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        if let Some(sink) = self.trace.as_mut() {
            sink.io_write(addr, value);
        }
        match addr {
            0xD400..=0xD7FF => {} // SID, unimplemented
            0xDE00..=0xDFFF => {} // expansion I/O
            0xDD00..=0xDDFF => self.cia2.write(addr, value),
            0xDC00..=0xDCFF => self.cia1.write(addr, value),
            _ => self.video.write8(addr, value),
        }
    }
}

impl MemoryBus for AddressSpace {
    fn read(&mut self, addr: u16) -> u8 {
        if addr == 0 {
            return self.ddr;
        }
        if addr == 1 {
            return self.effective_port();
        }

        let port = self.effective_port();
        match addr {
            KERNAL_BASE..=0xFFFF if port & bank::HIRAM != 0 => {
                self.roms.kernal[(addr - KERNAL_BASE) as usize]
            }
            IO_BASE..=0xDFFF if port & (bank::HIRAM | bank::LORAM) != 0 => {
                if port & bank::CHAREN != 0 {
                    self.io_read(addr)
                } else {
                    self.roms.chargen[(addr - IO_BASE) as usize]
                }
            }
            BASIC_BASE..=0xBFFF
                if port & (bank::HIRAM | bank::LORAM) == bank::HIRAM | bank::LORAM =>
            {
                self.roms.basic[(addr - BASIC_BASE) as usize]
            }
            _ => self.ram[addr as usize],
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        if addr == 0 {
            self.ddr = value;
        } else if addr == 1 {
            self.port = value;
        } else if (IO_BASE..=0xDFFF).contains(&addr) {
            let port = self.effective_port();
            if port & (bank::HIRAM | bank::LORAM) != 0 && port & bank::CHAREN != 0 {
                self.io_write(addr, value);
                return;
            }
        }
        // Everything that is not a routed I/O access lands in RAM, including
        // writes under a visible ROM and the RAM below the port registers.
        self.ram[addr as usize] = value;
    }
}
