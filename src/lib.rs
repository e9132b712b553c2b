//! # Commodore 64 Emulator Core
//!
//! A cycle-counted C64 core: NMOS 6502 CPU, the banked 64K address space
//! with KERNAL/BASIC/character ROM overlays, two CIA timer/interrupt chips,
//! and a discrete-event scheduler that lets timers run for thousands of
//! cycles without being ticked.
//!
//! Presentation stays outside the core: video is a collaborator behind the
//! [`VideoDevice`] trait, host input feeds the keyboard matrix through a
//! shared [`KeyStateHandle`], and diagnostics go through an injectable
//! [`TraceSink`] instead of any built-in output.
//!
//! ## Quick Start
//!
//! ```rust
//! use c64_core::{C64System, RomSet};
//!
//! // Real use loads dumped images with RomSet::from_files; a hand-built
//! // one-instruction KERNAL is enough to bring the machine up.
//! let mut roms = RomSet::blank();
//! roms.kernal[0..3].copy_from_slice(&[0x4C, 0x00, 0xE0]); // JMP $E000
//! roms.kernal[0x1FFC] = 0x00; // reset vector -> $E000
//! roms.kernal[0x1FFD] = 0xE0;
//!
//! let mut system = C64System::new(roms);
//! assert_eq!(system.cpu.pc, 0xE000);
//!
//! // Run roughly one PAL frame.
//! system.run_cycles(20000);
//! assert!(system.cycles() >= 20000);
//! ```
//!
//! ## Architecture
//!
//! - **Table-driven CPU**: all opcode metadata lives in a single 256-entry
//!   table; the executor is one dispatch over it.
//! - **Trait-based bus**: the CPU is generic over [`MemoryBus`], so tests
//!   run against [`FlatRam`] and the machine against [`AddressSpace`].
//! - **Shared handles**: the clock, interrupt line, and scheduler are
//!   cheap cloneable handles, sidestepping the mutual references between
//!   CPU, memory, and chips in a single-threaded machine.
//! - **Event-driven timers**: a CIA timer predicts its underflow cycle and
//!   parks it on the [`Scheduler`]; counters are reconciled lazily on
//!   access.
//!
//! ## Modules
//!
//! - `cpu` - processor state and execution
//! - `addressing`, `opcodes` - decode tables
//! - `memory` - memory bus trait, banking, ROM images
//! - `devices` - CIA chips and the keyboard matrix
//! - `scheduler` - cycle clock and event queue
//! - `system` - the orchestrator wiring it all together
//! - `trace` - injectable observation hooks

pub mod addressing;
pub mod cpu;
pub mod devices;
pub mod memory;
pub mod opcodes;
pub mod scheduler;
pub mod system;
pub mod trace;

pub use addressing::AddressingMode;
pub use cpu::{flags, Cpu, IrqLine, IRQ_VECTOR, RESET_VECTOR};
pub use devices::cia::{Cia, TimerId};
pub use devices::keyboard::{C64Key, KeyStateHandle, MatrixKeyboard};
pub use devices::{NullVideo, PortHook, VideoDevice};
pub use memory::{AddressSpace, FlatRam, MemoryBus, RomError, RomSet};
pub use opcodes::{Mnemonic, Opcode, OPCODE_TABLE};
pub use scheduler::{Clock, EventSlot, Scheduler, SchedulerHandle};
pub use system::C64System;
pub use trace::TraceSink;
