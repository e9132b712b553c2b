//! # Addressing Modes
//!
//! The 13 addressing modes of the 6502. The mode determines how the CPU
//! interprets the operand bytes following an opcode and how it computes the
//! effective address for the operation. Effective-address computation itself
//! lives on the CPU (`Cpu::operand_address`), since it needs register state.

/// 6502 addressing mode enumeration.
///
/// # Operand sizes
///
/// - **0 bytes**: Implicit, Accumulator
/// - **1 byte**: Immediate, ZeroPage, ZeroPageX, ZeroPageY, Relative,
///   IndirectX, IndirectY
/// - **2 bytes**: Absolute, AbsoluteX, AbsoluteY, Indirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// No operand, operation implied by the instruction (CLC, RTS, NOP).
    Implicit,

    /// Operates directly on the accumulator (ASL A, ROR A).
    Accumulator,

    /// 8-bit constant in the instruction stream (LDA #$10).
    Immediate,

    /// 8-bit address into page zero (LDA $80).
    ZeroPage,

    /// Zero-page address plus X, wrapping within page zero (LDA $80,X).
    ZeroPageX,

    /// Zero-page address plus Y, wrapping within page zero (LDX $80,Y).
    ZeroPageY,

    /// Signed 8-bit branch offset, relative to the PC after the operand.
    Relative,

    /// Full 16-bit address (JMP $1234).
    Absolute,

    /// 16-bit address plus X (LDA $1234,X); +1 cycle on page cross for reads.
    AbsoluteX,

    /// 16-bit address plus Y (LDA $1234,Y); +1 cycle on page cross for reads.
    AbsoluteY,

    /// Indirect jump through a 16-bit pointer; JMP only. The NMOS part does
    /// not carry into the high pointer byte when the pointer sits at $xxFF.
    Indirect,

    /// Indexed indirect: (zp + X) within page zero, then dereference.
    IndirectX,

    /// Indirect indexed: dereference zp, then add Y; +1 cycle on page cross.
    IndirectY,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_bytes(self) -> u8 {
        match self {
            AddressingMode::Implicit | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }
}
