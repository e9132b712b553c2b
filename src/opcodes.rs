//! # Opcode Metadata Table
//!
//! The 256-entry decode table that serves as the single source of truth for
//! instruction metadata: operation, addressing mode, documented base cycle
//! cost, and whether the indexed read pays the page-cross surcharge.
//!
//! The 151 assigned opcodes of the NMOS 6502 are filled in; every other byte
//! value decodes to [`Mnemonic::Jam`], which halts the processor when
//! executed. Base cycle costs are never below 2; indexed and indirect modes
//! add their documented surcharges on top of that floor.

use crate::addressing::AddressingMode;

/// Instruction operation selected by an opcode.
///
/// `Jam` stands in for every unassigned opcode value; executing one stops the
/// processor permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay,
    Tsx, Txa, Txs, Tya, Jam,
}

impl Mnemonic {
    /// Canonical three-letter assembly name ("???" for unassigned opcodes).
    pub const fn name(self) -> &'static str {
        match self {
            Mnemonic::Adc => "ADC", Mnemonic::And => "AND", Mnemonic::Asl => "ASL",
            Mnemonic::Bcc => "BCC", Mnemonic::Bcs => "BCS", Mnemonic::Beq => "BEQ",
            Mnemonic::Bit => "BIT", Mnemonic::Bmi => "BMI", Mnemonic::Bne => "BNE",
            Mnemonic::Bpl => "BPL", Mnemonic::Brk => "BRK", Mnemonic::Bvc => "BVC",
            Mnemonic::Bvs => "BVS", Mnemonic::Clc => "CLC", Mnemonic::Cld => "CLD",
            Mnemonic::Cli => "CLI", Mnemonic::Clv => "CLV", Mnemonic::Cmp => "CMP",
            Mnemonic::Cpx => "CPX", Mnemonic::Cpy => "CPY", Mnemonic::Dec => "DEC",
            Mnemonic::Dex => "DEX", Mnemonic::Dey => "DEY", Mnemonic::Eor => "EOR",
            Mnemonic::Inc => "INC", Mnemonic::Inx => "INX", Mnemonic::Iny => "INY",
            Mnemonic::Jmp => "JMP", Mnemonic::Jsr => "JSR", Mnemonic::Lda => "LDA",
            Mnemonic::Ldx => "LDX", Mnemonic::Ldy => "LDY", Mnemonic::Lsr => "LSR",
            Mnemonic::Nop => "NOP", Mnemonic::Ora => "ORA", Mnemonic::Pha => "PHA",
            Mnemonic::Php => "PHP", Mnemonic::Pla => "PLA", Mnemonic::Plp => "PLP",
            Mnemonic::Rol => "ROL", Mnemonic::Ror => "ROR", Mnemonic::Rti => "RTI",
            Mnemonic::Rts => "RTS", Mnemonic::Sbc => "SBC", Mnemonic::Sec => "SEC",
            Mnemonic::Sed => "SED", Mnemonic::Sei => "SEI", Mnemonic::Sta => "STA",
            Mnemonic::Stx => "STX", Mnemonic::Sty => "STY", Mnemonic::Tax => "TAX",
            Mnemonic::Tay => "TAY", Mnemonic::Tsx => "TSX", Mnemonic::Txa => "TXA",
            Mnemonic::Txs => "TXS", Mnemonic::Tya => "TYA", Mnemonic::Jam => "???",
        }
    }
}

/// Static metadata for one opcode byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// Operation selected by this opcode.
    pub mnemonic: Mnemonic,
    /// How the operand bytes are interpreted.
    pub mode: AddressingMode,
    /// Documented base cycle cost (page-cross and branch penalties extra).
    pub cycles: u8,
    /// Whether an indexed read across a page boundary costs one extra cycle.
    /// Stores and read-modify-write forms pay a fixed cost instead.
    pub page_penalty: bool,
}

const fn op(mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, cycles, page_penalty: false }
}

const fn opx(mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, cycles, page_penalty: true }
}

const JAM: Opcode = op(Mnemonic::Jam, AddressingMode::Implicit, 2);

const fn build_table() -> [Opcode; 256] {
    use AddressingMode::*;
    use Mnemonic::*;

    let mut t = [JAM; 256];

    // Load/store
    t[0xA9] = op(Lda, Immediate, 2);
    t[0xA5] = op(Lda, ZeroPage, 3);
    t[0xB5] = op(Lda, ZeroPageX, 4);
    t[0xAD] = op(Lda, Absolute, 4);
    t[0xBD] = opx(Lda, AbsoluteX, 4);
    t[0xB9] = opx(Lda, AbsoluteY, 4);
    t[0xA1] = op(Lda, IndirectX, 6);
    t[0xB1] = opx(Lda, IndirectY, 5);
    t[0xA2] = op(Ldx, Immediate, 2);
    t[0xA6] = op(Ldx, ZeroPage, 3);
    t[0xB6] = op(Ldx, ZeroPageY, 4);
    t[0xAE] = op(Ldx, Absolute, 4);
    t[0xBE] = opx(Ldx, AbsoluteY, 4);
    t[0xA0] = op(Ldy, Immediate, 2);
    t[0xA4] = op(Ldy, ZeroPage, 3);
    t[0xB4] = op(Ldy, ZeroPageX, 4);
    t[0xAC] = op(Ldy, Absolute, 4);
    t[0xBC] = opx(Ldy, AbsoluteX, 4);
    t[0x85] = op(Sta, ZeroPage, 3);
    t[0x95] = op(Sta, ZeroPageX, 4);
    t[0x8D] = op(Sta, Absolute, 4);
    t[0x9D] = op(Sta, AbsoluteX, 5);
    t[0x99] = op(Sta, AbsoluteY, 5);
    t[0x81] = op(Sta, IndirectX, 6);
    t[0x91] = op(Sta, IndirectY, 6);
    t[0x86] = op(Stx, ZeroPage, 3);
    t[0x96] = op(Stx, ZeroPageY, 4);
    t[0x8E] = op(Stx, Absolute, 4);
    t[0x84] = op(Sty, ZeroPage, 3);
    t[0x94] = op(Sty, ZeroPageX, 4);
    t[0x8C] = op(Sty, Absolute, 4);

    // Register transfers
    t[0xAA] = op(Tax, Implicit, 2);
    t[0xA8] = op(Tay, Implicit, 2);
    t[0x8A] = op(Txa, Implicit, 2);
    t[0x98] = op(Tya, Implicit, 2);
    t[0xBA] = op(Tsx, Implicit, 2);
    t[0x9A] = op(Txs, Implicit, 2);

    // Arithmetic
    t[0x69] = op(Adc, Immediate, 2);
    t[0x65] = op(Adc, ZeroPage, 3);
    t[0x75] = op(Adc, ZeroPageX, 4);
    t[0x6D] = op(Adc, Absolute, 4);
    t[0x7D] = opx(Adc, AbsoluteX, 4);
    t[0x79] = opx(Adc, AbsoluteY, 4);
    t[0x61] = op(Adc, IndirectX, 6);
    t[0x71] = opx(Adc, IndirectY, 5);
    t[0xE9] = op(Sbc, Immediate, 2);
    t[0xE5] = op(Sbc, ZeroPage, 3);
    t[0xF5] = op(Sbc, ZeroPageX, 4);
    t[0xED] = op(Sbc, Absolute, 4);
    t[0xFD] = opx(Sbc, AbsoluteX, 4);
    t[0xF9] = opx(Sbc, AbsoluteY, 4);
    t[0xE1] = op(Sbc, IndirectX, 6);
    t[0xF1] = opx(Sbc, IndirectY, 5);

    // Logical
    t[0x29] = op(And, Immediate, 2);
    t[0x25] = op(And, ZeroPage, 3);
    t[0x35] = op(And, ZeroPageX, 4);
    t[0x2D] = op(And, Absolute, 4);
    t[0x3D] = opx(And, AbsoluteX, 4);
    t[0x39] = opx(And, AbsoluteY, 4);
    t[0x21] = op(And, IndirectX, 6);
    t[0x31] = opx(And, IndirectY, 5);
    t[0x09] = op(Ora, Immediate, 2);
    t[0x05] = op(Ora, ZeroPage, 3);
    t[0x15] = op(Ora, ZeroPageX, 4);
    t[0x0D] = op(Ora, Absolute, 4);
    t[0x1D] = opx(Ora, AbsoluteX, 4);
    t[0x19] = opx(Ora, AbsoluteY, 4);
    t[0x01] = op(Ora, IndirectX, 6);
    t[0x11] = opx(Ora, IndirectY, 5);
    t[0x49] = op(Eor, Immediate, 2);
    t[0x45] = op(Eor, ZeroPage, 3);
    t[0x55] = op(Eor, ZeroPageX, 4);
    t[0x4D] = op(Eor, Absolute, 4);
    t[0x5D] = opx(Eor, AbsoluteX, 4);
    t[0x59] = opx(Eor, AbsoluteY, 4);
    t[0x41] = op(Eor, IndirectX, 6);
    t[0x51] = opx(Eor, IndirectY, 5);
    t[0x24] = op(Bit, ZeroPage, 3);
    t[0x2C] = op(Bit, Absolute, 4);

    // Compares
    t[0xC9] = op(Cmp, Immediate, 2);
    t[0xC5] = op(Cmp, ZeroPage, 3);
    t[0xD5] = op(Cmp, ZeroPageX, 4);
    t[0xCD] = op(Cmp, Absolute, 4);
    t[0xDD] = opx(Cmp, AbsoluteX, 4);
    t[0xD9] = opx(Cmp, AbsoluteY, 4);
    t[0xC1] = op(Cmp, IndirectX, 6);
    t[0xD1] = opx(Cmp, IndirectY, 5);
    t[0xE0] = op(Cpx, Immediate, 2);
    t[0xE4] = op(Cpx, ZeroPage, 3);
    t[0xEC] = op(Cpx, Absolute, 4);
    t[0xC0] = op(Cpy, Immediate, 2);
    t[0xC4] = op(Cpy, ZeroPage, 3);
    t[0xCC] = op(Cpy, Absolute, 4);

    // Shifts and rotates
    t[0x0A] = op(Asl, Accumulator, 2);
    t[0x06] = op(Asl, ZeroPage, 5);
    t[0x16] = op(Asl, ZeroPageX, 6);
    t[0x0E] = op(Asl, Absolute, 6);
    t[0x1E] = op(Asl, AbsoluteX, 7);
    t[0x4A] = op(Lsr, Accumulator, 2);
    t[0x46] = op(Lsr, ZeroPage, 5);
    t[0x56] = op(Lsr, ZeroPageX, 6);
    t[0x4E] = op(Lsr, Absolute, 6);
    t[0x5E] = op(Lsr, AbsoluteX, 7);
    t[0x2A] = op(Rol, Accumulator, 2);
    t[0x26] = op(Rol, ZeroPage, 5);
    t[0x36] = op(Rol, ZeroPageX, 6);
    t[0x2E] = op(Rol, Absolute, 6);
    t[0x3E] = op(Rol, AbsoluteX, 7);
    t[0x6A] = op(Ror, Accumulator, 2);
    t[0x66] = op(Ror, ZeroPage, 5);
    t[0x76] = op(Ror, ZeroPageX, 6);
    t[0x6E] = op(Ror, Absolute, 6);
    t[0x7E] = op(Ror, AbsoluteX, 7);

    // Increment/decrement
    t[0xE6] = op(Inc, ZeroPage, 5);
    t[0xF6] = op(Inc, ZeroPageX, 6);
    t[0xEE] = op(Inc, Absolute, 6);
    t[0xFE] = op(Inc, AbsoluteX, 7);
    t[0xC6] = op(Dec, ZeroPage, 5);
    t[0xD6] = op(Dec, ZeroPageX, 6);
    t[0xCE] = op(Dec, Absolute, 6);
    t[0xDE] = op(Dec, AbsoluteX, 7);
    t[0xE8] = op(Inx, Implicit, 2);
    t[0xC8] = op(Iny, Implicit, 2);
    t[0xCA] = op(Dex, Implicit, 2);
    t[0x88] = op(Dey, Implicit, 2);

    // Jumps, subroutines, interrupts
    t[0x4C] = op(Jmp, Absolute, 3);
    t[0x6C] = op(Jmp, Indirect, 5);
    t[0x20] = op(Jsr, Absolute, 6);
    t[0x60] = op(Rts, Implicit, 6);
    t[0x00] = op(Brk, Implicit, 7);
    t[0x40] = op(Rti, Implicit, 6);

    // Branches (+1 cycle when taken, +1 more on page cross)
    t[0x10] = op(Bpl, Relative, 2);
    t[0x30] = op(Bmi, Relative, 2);
    t[0x50] = op(Bvc, Relative, 2);
    t[0x70] = op(Bvs, Relative, 2);
    t[0x90] = op(Bcc, Relative, 2);
    t[0xB0] = op(Bcs, Relative, 2);
    t[0xD0] = op(Bne, Relative, 2);
    t[0xF0] = op(Beq, Relative, 2);

    // Flag operations
    t[0x18] = op(Clc, Implicit, 2);
    t[0x38] = op(Sec, Implicit, 2);
    t[0x58] = op(Cli, Implicit, 2);
    t[0x78] = op(Sei, Implicit, 2);
    t[0xB8] = op(Clv, Implicit, 2);
    t[0xD8] = op(Cld, Implicit, 2);
    t[0xF8] = op(Sed, Implicit, 2);

    // Stack
    t[0x48] = op(Pha, Implicit, 3);
    t[0x08] = op(Php, Implicit, 3);
    t[0x68] = op(Pla, Implicit, 4);
    t[0x28] = op(Plp, Implicit, 4);

    t[0xEA] = op(Nop, Implicit, 2);

    t
}

/// Complete decode table indexed by opcode byte value.
pub const OPCODE_TABLE: [Opcode; 256] = build_table();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::AddressingMode;

    #[test]
    fn assigned_opcode_count_matches_documented_set() {
        let assigned = OPCODE_TABLE
            .iter()
            .filter(|o| o.mnemonic != Mnemonic::Jam)
            .count();
        assert_eq!(assigned, 151);
    }

    #[test]
    fn base_cycles_never_below_two() {
        for entry in OPCODE_TABLE.iter() {
            assert!(entry.cycles >= 2, "{} below cycle floor", entry.mnemonic.name());
        }
    }

    #[test]
    fn spot_check_entries() {
        let lda_imm = &OPCODE_TABLE[0xA9];
        assert_eq!(lda_imm.mnemonic, Mnemonic::Lda);
        assert_eq!(lda_imm.mode, AddressingMode::Immediate);
        assert_eq!(lda_imm.cycles, 2);

        let sta_absx = &OPCODE_TABLE[0x9D];
        assert_eq!(sta_absx.cycles, 5);
        assert!(!sta_absx.page_penalty, "stores pay a fixed indexed cost");

        let lda_absx = &OPCODE_TABLE[0xBD];
        assert!(lda_absx.page_penalty);

        assert_eq!(OPCODE_TABLE[0xFF].mnemonic, Mnemonic::Jam);
        assert_eq!(OPCODE_TABLE[0x02].mnemonic, Mnemonic::Jam);
    }
}
