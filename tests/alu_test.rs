//! Arithmetic instruction tests: ADC and SBC against an independent oracle
//! over every operand combination, plus targeted flag cases.
//!
//! The oracle computes in wide integers straight from the definition; the
//! CPU computes through its own 8-bit funnel. Divergence anywhere in the
//! 256 x 256 x 2 space fails with the exact inputs.

use c64_core::{flags, Clock, Cpu, FlatRam, IrqLine, MemoryBus};

const ORIGIN: u16 = 0x8000;

/// CPU with the reset vector at $8000.
fn setup_cpu() -> Cpu<FlatRam> {
    let mut memory = FlatRam::new();
    memory.write(0xFFFC, 0x00);
    memory.write(0xFFFD, 0x80);
    let mut cpu = Cpu::new(memory, Clock::new(), IrqLine::new());
    cpu.reset();
    cpu
}

struct AluResult {
    value: u8,
    carry: bool,
    overflow: bool,
}

fn adc_oracle(a: u8, m: u8, carry_in: bool) -> AluResult {
    let sum = a as u16 + m as u16 + carry_in as u16;
    let value = sum as u8;
    AluResult {
        value,
        carry: sum > 0xFF,
        overflow: (a ^ value) & (m ^ value) & 0x80 != 0,
    }
}

fn sbc_oracle(a: u8, m: u8, carry_in: bool) -> AluResult {
    let diff = a as i16 - m as i16 - (!carry_in) as i16;
    let value = diff as u8;
    AluResult {
        value,
        carry: diff >= 0,
        overflow: (a ^ m) & (a ^ value) & 0x80 != 0,
    }
}

/// Run one immediate-mode ALU instruction with the given inputs.
fn run_one(cpu: &mut Cpu<FlatRam>, opcode: u8, a: u8, m: u8, carry_in: bool) {
    cpu.memory.write(ORIGIN, opcode);
    cpu.memory.write(ORIGIN + 1, m);
    cpu.pc = ORIGIN;
    cpu.a = a;
    cpu.p = flags::UNUSED | if carry_in { flags::CARRY } else { 0 };
    assert!(cpu.step());
}

fn check(cpu: &Cpu<FlatRam>, expected: &AluResult, a: u8, m: u8, carry_in: bool, name: &str) {
    let context = format!("{name} a={a:#04X} m={m:#04X} c={carry_in}");
    assert_eq!(cpu.a, expected.value, "result, {context}");
    assert_eq!(cpu.p & flags::CARRY != 0, expected.carry, "carry, {context}");
    assert_eq!(
        cpu.p & flags::OVERFLOW != 0,
        expected.overflow,
        "overflow, {context}"
    );
    assert_eq!(cpu.p & flags::ZERO != 0, expected.value == 0, "zero, {context}");
    assert_eq!(
        cpu.p & flags::NEGATIVE != 0,
        expected.value & 0x80 != 0,
        "negative, {context}"
    );
}

#[test]
fn adc_matches_oracle_exhaustively() {
    let mut cpu = setup_cpu();
    for a in 0..=255u8 {
        for m in 0..=255u8 {
            for carry_in in [false, true] {
                run_one(&mut cpu, 0x69, a, m, carry_in);
                let expected = adc_oracle(a, m, carry_in);
                check(&cpu, &expected, a, m, carry_in, "ADC");
            }
        }
    }
}

#[test]
fn sbc_matches_oracle_exhaustively() {
    let mut cpu = setup_cpu();
    for a in 0..=255u8 {
        for m in 0..=255u8 {
            for carry_in in [false, true] {
                run_one(&mut cpu, 0xE9, a, m, carry_in);
                let expected = sbc_oracle(a, m, carry_in);
                check(&cpu, &expected, a, m, carry_in, "SBC");
            }
        }
    }
}

#[test]
fn adc_ignores_decimal_flag() {
    // 0x09 + 0x01 in BCD would be 0x10; binary gives 0x0A.
    let mut cpu = setup_cpu();
    cpu.memory.write(ORIGIN, 0x69);
    cpu.memory.write(ORIGIN + 1, 0x01);
    cpu.a = 0x09;
    cpu.p = flags::UNUSED | flags::DECIMAL;
    cpu.step();
    assert_eq!(cpu.a, 0x0A);
    assert!(cpu.p & flags::DECIMAL != 0, "flag itself is preserved");
}

#[test]
fn sbc_ignores_decimal_flag() {
    // 0x10 - 0x01 in BCD would be 0x09; binary gives 0x0F.
    let mut cpu = setup_cpu();
    cpu.memory.write(ORIGIN, 0xE9);
    cpu.memory.write(ORIGIN + 1, 0x01);
    cpu.a = 0x10;
    cpu.p = flags::UNUSED | flags::DECIMAL | flags::CARRY;
    cpu.step();
    assert_eq!(cpu.a, 0x0F);
}

#[test]
fn signed_overflow_corner_cases() {
    let cases = [
        // (a, m, carry_in, expect_overflow)
        (0x50u8, 0x50u8, false, true),  // pos + pos -> neg
        (0x80, 0x80, false, true),      // neg + neg -> pos
        (0x50, 0x90, false, false),     // mixed signs never overflow
        (0xFF, 0x01, false, false),     // wraps but stays consistent
        (0x7F, 0x00, true, true),       // carry-in tips it over
    ];
    let mut cpu = setup_cpu();
    for (a, m, carry_in, expect) in cases {
        run_one(&mut cpu, 0x69, a, m, carry_in);
        assert_eq!(
            cpu.p & flags::OVERFLOW != 0,
            expect,
            "a={a:#04X} m={m:#04X} c={carry_in}"
        );
    }
}

#[test]
fn compare_family_never_touches_overflow() {
    let mut cpu = setup_cpu();
    for opcode in [0xC9u8, 0xE0, 0xC0] {
        cpu.memory.write(ORIGIN, opcode);
        cpu.memory.write(ORIGIN + 1, 0x80);
        cpu.pc = ORIGIN;
        cpu.a = 0x7F;
        cpu.x = 0x7F;
        cpu.y = 0x7F;
        cpu.p = flags::UNUSED | flags::OVERFLOW;
        cpu.step();
        assert!(
            cpu.p & flags::OVERFLOW != 0,
            "opcode {opcode:#04X} cleared overflow"
        );
    }
}
