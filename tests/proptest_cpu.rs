//! Property-based tests for CPU invariants.

use c64_core::{flags, Clock, Cpu, FlatRam, IrqLine, MemoryBus, Mnemonic, OPCODE_TABLE};
use proptest::prelude::*;

const ORIGIN: u16 = 0x8000;

/// CPU with the reset vector at $8000 and arbitrary register state.
fn setup_cpu(a: u8, x: u8, y: u8, p: u8) -> Cpu<FlatRam> {
    let mut memory = FlatRam::new();
    memory.write(0xFFFC, 0x00);
    memory.write(0xFFFD, 0x80);
    let mut cpu = Cpu::new(memory, Clock::new(), IrqLine::new());
    cpu.reset();
    cpu.a = a;
    cpu.x = x;
    cpu.y = y;
    // Keep interrupts enabled out of the picture; no line is raised anyway.
    cpu.p = p | flags::UNUSED;
    cpu
}

proptest! {
    /// The unused status bit stays pinned high through any instruction.
    #[test]
    fn unused_flag_always_set(
        opcode in any::<u8>(),
        operands in any::<[u8; 2]>(),
        a in any::<u8>(), x in any::<u8>(), y in any::<u8>(), p in any::<u8>(),
    ) {
        let mut cpu = setup_cpu(a, x, y, p);
        cpu.memory.write(ORIGIN, opcode);
        cpu.memory.write(ORIGIN + 1, operands[0]);
        cpu.memory.write(ORIGIN + 2, operands[1]);
        cpu.step();
        prop_assert!(cpu.p & flags::UNUSED != 0);
    }

    /// Every assigned opcode executes and costs at least its table cycles,
    /// at most two more (page cross / taken branch); unassigned opcodes
    /// halt without consuming time.
    #[test]
    fn step_outcome_matches_decode_table(
        opcode in any::<u8>(),
        operands in any::<[u8; 2]>(),
        a in any::<u8>(), x in any::<u8>(), y in any::<u8>(),
    ) {
        let mut cpu = setup_cpu(a, x, y, 0);
        cpu.memory.write(ORIGIN, opcode);
        cpu.memory.write(ORIGIN + 1, operands[0]);
        cpu.memory.write(ORIGIN + 2, operands[1]);

        let meta = &OPCODE_TABLE[opcode as usize];
        let stepped = cpu.step();
        if meta.mnemonic == Mnemonic::Jam {
            prop_assert!(!stepped);
            prop_assert!(!cpu.running);
            prop_assert_eq!(cpu.clock().now(), 0);
        } else {
            prop_assert!(stepped);
            let spent = cpu.clock().now();
            prop_assert!(spent >= meta.cycles as u64);
            prop_assert!(spent <= meta.cycles as u64 + 2);
        }
    }

    /// ADC is commutative in both result and flags.
    #[test]
    fn adc_commutes(a in any::<u8>(), m in any::<u8>(), carry in any::<bool>()) {
        let run = |acc: u8, operand: u8| {
            let p = if carry { flags::CARRY } else { 0 };
            let mut cpu = setup_cpu(acc, 0, 0, p);
            cpu.memory.write(ORIGIN, 0x69);
            cpu.memory.write(ORIGIN + 1, operand);
            cpu.step();
            (cpu.a, cpu.p)
        };
        prop_assert_eq!(run(a, m), run(m, a));
    }

    /// SBC with carry set is exact two's-complement subtraction.
    #[test]
    fn sbc_with_carry_is_wrapping_sub(a in any::<u8>(), m in any::<u8>()) {
        let mut cpu = setup_cpu(a, 0, 0, flags::CARRY);
        cpu.memory.write(ORIGIN, 0xE9);
        cpu.memory.write(ORIGIN + 1, m);
        cpu.step();
        prop_assert_eq!(cpu.a, a.wrapping_sub(m));
        prop_assert_eq!(cpu.p & flags::CARRY != 0, a >= m);
    }

    /// Loads set Z exactly on zero and N exactly on bit 7.
    #[test]
    fn load_flags_track_value(m in any::<u8>()) {
        let mut cpu = setup_cpu(0, 0, 0, 0);
        cpu.memory.write(ORIGIN, 0xA9);
        cpu.memory.write(ORIGIN + 1, m);
        cpu.step();
        prop_assert_eq!(cpu.p & flags::ZERO != 0, m == 0);
        prop_assert_eq!(cpu.p & flags::NEGATIVE != 0, m & 0x80 != 0);
    }

    /// A push/pop pair is the identity on A and SP.
    #[test]
    fn pha_pla_round_trip(a in any::<u8>(), sp in any::<u8>()) {
        let mut cpu = setup_cpu(a, 0, 0, 0);
        cpu.sp = sp;
        cpu.memory.write(ORIGIN, 0x48);
        cpu.memory.write(ORIGIN + 1, 0x68);
        cpu.step();
        cpu.a = !a;
        cpu.step();
        prop_assert_eq!(cpu.a, a);
        prop_assert_eq!(cpu.sp, sp);
    }
}
