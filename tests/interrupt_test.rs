//! Interrupt entry, BRK/RTI, and status-stack behavior.

use c64_core::{flags, Clock, Cpu, FlatRam, IrqLine, MemoryBus, IRQ_VECTOR};

const ORIGIN: u16 = 0x8000;
const HANDLER: u16 = 0x9000;

/// CPU with `program` at $8000 and an interrupt vector at $9000.
fn setup_cpu(program: &[u8]) -> Cpu<FlatRam> {
    let mut memory = FlatRam::new();
    memory.load(ORIGIN, program);
    memory.load(0xFFFC, &ORIGIN.to_le_bytes());
    memory.load(IRQ_VECTOR, &HANDLER.to_le_bytes());
    let mut cpu = Cpu::new(memory, Clock::new(), IrqLine::new());
    cpu.reset();
    cpu
}

#[test]
fn irq_delivery_consumes_one_step() {
    let mut cpu = setup_cpu(&[0xEA, 0xEA]);
    cpu.irq_line().raise(IrqLine::CIA1);

    let sp_before = cpu.sp;
    assert!(cpu.step());

    assert_eq!(cpu.pc, HANDLER);
    assert_eq!(cpu.sp, sp_before - 3, "PCH, PCL, P pushed");
    assert!(cpu.p & flags::IRQ_DISABLE != 0);
    assert_eq!(cpu.clock().now(), 7);
    // No instruction ran: the first NOP is still next.
    assert_eq!(cpu.memory.read(0x01FF), 0x80);
    assert_eq!(cpu.memory.read(0x01FE), 0x00);
}

#[test]
fn pushed_status_has_break_clear_and_unused_set() {
    let mut cpu = setup_cpu(&[0xEA]);
    cpu.irq_line().raise(IrqLine::CIA1);
    cpu.step();
    let pushed = cpu.memory.read(0x01FD);
    assert_eq!(pushed & flags::BREAK, 0);
    assert_eq!(pushed & flags::UNUSED, flags::UNUSED);
}

#[test]
fn irq_held_off_while_disable_flag_set() {
    let mut cpu = setup_cpu(&[0x78, 0xEA, 0x58, 0xEA]); // SEI, NOP, CLI, NOP
    cpu.irq_line().raise(IrqLine::CIA1);
    cpu.p |= flags::IRQ_DISABLE;
    cpu.step(); // SEI
    cpu.step(); // NOP, still masked
    assert_eq!(cpu.pc, ORIGIN + 2);
    cpu.step(); // CLI
    cpu.step(); // now the interrupt is taken
    assert_eq!(cpu.pc, HANDLER);
}

#[test]
fn level_sensitive_line_refires_until_lowered() {
    let mut cpu = setup_cpu(&[0xEA]);
    cpu.memory.write(HANDLER, 0x40); // RTI straight back
    cpu.irq_line().raise(IrqLine::CIA1);

    cpu.step(); // entry
    cpu.step(); // RTI re-enables (pushed P had I clear)
    assert_eq!(cpu.pc, ORIGIN);
    cpu.step(); // line still high: immediately re-enters
    assert_eq!(cpu.pc, HANDLER);

    cpu.irq_line().lower(IrqLine::CIA1);
    cpu.step(); // RTI
    cpu.step(); // now the NOP finally runs
    assert_eq!(cpu.pc, ORIGIN + 1);
}

#[test]
fn distinct_sources_keep_the_line_high() {
    let line = IrqLine::new();
    line.raise(IrqLine::CIA1);
    line.raise(IrqLine::CIA2);
    line.lower(IrqLine::CIA1);
    assert!(line.active());
    line.lower(IrqLine::CIA2);
    assert!(!line.active());
}

#[test]
fn brk_sets_break_in_pushed_status_irq_does_not() {
    let mut cpu = setup_cpu(&[0x00, 0xFF]);
    cpu.step();
    assert_eq!(cpu.pc, HANDLER);
    let pushed = cpu.memory.read(0x01FD);
    assert_eq!(pushed & flags::BREAK, flags::BREAK);
}

#[test]
fn php_plp_round_trip_preserves_status() {
    // Every status value round-trips up to the forced break/unused bits.
    let mut cpu = setup_cpu(&[0x08, 0x28]);
    for p in 0..=255u8 {
        cpu.pc = ORIGIN;
        cpu.sp = 0xFF;
        cpu.p = p;
        cpu.step(); // PHP
        cpu.p = 0;
        cpu.step(); // PLP
        assert_eq!(cpu.p, p | flags::BREAK | flags::UNUSED, "p={p:#04X}");
        // PLP re-enabling interrupts must not re-enter here: no line raised.
        assert_eq!(cpu.pc, ORIGIN + 2);
    }
}

#[test]
fn rti_inside_nested_interrupt_unwinds_correctly() {
    let mut cpu = setup_cpu(&[0xEA, 0xEA, 0xEA]);
    cpu.memory.write(HANDLER, 0x40); // RTI
    cpu.step(); // NOP
    cpu.irq_line().raise(IrqLine::CIA1);
    cpu.step(); // entry from ORIGIN+1
    cpu.irq_line().lower(IrqLine::CIA1);
    cpu.step(); // RTI
    assert_eq!(cpu.pc, ORIGIN + 1);
    assert_eq!(cpu.sp, 0xFF);
    // Status is back to the pre-interrupt value.
    assert!(cpu.p & flags::IRQ_DISABLE == 0);
}
