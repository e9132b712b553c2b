//! # 6502 Processor Core
//!
//! Fetch-decode-execute over the documented NMOS 6502 instruction set. The
//! CPU owns its memory bus (generic over [`MemoryBus`]) and advances the
//! shared [`Clock`] by the documented cycle cost of each instruction, plus
//! page-cross and taken-branch surcharges.
//!
//! Decimal mode is not implemented: the D flag can be set and cleared, but
//! ADC/SBC always compute in binary. Executing an unassigned opcode stops
//! the processor permanently; only [`Cpu::reset`] brings it back.

use crate::addressing::AddressingMode;
use crate::memory::MemoryBus;
use crate::opcodes::{Mnemonic, OPCODE_TABLE};
use crate::scheduler::Clock;
use crate::trace::TraceSink;
use std::cell::Cell;
use std::rc::Rc;

/// Status register bit positions. Bit 5 has no storage on the real part and
/// always reads back as 1; this implementation keeps it pinned high.
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const IRQ_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

/// Reset vector: PC is loaded from this address on reset.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector: PC is loaded from this address on interrupt entry.
pub const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_BASE: u16 = 0x0100;

/// Shared level-sensitive interrupt request line.
///
/// Each interrupt source owns one bit of the mask; the line is asserted
/// while any bit is set. Sources raise and lower their own bit as their
/// internal interrupt output changes, and the CPU samples the line at
/// instruction boundaries.
#[derive(Debug, Clone, Default)]
pub struct IrqLine(Rc<Cell<u8>>);

impl IrqLine {
    /// Source bit for the first CIA.
    pub const CIA1: u8 = 0x01;
    /// Source bit for the second CIA.
    pub const CIA2: u8 = 0x02;

    pub fn new() -> Self {
        Self::default()
    }

    /// Assert `source`'s bit.
    pub fn raise(&self, source: u8) {
        self.0.set(self.0.get() | source);
    }

    /// Release `source`'s bit.
    pub fn lower(&self, source: u8) {
        self.0.set(self.0.get() & !source);
    }

    /// Whether any source is asserting the line.
    pub fn active(&self) -> bool {
        self.0.get() != 0
    }

    /// Raw asserted-sources mask.
    pub fn sources(&self) -> u8 {
        self.0.get()
    }

    /// Drop every asserted source (reset).
    pub fn clear_all(&self) {
        self.0.set(0);
    }
}

/// The processor. Generic over its memory bus so tests can run against flat
/// RAM while the full machine runs against the banked address space.
pub struct Cpu<M: MemoryBus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub p: u8,
    /// Cleared when an unassigned opcode executes; only reset sets it again.
    pub running: bool,
    pub memory: M,
    clock: Clock,
    irq: IrqLine,
    trace: Option<Box<dyn TraceSink>>,
}

impl<M: MemoryBus> Cpu<M> {
    /// Create a CPU over `memory`. Registers hold power-on garbage (zeros
    /// here); call [`Cpu::reset`] before stepping.
    pub fn new(memory: M, clock: Clock, irq: IrqLine) -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0,
            p: flags::UNUSED,
            running: false,
            memory,
            clock,
            irq,
            trace: None,
        }
    }

    /// Install an execution trace sink, replacing any previous one.
    pub fn set_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Shared cycle counter handle.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Shared interrupt line handle.
    pub fn irq_line(&self) -> &IrqLine {
        &self.irq
    }

    /// Reset to the power-on state: A/X/Y cleared, SP at $FF, status with
    /// the unused and break bits set and interrupts enabled, PC loaded from
    /// the reset vector. Does not touch the shared clock.
    pub fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFF;
        self.p = flags::UNUSED | flags::BREAK;
        self.pc = self.read16(RESET_VECTOR);
        self.running = true;
    }

    /// Whether an interrupt would be taken at the next step boundary.
    pub fn irq_pending(&self) -> bool {
        self.irq.active() && self.p & flags::IRQ_DISABLE == 0
    }

    /// Execute one instruction (or accept one pending interrupt) and advance
    /// the clock. Returns `false` if the processor is stopped, either
    /// already halted or halting now on an unassigned opcode.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }

        if self.irq_pending() {
            self.enter_interrupt();
            return true;
        }

        let opcode = self.memory.read(self.pc);
        let meta = &OPCODE_TABLE[opcode as usize];

        if meta.mnemonic == Mnemonic::Jam {
            self.running = false;
            return false;
        }

        if let Some(sink) = self.trace.as_mut() {
            // Registers captured before the instruction mutates them.
            sink.instruction(self.pc, opcode, meta, self.a, self.x, self.y, self.p);
        }

        self.pc = self.pc.wrapping_add(1);
        let extra = self.execute(meta.mnemonic, meta.mode, meta.page_penalty);
        self.clock.advance((meta.cycles + extra) as u64);
        true
    }

    /// Accept a pending IRQ: push PC and status (break clear), mask further
    /// interrupts, and vector through [`IRQ_VECTOR`]. Costs 7 cycles and
    /// consumes the step.
    fn enter_interrupt(&mut self) {
        let return_pc = self.pc;
        self.push((return_pc >> 8) as u8);
        self.push(return_pc as u8);
        self.push((self.p | flags::UNUSED) & !flags::BREAK);
        self.p |= flags::IRQ_DISABLE;
        self.pc = self.read16(IRQ_VECTOR);
        if let Some(sink) = self.trace.as_mut() {
            sink.interrupt(return_pc, self.pc);
        }
        self.clock.advance(7);
    }

    // ----- instruction dispatch -------------------------------------------

    /// Execute the fetched instruction; PC sits just past the opcode byte.
    /// Returns the cycle surcharge beyond the table's base cost.
    fn execute(&mut self, mnemonic: Mnemonic, mode: AddressingMode, page_penalty: bool) -> u8 {
        use Mnemonic::*;

        match mnemonic {
            // Loads and stores.
            Lda => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.a = m;
                self.set_nz(m);
                extra
            }
            Ldx => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.x = m;
                self.set_nz(m);
                extra
            }
            Ldy => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.y = m;
                self.set_nz(m);
                extra
            }
            Sta => {
                let (addr, _) = self.operand_address(mode);
                self.memory.write(addr, self.a);
                0
            }
            Stx => {
                let (addr, _) = self.operand_address(mode);
                self.memory.write(addr, self.x);
                0
            }
            Sty => {
                let (addr, _) = self.operand_address(mode);
                self.memory.write(addr, self.y);
                0
            }

            // Register transfers.
            Tax => {
                self.x = self.a;
                self.set_nz(self.x);
                0
            }
            Tay => {
                self.y = self.a;
                self.set_nz(self.y);
                0
            }
            Txa => {
                self.a = self.x;
                self.set_nz(self.a);
                0
            }
            Tya => {
                self.a = self.y;
                self.set_nz(self.a);
                0
            }
            Tsx => {
                self.x = self.sp;
                self.set_nz(self.x);
                0
            }
            // TXS updates no flags.
            Txs => {
                self.sp = self.x;
                0
            }

            // Arithmetic. SBC is ADC of the operand's complement.
            Adc => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.add_with_carry(m);
                extra
            }
            Sbc => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.add_with_carry(!m);
                extra
            }

            // Logical.
            And => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.a &= m;
                self.set_nz(self.a);
                extra
            }
            Ora => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.a |= m;
                self.set_nz(self.a);
                extra
            }
            Eor => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.a ^= m;
                self.set_nz(self.a);
                extra
            }
            Bit => {
                let (m, _) = self.load_operand(mode, page_penalty);
                self.set_flag(flags::ZERO, self.a & m == 0);
                self.set_flag(flags::NEGATIVE, m & 0x80 != 0);
                self.set_flag(flags::OVERFLOW, m & 0x40 != 0);
                0
            }

            // Compares never touch the overflow flag.
            Cmp => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.compare(self.a, m);
                extra
            }
            Cpx => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.compare(self.x, m);
                extra
            }
            Cpy => {
                let (m, extra) = self.load_operand(mode, page_penalty);
                self.compare(self.y, m);
                extra
            }

            // Shifts and rotates (accumulator or read-modify-write).
            Asl => self.modify(mode, |cpu, v| {
                cpu.set_flag(flags::CARRY, v & 0x80 != 0);
                v << 1
            }),
            Lsr => self.modify(mode, |cpu, v| {
                cpu.set_flag(flags::CARRY, v & 0x01 != 0);
                v >> 1
            }),
            Rol => self.modify(mode, |cpu, v| {
                let carry_in = cpu.p & flags::CARRY;
                cpu.set_flag(flags::CARRY, v & 0x80 != 0);
                (v << 1) | carry_in
            }),
            Ror => self.modify(mode, |cpu, v| {
                let carry_in = (cpu.p & flags::CARRY) << 7;
                cpu.set_flag(flags::CARRY, v & 0x01 != 0);
                (v >> 1) | carry_in
            }),

            // Increments and decrements.
            Inc => self.modify(mode, |_, v| v.wrapping_add(1)),
            Dec => self.modify(mode, |_, v| v.wrapping_sub(1)),
            Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
                0
            }
            Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
                0
            }
            Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
                0
            }
            Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
                0
            }

            // Control flow.
            Jmp => {
                let (addr, _) = self.operand_address(mode);
                self.pc = addr;
                0
            }
            Jsr => {
                let target = self.fetch16();
                let return_addr = self.pc.wrapping_sub(1);
                self.push((return_addr >> 8) as u8);
                self.push(return_addr as u8);
                self.pc = target;
                0
            }
            Rts => {
                self.pc = self.pop16().wrapping_add(1);
                0
            }
            Brk => {
                // The byte after the opcode is padding; return past it.
                let return_pc = self.pc.wrapping_add(1);
                self.push((return_pc >> 8) as u8);
                self.push(return_pc as u8);
                self.push(self.p | flags::BREAK | flags::UNUSED);
                self.p |= flags::IRQ_DISABLE;
                self.pc = self.read16(IRQ_VECTOR);
                0
            }
            Rti => {
                self.p = self.pop() | flags::UNUSED;
                self.pc = self.pop16();
                0
            }

            Bpl => self.branch(self.p & flags::NEGATIVE == 0),
            Bmi => self.branch(self.p & flags::NEGATIVE != 0),
            Bvc => self.branch(self.p & flags::OVERFLOW == 0),
            Bvs => self.branch(self.p & flags::OVERFLOW != 0),
            Bcc => self.branch(self.p & flags::CARRY == 0),
            Bcs => self.branch(self.p & flags::CARRY != 0),
            Bne => self.branch(self.p & flags::ZERO == 0),
            Beq => self.branch(self.p & flags::ZERO != 0),

            // Flag operations.
            Clc => {
                self.p &= !flags::CARRY;
                0
            }
            Sec => {
                self.p |= flags::CARRY;
                0
            }
            Cli => {
                self.p &= !flags::IRQ_DISABLE;
                0
            }
            Sei => {
                self.p |= flags::IRQ_DISABLE;
                0
            }
            Clv => {
                self.p &= !flags::OVERFLOW;
                0
            }
            Cld => {
                self.p &= !flags::DECIMAL;
                0
            }
            Sed => {
                self.p |= flags::DECIMAL;
                0
            }

            // Stack operations. PHP always pushes with break and unused set.
            Pha => {
                self.push(self.a);
                0
            }
            Php => {
                self.push(self.p | flags::BREAK | flags::UNUSED);
                0
            }
            Pla => {
                self.a = self.pop();
                self.set_nz(self.a);
                0
            }
            Plp => {
                self.p = self.pop() | flags::UNUSED;
                0
            }

            Nop => 0,

            // Filtered out in step().
            Jam => 0,
        }
    }

    // ----- operand access --------------------------------------------------

    /// Read the operand value for a data instruction; returns the value and
    /// the page-cross surcharge (0 or 1).
    fn load_operand(&mut self, mode: AddressingMode, page_penalty: bool) -> (u8, u8) {
        let (addr, crossed) = self.operand_address(mode);
        let value = self.memory.read(addr);
        let extra = if page_penalty && crossed { 1 } else { 0 };
        (value, extra)
    }

    /// Resolve the effective address for `mode`, consuming operand bytes.
    /// The bool reports whether indexing crossed a page boundary.
    fn operand_address(&mut self, mode: AddressingMode) -> (u16, bool) {
        match mode {
            AddressingMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (addr, false)
            }
            AddressingMode::ZeroPage => (self.fetch8() as u16, false),
            AddressingMode::ZeroPageX => {
                let base = self.fetch8();
                (base.wrapping_add(self.x) as u16, false)
            }
            AddressingMode::ZeroPageY => {
                let base = self.fetch8();
                (base.wrapping_add(self.y) as u16, false)
            }
            AddressingMode::Absolute => (self.fetch16(), false),
            AddressingMode::AbsoluteX => {
                let base = self.fetch16();
                let addr = base.wrapping_add(self.x as u16);
                (addr, page_crossed(base, addr))
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch16();
                let addr = base.wrapping_add(self.y as u16);
                (addr, page_crossed(base, addr))
            }
            AddressingMode::Indirect => {
                // NMOS quirk: a pointer at $xxFF wraps within its page when
                // fetching the high byte.
                let ptr = self.fetch16();
                let lo = self.memory.read(ptr);
                let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                let hi = self.memory.read(hi_addr);
                (u16::from_le_bytes([lo, hi]), false)
            }
            AddressingMode::IndirectX => {
                let zp = self.fetch8().wrapping_add(self.x);
                let lo = self.memory.read(zp as u16);
                let hi = self.memory.read(zp.wrapping_add(1) as u16);
                (u16::from_le_bytes([lo, hi]), false)
            }
            AddressingMode::IndirectY => {
                let zp = self.fetch8();
                let lo = self.memory.read(zp as u16);
                let hi = self.memory.read(zp.wrapping_add(1) as u16);
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(self.y as u16);
                (addr, page_crossed(base, addr))
            }
            AddressingMode::Implicit | AddressingMode::Accumulator | AddressingMode::Relative => {
                // Never reached: these modes have no effective address.
                (self.pc, false)
            }
        }
    }

    /// Read-modify-write funnel shared by the shift/rotate and INC/DEC
    /// memory forms; also handles the accumulator forms.
    fn modify(&mut self, mode: AddressingMode, f: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        if mode == AddressingMode::Accumulator {
            let result = f(self, self.a);
            self.a = result;
            self.set_nz(result);
        } else {
            let (addr, _) = self.operand_address(mode);
            let value = self.memory.read(addr);
            let result = f(self, value);
            self.memory.write(addr, result);
            self.set_nz(result);
        }
        0
    }

    /// Conditional relative branch. Taken branches cost one extra cycle,
    /// two when the target sits on a different page than the next
    /// instruction would have.
    fn branch(&mut self, taken: bool) -> u8 {
        let offset = self.fetch8() as i8;
        if !taken {
            return 0;
        }
        let target = self.pc.wrapping_add(offset as u16);
        let extra = if page_crossed(self.pc, target) { 2 } else { 1 };
        self.pc = target;
        extra
    }

    // ----- ALU funnels ------------------------------------------------------

    /// Binary add with carry into A, setting C, V, N, Z. The overflow flag
    /// follows the sign rule: set when the carry into bit 7 differs from the
    /// carry out of bit 7, i.e. when two same-signed operands produce a
    /// result of the opposite sign.
    fn add_with_carry(&mut self, m: u8) {
        let carry_in = (self.p & flags::CARRY) as u16;
        let sum = self.a as u16 + m as u16 + carry_in;
        let result = sum as u8;
        self.set_flag(flags::CARRY, sum > 0xFF);
        self.set_flag(flags::OVERFLOW, (!(self.a ^ m) & (self.a ^ result)) & 0x80 != 0);
        self.a = result;
        self.set_nz(result);
    }

    /// Shared compare: C when reg >= m, N/Z from the difference. Never
    /// touches overflow.
    fn compare(&mut self, reg: u8, m: u8) {
        self.set_flag(flags::CARRY, reg >= m);
        self.set_nz(reg.wrapping_sub(m));
    }

    #[inline]
    fn set_nz(&mut self, value: u8) {
        self.set_flag(flags::ZERO, value == 0);
        self.set_flag(flags::NEGATIVE, value & 0x80 != 0);
    }

    #[inline]
    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    // ----- bus and stack helpers -------------------------------------------

    fn fetch8(&mut self) -> u8 {
        let value = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch16(&mut self) -> u16 {
        let lo = self.fetch8();
        let hi = self.fetch8();
        u16::from_le_bytes([lo, hi])
    }

    fn read16(&mut self, addr: u16) -> u16 {
        let lo = self.memory.read(addr);
        let hi = self.memory.read(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn push(&mut self, value: u8) {
        self.memory.write(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.memory.read(STACK_BASE | self.sp as u16)
    }

    fn pop16(&mut self) -> u16 {
        let lo = self.pop();
        let hi = self.pop();
        u16::from_le_bytes([lo, hi])
    }
}

#[inline]
fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}
