//! # CIA Timer/Interrupt Chip
//!
//! One 6526 CIA: two ports, two latched 16-bit down-counting interval
//! timers, and an interrupt flag/mask pair. The register file decodes 16
//! registers through `addr & 15`, so the chip mirrors through its whole
//! page the way the real part does. TOD clock and serial shift registers
//! are not modeled; their registers read back as open bus.
//!
//! ## Event-driven timing
//!
//! Timers never tick per cycle. A running timer remembers the cycle of its
//! last reconciliation (`last_event`) and parks an underflow deadline on
//! the shared scheduler at `now + value + 1`. Any register access that
//! observes or changes timer state first catches the counter up to the
//! present ([`Cia::update_timer`]); the scheduled callback does the same
//! and re-arms. The observable values are therefore exact at every access
//! while costing nothing in between.
//!
//! Timer B can count timer A underflows instead of cycles (CRB input mode
//! `TA`); those pulses are delivered during timer A's own catch-up.

use crate::cpu::IrqLine;
use crate::devices::PortHook;
use crate::scheduler::{Clock, EventSlot, SchedulerHandle};

/// Control register bits common to CRA and CRB.
pub mod control {
    /// Timer runs while set.
    pub const START: u8 = 0x01;
    /// Timer output appears on PB6/PB7.
    pub const PBON: u8 = 0x02;
    /// Toggle rather than pulse the port output.
    pub const OUTMODE: u8 = 0x04;
    /// One-shot when set, continuous when clear.
    pub const RUNMODE: u8 = 0x08;
    /// Strobe: force the latch into the counter. Never stored.
    pub const LOAD: u8 = 0x10;
    /// CRA: count CNT edges instead of cycles.
    pub const CRA_INMODE: u8 = 0x20;
    /// CRB input mode field.
    pub const CRB_INMODE_MASK: u8 = 0x60;
    /// CRB: count cycles.
    pub const CRB_INMODE_CLK: u8 = 0x00;
    /// CRB: count timer A underflows.
    pub const CRB_INMODE_TA: u8 = 0x40;
}

/// Interrupt flag bits (ICR).
pub mod icr {
    pub const TIMER_A: u8 = 0x01;
    pub const TIMER_B: u8 = 0x02;
    /// Set in reads of the flag register while an interrupt is requested.
    pub const REQUESTED: u8 = 0x80;
}

/// Which of the chip's two timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    A,
    B,
}

#[derive(Debug)]
struct Timer {
    latch: u16,
    value: u16,
    cr: u8,
    /// Cycle at which `value` was last reconciled with the clock.
    last_event: u64,
    slot: EventSlot,
}

impl Timer {
    fn new(slot: EventSlot) -> Self {
        Timer { latch: 0, value: 0, cr: 0, last_event: 0, slot }
    }

    fn running(&self) -> bool {
        self.cr & control::START != 0
    }

    fn counts_cycles(&self, id: TimerId) -> bool {
        match id {
            TimerId::A => self.cr & control::CRA_INMODE == 0,
            TimerId::B => self.cr & control::CRB_INMODE_MASK == control::CRB_INMODE_CLK,
        }
    }

    fn counts_timer_a(&self) -> bool {
        self.cr & control::CRB_INMODE_MASK == control::CRB_INMODE_TA
    }
}

/// One CIA chip bound to the shared clock, scheduler, and interrupt line.
pub struct Cia {
    pub pra: u8,
    pub prb: u8,
    pub ddra: u8,
    pub ddrb: u8,
    timer_a: Timer,
    timer_b: Timer,
    int_flags: u8,
    int_mask: u8,
    /// Last computed `flags & mask`, for edge-triggering the CPU line.
    masked_flags: u8,
    clock: Clock,
    scheduler: SchedulerHandle,
    irq: IrqLine,
    /// This chip's bit on the shared interrupt line.
    irq_source: u8,
    hook: Option<Box<dyn PortHook>>,
}

impl Cia {
    pub fn new(
        clock: Clock,
        scheduler: SchedulerHandle,
        irq: IrqLine,
        irq_source: u8,
        slot_a: EventSlot,
        slot_b: EventSlot,
    ) -> Self {
        Cia {
            pra: 0,
            prb: 0,
            ddra: 0,
            ddrb: 0,
            timer_a: Timer::new(slot_a),
            timer_b: Timer::new(slot_b),
            int_flags: 0,
            int_mask: 0,
            masked_flags: 0,
            clock,
            scheduler,
            irq,
            irq_source,
            hook: None,
        }
    }

    /// Attach the pre-read port hook (keyboard matrix on CIA 1).
    pub fn set_port_hook(&mut self, hook: Box<dyn PortHook>) {
        self.hook = Some(hook);
    }

    /// Clear every register and drop any scheduled deadline.
    pub fn reset(&mut self) {
        self.pra = 0;
        self.prb = 0;
        self.ddra = 0;
        self.ddrb = 0;
        self.timer_a.latch = 0;
        self.timer_a.value = 0;
        self.timer_a.cr = 0;
        self.timer_b.latch = 0;
        self.timer_b.value = 0;
        self.timer_b.cr = 0;
        self.int_flags = 0;
        self.int_mask = 0;
        if self.masked_flags != 0 {
            self.irq.lower(self.irq_source);
        }
        self.masked_flags = 0;
        self.scheduler.cancel(self.timer_a.slot);
        self.scheduler.cancel(self.timer_b.slot);
    }

    /// Scheduled deadline arrived for `id`: catch the timer up (raising the
    /// underflow flag) and re-arm if it is still running.
    pub fn service_timer(&mut self, id: TimerId) {
        self.update_timer(id);
        self.start_timer(id);
    }

    /// Whether this chip is currently requesting an interrupt.
    pub fn interrupt_active(&self) -> bool {
        self.masked_flags != 0
    }

    // ----- register file ---------------------------------------------------

    pub fn read(&mut self, addr: u16) -> u8 {
        match addr & 15 {
            0 => {
                // Undriven port bits float up before the hook sees them.
                self.pra |= !self.ddra;
                if let Some(hook) = self.hook.as_mut() {
                    hook.update_port(&mut self.pra, &mut self.prb, self.ddra, self.ddrb);
                }
                self.pra
            }
            1 => {
                self.prb |= !self.ddrb;
                if let Some(hook) = self.hook.as_mut() {
                    hook.update_port(&mut self.pra, &mut self.prb, self.ddra, self.ddrb);
                }
                self.prb
            }
            2 => self.ddra,
            3 => self.ddrb,
            4 => {
                self.update_timer(TimerId::A);
                self.timer_a.value as u8
            }
            5 => {
                self.update_timer(TimerId::A);
                (self.timer_a.value >> 8) as u8
            }
            6 => {
                self.update_timer(TimerId::B);
                self.timer_b.value as u8
            }
            7 => {
                self.update_timer(TimerId::B);
                (self.timer_b.value >> 8) as u8
            }
            13 => {
                // Reading the flag register clears it and thereby the
                // interrupt request.
                let result = self.int_flags;
                self.int_flags = 0;
                self.update_interrupt_status();
                result
            }
            14 => self.timer_a.cr,
            15 => self.timer_b.cr,
            // TOD and serial registers are unimplemented.
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr & 15 {
            0 => self.pra = value,
            1 => self.prb = value,
            2 => self.ddra = value,
            3 => self.ddrb = value,
            4 => self.timer_a.latch = (self.timer_a.latch & 0xFF00) | value as u16,
            5 => {
                self.timer_a.latch = (self.timer_a.latch & 0x00FF) | ((value as u16) << 8);
                // A stopped timer picks the new latch up immediately.
                if !self.timer_a.running() {
                    self.timer_a.value = self.timer_a.latch;
                }
            }
            6 => self.timer_b.latch = (self.timer_b.latch & 0xFF00) | value as u16,
            7 => {
                self.timer_b.latch = (self.timer_b.latch & 0x00FF) | ((value as u16) << 8);
                if !self.timer_b.running() {
                    self.timer_b.value = self.timer_b.latch;
                }
            }
            13 => {
                // Bit 7 selects whether the low bits set or clear mask bits.
                if value & 0x80 != 0 {
                    self.int_mask |= value & 0x1F;
                } else {
                    self.int_mask &= !(value & 0x1F);
                }
                self.update_interrupt_status();
            }
            14 => self.write_control(TimerId::A, value),
            15 => self.write_control(TimerId::B, value),
            _ => {}
        }
    }

    /// CRA/CRB write: reconcile a running timer first, apply the force-load
    /// strobe, store the register without the strobe bit, then re-arm or
    /// cancel the deadline for the new state.
    fn write_control(&mut self, id: TimerId, value: u8) {
        if self.timer(id).running() {
            self.update_timer(id);
        }
        if value & control::LOAD != 0 {
            let t = self.timer_mut(id);
            t.value = t.latch;
        }
        self.timer_mut(id).cr = value & !control::LOAD;
        self.start_timer(id);
    }

    // ----- timer engine ----------------------------------------------------

    fn timer(&self, id: TimerId) -> &Timer {
        match id {
            TimerId::A => &self.timer_a,
            TimerId::B => &self.timer_b,
        }
    }

    fn timer_mut(&mut self, id: TimerId) -> &mut Timer {
        match id {
            TimerId::A => &mut self.timer_a,
            TimerId::B => &mut self.timer_b,
        }
    }

    /// Catch a cycle-counting timer up to the present.
    fn update_timer(&mut self, id: TimerId) {
        let t = self.timer(id);
        if !t.running() || !t.counts_cycles(id) {
            return;
        }
        let now = self.clock.now();
        let elapsed = now - t.last_event;
        self.advance_timer(id, elapsed);
        self.timer_mut(id).last_event = now;
    }

    /// Apply `counts` decrements to the timer, raising the underflow flag
    /// and handling reload per run mode. Timer A underflows are forwarded
    /// to timer B when it counts them.
    fn advance_timer(&mut self, id: TimerId, counts: u64) {
        let t = self.timer(id);
        if counts <= t.value as u64 {
            self.timer_mut(id).value -= counts as u16;
            return;
        }

        let flag = match id {
            TimerId::A => icr::TIMER_A,
            TimerId::B => icr::TIMER_B,
        };
        self.raise_int_flags(flag);

        let t = self.timer_mut(id);
        if t.cr & control::RUNMODE != 0 {
            // One-shot: reload the latch and stop.
            t.value = t.latch;
            t.cr &= !control::START;
            if id == TimerId::A {
                self.feed_timer_b(1);
            }
        } else {
            // Continuous: figure out how many underflows the elapsed span
            // contains and where in the period the counter now sits.
            let period = t.latch as u64 + 1;
            let after_first = counts - t.value as u64 - 1;
            let underflows = 1 + after_first / period;
            let remainder = after_first % period;
            t.value = t.latch - remainder as u16;
            if id == TimerId::A {
                self.feed_timer_b(underflows);
            }
        }
    }

    fn feed_timer_b(&mut self, pulses: u64) {
        if self.timer_b.running() && self.timer_b.counts_timer_a() {
            self.advance_timer(TimerId::B, pulses);
        }
    }

    /// Arm or disarm the timer's scheduler deadline for its current state.
    /// Only a running cycle-counting timer predicts a deadline; a timer fed
    /// by timer A underflows advances through [`Cia::feed_timer_b`].
    fn start_timer(&mut self, id: TimerId) {
        let now = self.clock.now();
        let t = self.timer_mut(id);
        if t.running() && t.counts_cycles(id) {
            t.last_event = now;
            let due = now + t.value as u64 + 1;
            let slot = t.slot;
            self.scheduler.queue(due, slot);
        } else {
            let slot = t.slot;
            self.scheduler.cancel(slot);
        }
    }

    // ----- interrupt logic -------------------------------------------------

    fn raise_int_flags(&mut self, flags: u8) {
        self.int_flags |= flags;
        self.update_interrupt_status();
    }

    /// Recompute `flags & mask` and edge-trigger the CPU line on changes.
    /// While the request is active, bit 7 of the flag register reads as set.
    fn update_interrupt_status(&mut self) {
        let new_masked = self.int_flags & self.int_mask;
        if new_masked != 0 && self.masked_flags == 0 {
            self.irq.raise(self.irq_source);
        }
        if new_masked == 0 && self.masked_flags != 0 {
            self.irq.lower(self.irq_source);
        }
        if new_masked != 0 {
            self.int_flags |= icr::REQUESTED;
        }
        self.masked_flags = new_masked;
    }
}
