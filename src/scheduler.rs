//! # Cycle Clock and Event Scheduler
//!
//! Timekeeping for the whole machine. The [`Clock`] is the single
//! monotonically increasing cycle counter: the processor advances it, timer
//! chips and the scheduler read it. The [`Scheduler`] is an ordered queue of
//! pending cycle deadlines; instead of clocking every peripheral on every
//! instruction, a timer predicts the cycle of its next underflow and parks a
//! request here, and the orchestrator fires requests as the clock passes
//! their deadlines.
//!
//! Requests are identified by [`EventSlot`] tags rather than callback
//! pointers; the orchestrator dispatches a due slot back to the chip that
//! owns it. A slot can be queued at most once; re-queueing replaces the
//! previous entry.
//!
//! Both types are shared between components through cheap cloneable handles
//! ([`Clock`] itself, [`SchedulerHandle`]); the machine is single-threaded,
//! so plain `Rc` interior mutability is all that is needed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Deadline reported by [`Scheduler::next_deadline`] when nothing is queued.
/// The orchestrator may advance freely until this horizon.
pub const IDLE_HORIZON: u64 = u64::MAX;

/// Shared monotonically increasing cycle counter.
///
/// Cloning yields another handle onto the same counter.
#[derive(Debug, Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    /// Create a new clock at cycle 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cycle count.
    #[inline]
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    /// Advance the counter by `cycles`.
    #[inline]
    pub fn advance(&self, cycles: u64) {
        self.0.set(self.0.get() + cycles);
    }

    /// Rewind the counter to 0 (power-on reset).
    pub fn reset(&self) {
        self.0.set(0);
    }
}

/// Identity of a schedulable request. One slot per timer that can arm a
/// deadline; each slot may be queued at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSlot {
    Cia1TimerA,
    Cia1TimerB,
    Cia2TimerA,
    Cia2TimerB,
}

/// Number of distinct [`EventSlot`] values.
pub const EVENT_SLOTS: usize = 4;

impl EventSlot {
    #[inline]
    fn index(self) -> usize {
        match self {
            EventSlot::Cia1TimerA => 0,
            EventSlot::Cia1TimerB => 1,
            EventSlot::Cia2TimerA => 2,
            EventSlot::Cia2TimerB => 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: u64,
    slot: EventSlot,
}

/// Ordered queue of pending cycle-deadline requests.
///
/// The list stays sorted ascending by deadline, FIFO among equal deadlines.
/// Each slot carries a `queued` flag mirroring its presence in the list; a
/// disagreement between the two is an internal-consistency defect; it is
/// counted and repaired rather than panicking, since it indicates a
/// use-after-cancel or double-queue bug upstream, not a condition the
/// machine can do anything about.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Vec<Pending>,
    queued: [bool; EVENT_SLOTS],
    defects: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `slot` to fire at absolute cycle `due`. If the slot is already
    /// queued its previous entry is removed first.
    pub fn queue(&mut self, due: u64, slot: EventSlot) {
        if self.queued[slot.index()] {
            self.remove_entry(slot);
        }
        let at = self.pending.partition_point(|p| p.due <= due);
        self.pending.insert(at, Pending { due, slot });
        self.queued[slot.index()] = true;
    }

    /// Remove `slot` from the queue if present.
    pub fn cancel(&mut self, slot: EventSlot) {
        if self.queued[slot.index()] {
            self.remove_entry(slot);
            self.queued[slot.index()] = false;
        } else if self.pending.iter().any(|p| p.slot == slot) {
            // Entry present without its queued flag: defect, repair anyway.
            self.defects += 1;
            self.pending.retain(|p| p.slot != slot);
        }
    }

    /// Earliest queued deadline, or [`IDLE_HORIZON`] when empty.
    pub fn next_deadline(&self) -> u64 {
        self.pending.first().map_or(IDLE_HORIZON, |p| p.due)
    }

    /// Pop the earliest request whose deadline has been reached, if any.
    /// The caller dispatches the slot; the handler may immediately re-queue.
    pub fn pop_due(&mut self, now: u64) -> Option<EventSlot> {
        if self.pending.first()?.due > now {
            return None;
        }
        let entry = self.pending.remove(0);
        self.queued[entry.slot.index()] = false;
        Some(entry.slot)
    }

    /// Whether `slot` is currently queued.
    pub fn is_queued(&self, slot: EventSlot) -> bool {
        self.queued[slot.index()]
    }

    /// Count of internal-consistency violations observed so far. Always 0 in
    /// correct operation.
    pub fn defects(&self) -> u32 {
        self.defects
    }

    /// Drop every pending request (reset).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.queued = [false; EVENT_SLOTS];
    }

    fn remove_entry(&mut self, slot: EventSlot) {
        match self.pending.iter().position(|p| p.slot == slot) {
            Some(at) => {
                self.pending.remove(at);
            }
            None => {
                // Queued flag set but no entry in the list.
                self.defects += 1;
            }
        }
    }
}

/// Cloneable shared handle onto a [`Scheduler`].
///
/// Timer chips hold one to arm and cancel their deadlines from inside
/// register writes; the orchestrator holds another to drain due requests.
/// No scheduler method calls back out, so the interior `RefCell` borrow is
/// never held across component boundaries.
#[derive(Debug, Clone, Default)]
pub struct SchedulerHandle(Rc<RefCell<Scheduler>>);

impl SchedulerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`Scheduler::queue`].
    pub fn queue(&self, due: u64, slot: EventSlot) {
        self.0.borrow_mut().queue(due, slot);
    }

    /// See [`Scheduler::cancel`].
    pub fn cancel(&self, slot: EventSlot) {
        self.0.borrow_mut().cancel(slot);
    }

    /// See [`Scheduler::next_deadline`].
    pub fn next_deadline(&self) -> u64 {
        self.0.borrow().next_deadline()
    }

    /// See [`Scheduler::pop_due`].
    pub fn pop_due(&self, now: u64) -> Option<EventSlot> {
        self.0.borrow_mut().pop_due(now)
    }

    /// See [`Scheduler::is_queued`].
    pub fn is_queued(&self, slot: EventSlot) -> bool {
        self.0.borrow().is_queued(slot)
    }

    /// See [`Scheduler::defects`].
    pub fn defects(&self) -> u32 {
        self.0.borrow().defects()
    }

    /// See [`Scheduler::clear`].
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}
