//! # Machine Orchestrator
//!
//! [`C64System`] wires the parts together (clock, interrupt line, event
//! scheduler, two CIAs, the banked address space, the CPU) and drives
//! them. The driving loop alternates between firing whatever scheduler
//! deadlines the clock has passed and stepping the CPU; the video
//! collaborator is granted the cycles each instruction consumed.
//!
//! A host renders frames by calling [`C64System::run_cycles`] with a
//! frame's worth of cycles (about 20000 for PAL) and then presenting
//! whatever its video collaborator accumulated.

use crate::cpu::{Cpu, IrqLine};
use crate::devices::cia::{Cia, TimerId};
use crate::devices::keyboard::{KeyStateHandle, MatrixKeyboard};
use crate::devices::{NullVideo, VideoDevice};
use crate::memory::{AddressSpace, RomSet};
use crate::scheduler::{Clock, EventSlot, SchedulerHandle};

/// The whole machine.
pub struct C64System {
    pub cpu: Cpu<AddressSpace>,
    clock: Clock,
    scheduler: SchedulerHandle,
    keys: KeyStateHandle,
}

impl C64System {
    /// Build a machine with no display attached.
    pub fn new(roms: RomSet) -> Self {
        Self::with_video(roms, Box::new(NullVideo))
    }

    /// Build a machine around the given video collaborator. The system
    /// comes up reset and ready to step.
    pub fn with_video(roms: RomSet, video: Box<dyn VideoDevice>) -> Self {
        let clock = Clock::new();
        let irq = IrqLine::new();
        let scheduler = SchedulerHandle::new();
        let keys = KeyStateHandle::new();

        let mut cia1 = Cia::new(
            clock.clone(),
            scheduler.clone(),
            irq.clone(),
            IrqLine::CIA1,
            EventSlot::Cia1TimerA,
            EventSlot::Cia1TimerB,
        );
        cia1.set_port_hook(Box::new(MatrixKeyboard::new(keys.clone())));
        let cia2 = Cia::new(
            clock.clone(),
            scheduler.clone(),
            irq.clone(),
            IrqLine::CIA2,
            EventSlot::Cia2TimerA,
            EventSlot::Cia2TimerB,
        );

        let space = AddressSpace::new(roms, cia1, cia2, video);
        let cpu = Cpu::new(space, clock.clone(), irq);

        let mut system = C64System { cpu, clock, scheduler, keys };
        system.reset();
        system
    }

    /// Hard reset: clock back to zero, pending events and interrupt
    /// requests dropped, banking and CIAs to power-on state. The CPU goes
    /// last; its reset vector read needs the KERNAL mapped in.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.scheduler.clear();
        self.cpu.irq_line().clear_all();
        self.cpu.memory.reset();
        self.cpu.reset();
    }

    /// Handle onto the pressed-key bitmap for feeding host input in.
    pub fn keyboard(&self) -> KeyStateHandle {
        self.keys.clone()
    }

    /// Current cycle count.
    pub fn cycles(&self) -> u64 {
        self.clock.now()
    }

    /// Execute one instruction, delivering any deadlines and interrupts
    /// that precede it. Returns `false` once the CPU has stopped.
    pub fn step(&mut self) -> bool {
        self.dispatch_due();
        let before = self.clock.now();
        if !self.cpu.step() {
            return false;
        }
        let elapsed = self.clock.now() - before;
        self.cpu.memory.video_mut().advance(elapsed);
        true
    }

    /// Run for at least `cycles` cycles (stopping at the end of the
    /// instruction that crosses the target). Returns `false` if the CPU
    /// stopped before the target was reached.
    pub fn run_cycles(&mut self, cycles: u64) -> bool {
        let target = self.clock.now() + cycles;
        while self.clock.now() < target {
            if !self.step() {
                return false;
            }
        }
        self.dispatch_due();
        true
    }

    /// Fire every scheduled deadline the clock has already passed. Handlers
    /// may re-queue, so keep draining until nothing is due.
    fn dispatch_due(&mut self) {
        let now = self.clock.now();
        while let Some(slot) = self.scheduler.pop_due(now) {
            match slot {
                EventSlot::Cia1TimerA => self.cpu.memory.cia1.service_timer(TimerId::A),
                EventSlot::Cia1TimerB => self.cpu.memory.cia1.service_timer(TimerId::B),
                EventSlot::Cia2TimerA => self.cpu.memory.cia2.service_timer(TimerId::A),
                EventSlot::Cia2TimerB => self.cpu.memory.cia2.service_timer(TimerId::B),
            }
        }
    }
}
