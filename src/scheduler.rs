//! # scheduler
//!
//! One tick per display refresh. Each tick runs a fixed batch of machine
//! cycles, then steps the 60Hz timers exactly once:
//!
//! ```text
//!  refresh ──► [cycle × N] ──► tick_timers ──► beep? ──► repaint?
//! ```
//!
//! * the CPU rate is N × refresh rate (10 × 60Hz = 600 instructions a second)
//!   and the timer rate is the refresh rate; the two are never tied together
//! * if the host refreshes slowly, both slow down together
//! * the redraw flag is ORed over the whole batch so the screen is painted at
//!   most once per tick, from the frame as it stands after the last cycle
//! * a new scheduler always paints on its first tick, so a session that
//!   never draws still replaces whatever the last one left on screen
use crate::display::{render_frame, Display};
use crate::error::HarnessError;
use crate::machine::{Machine, DISPLAY_WIDTH};
use crate::sound::{Sound, Tone};

pub const DEFAULT_CYCLES_PER_TICK: u32 = 10;

/// what a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub redrawn: bool,
    pub beeped: bool,
}

/// the sinks a tick can write to
pub struct Sinks<'a> {
    pub display: &'a mut dyn Display,
    pub sound: &'a mut dyn Sound,
}

/// knobs fixed for the life of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub cycles_per_tick: u32,
    /// host pixels per logical pixel
    pub scale: usize,
    pub tone: Tone,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            cycles_per_tick: DEFAULT_CYCLES_PER_TICK,
            scale: 1,
            tone: Tone::default(),
        }
    }
}

pub struct CycleScheduler {
    cycles_per_tick: u32,
    scale: usize,
    tone: Tone,
    ticks: u64,
    cycles: u64,
    // set until the first tick has painted
    repaint: bool,
}

impl CycleScheduler {
    pub fn new(cycles_per_tick: u32, scale: usize, tone: Tone) -> Self {
        CycleScheduler {
            cycles_per_tick: cycles_per_tick.max(1),
            scale: scale.max(1),
            tone,
            ticks: 0,
            cycles: 0,
            repaint: true,
        }
    }

    pub fn with_settings(settings: &SchedulerSettings) -> Self {
        Self::new(settings.cycles_per_tick, settings.scale, settings.tone)
    }

    /// run one tick against `vm`
    pub fn tick<M: Machine + ?Sized>(
        &mut self,
        vm: &mut M,
        sinks: &mut Sinks<'_>,
    ) -> Result<TickOutcome, HarnessError> {
        let mut redraw = std::mem::take(&mut self.repaint);
        for _ in 0..self.cycles_per_tick {
            vm.advance_one_cycle();
            redraw |= vm.pending_redraw();
        }
        self.cycles += self.cycles_per_tick as u64;
        self.ticks += 1;

        let beeped = vm.tick_timers();
        if beeped {
            sinks
                .sound
                .pulse(self.tone.frequency, self.tone.gain, self.tone.duration);
        }

        if redraw {
            render_frame(&mut *sinks.display, vm.snapshot_display(), DISPLAY_WIDTH, self.scale)?;
        }

        Ok(TickOutcome {
            redrawn: redraw,
            beeped,
        })
    }

    pub fn cycles_per_tick(&self) -> u32 {
        self.cycles_per_tick
    }

    /// ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::interpreter::Chip8Interpreter;
    use crate::testing::{MachineLog, RecordingSound, ScriptedMachine};

    fn run_ticks(
        scheduler: &mut CycleScheduler,
        vm: &mut ScriptedMachine,
        display: &mut DummyDisplay,
        sound: &mut RecordingSound,
        ticks: usize,
    ) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..ticks {
            let mut sinks = Sinks {
                display: &mut *display,
                sound: &mut *sound,
            };
            outcomes.push(scheduler.tick(vm, &mut sinks).unwrap());
        }
        outcomes
    }

    #[test]
    fn test_cycle_and_timer_counts() {
        for n in [1, 3, 10] {
            let log = MachineLog::shared();
            let mut vm = ScriptedMachine::new(1, &log);
            let mut s = CycleScheduler::new(n, 1, Tone::default());
            let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());
            run_ticks(&mut s, &mut vm, &mut d, &mut a, 7);

            let log = log.borrow();
            assert_eq!(log.cycles(1), 7 * n as usize);
            assert_eq!(log.timer_ticks(1), 7);
            assert_eq!(s.ticks(), 7);
            assert_eq!(s.cycles(), 7 * n as u64);
        }
    }

    #[test]
    fn test_redraw_coalesced_to_post_batch_frame() {
        let log = MachineLog::shared();
        // redraw reported on cycle 7 only; the frame changes on every cycle
        let mut vm = ScriptedMachine::new(1, &log).redraw_on_cycles(&[7]);
        let mut s = CycleScheduler::new(10, 1, Tone::default());
        let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());

        let outcome = run_ticks(&mut s, &mut vm, &mut d, &mut a, 1);
        assert!(outcome[0].redrawn);
        assert_eq!(d.clears, 1);
        assert_eq!(d.presents, 1);
        // ScriptedMachine lights pixel `cycle - 1`; after 10 cycles that's pixel 9
        assert_eq!(d.blocks, vec![(9, 0, 1)]);
    }

    #[test]
    fn test_many_redraws_one_repaint() {
        let log = MachineLog::shared();
        let mut vm = ScriptedMachine::new(1, &log).redraw_on_cycles(&[1, 2, 3, 4, 5]);
        let mut s = CycleScheduler::new(5, 1, Tone::default());
        let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());
        run_ticks(&mut s, &mut vm, &mut d, &mut a, 1);
        assert_eq!(d.clears, 1);
        assert_eq!(d.presents, 1);
    }

    #[test]
    fn test_no_redraw_no_repaint_after_first_tick() {
        let log = MachineLog::shared();
        let mut vm = ScriptedMachine::new(1, &log);
        let mut s = CycleScheduler::new(10, 1, Tone::default());
        let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());
        let outcome = run_ticks(&mut s, &mut vm, &mut d, &mut a, 3);
        assert_eq!(
            outcome.iter().map(|o| o.redrawn).collect::<Vec<_>>(),
            vec![true, false, false]
        );
        assert_eq!(d.clears, 1);
        assert_eq!(d.presents, 1);
    }

    #[test]
    fn test_first_tick_paints_program_that_never_draws() -> Result<(), HarnessError> {
        // 6001: V0 = 1, 1202: jump to self
        let mut vm = Chip8Interpreter::new();
        vm.load_program(&[0x60, 0x01, 0x12, 0x02])?;
        let mut s = CycleScheduler::new(10, 1, Tone::default());
        let mut d = DummyDisplay::new();
        // stale blocks from whatever was on screen before
        d.blocks.push((3, 3, 1));
        let mut a = RecordingSound::default();
        let mut sinks = Sinks {
            display: &mut d,
            sound: &mut a,
        };

        assert!(s.tick(&mut vm, &mut sinks)?.redrawn);
        assert!(!s.tick(&mut vm, &mut sinks)?.redrawn);
        assert_eq!(d.clears, 1);
        assert_eq!(d.presents, 1);
        assert!(d.blocks.is_empty());
        Ok(())
    }

    #[test]
    fn test_redraw_flag_not_carried_between_ticks() {
        let log = MachineLog::shared();
        let mut vm = ScriptedMachine::new(1, &log).redraw_on_cycles(&[2]);
        let mut s = CycleScheduler::new(2, 1, Tone::default());
        let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());
        let outcome = run_ticks(&mut s, &mut vm, &mut d, &mut a, 3);
        assert_eq!(
            outcome.iter().map(|o| o.redrawn).collect::<Vec<_>>(),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_beep_only_on_signalled_tick() {
        let log = MachineLog::shared();
        let mut vm = ScriptedMachine::new(1, &log).beep_on_ticks(&[5]);
        let tone = Tone::default();
        let mut s = CycleScheduler::new(10, 1, tone);
        let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());
        let outcome = run_ticks(&mut s, &mut vm, &mut d, &mut a, 6);

        assert_eq!(
            outcome.iter().map(|o| o.beeped).collect::<Vec<_>>(),
            vec![false, false, false, false, true, false]
        );
        assert_eq!(a.pulses, vec![(tone.frequency, tone.gain, tone.duration)]);
    }

    #[test]
    fn test_scaled_blocks() {
        let log = MachineLog::shared();
        let mut vm = ScriptedMachine::new(1, &log).redraw_on_cycles(&[1]);
        let mut s = CycleScheduler::new(1, 10, Tone::default());
        let (mut d, mut a) = (DummyDisplay::new(), RecordingSound::default());
        run_ticks(&mut s, &mut vm, &mut d, &mut a, 1);
        assert_eq!(d.blocks, vec![(0, 0, 10)]);
    }

    #[test]
    fn test_zero_cycles_clamped() {
        let s = CycleScheduler::new(0, 0, Tone::default());
        assert_eq!(s.cycles_per_tick(), 1);
    }
}
