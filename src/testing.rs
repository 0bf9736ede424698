//! Doubles shared by the scheduler, session and environment tests.
use crate::error::HarnessError;
use crate::machine::{Key, Machine, Pixel, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::sound::Sound;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Cycle,
    Timers,
    Load(Vec<u8>),
    SetKey(Key, bool),
}

/// every boundary call made by every `ScriptedMachine`, in order, tagged with
/// the machine's id
#[derive(Debug, Default)]
pub struct MachineLog {
    pub calls: Vec<(u32, Call)>,
}

impl MachineLog {
    pub fn shared() -> Rc<RefCell<MachineLog>> {
        Rc::new(RefCell::new(MachineLog::default()))
    }

    pub fn cycles(&self, id: u32) -> usize {
        self.count(id, |c| *c == Call::Cycle)
    }

    pub fn timer_ticks(&self, id: u32) -> usize {
        self.count(id, |c| *c == Call::Timers)
    }

    pub fn keys(&self, id: u32) -> Vec<(Key, bool)> {
        self.calls
            .iter()
            .filter(|(who, _)| *who == id)
            .filter_map(|(_, c)| match c {
                Call::SetKey(key, pressed) => Some((*key, *pressed)),
                _ => None,
            })
            .collect()
    }

    /// ids in the order their calls were made, runs collapsed
    pub fn machine_order(&self) -> Vec<u32> {
        let mut order: Vec<u32> = self.calls.iter().map(|(id, _)| *id).collect();
        order.dedup();
        order
    }

    fn count(&self, id: u32, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls
            .iter()
            .filter(|(who, c)| *who == id && pred(c))
            .count()
    }
}

/// A machine that does nothing but log. Cycle `c` (counting from 1) lights
/// only pixel `c - 1`, so a repaint shows which cycle it came from.
pub struct ScriptedMachine {
    id: u32,
    log: Rc<RefCell<MachineLog>>,
    cycle: u64,
    timer_ticks: u64,
    redraw_cycles: Vec<u64>,
    beep_ticks: Vec<u64>,
    redraw: bool,
    reject_programs: bool,
    display: Vec<Pixel>,
}

impl ScriptedMachine {
    pub fn new(id: u32, log: &Rc<RefCell<MachineLog>>) -> Self {
        ScriptedMachine {
            id,
            log: Rc::clone(log),
            cycle: 0,
            timer_ticks: 0,
            redraw_cycles: Vec::new(),
            beep_ticks: Vec::new(),
            redraw: false,
            reject_programs: false,
            display: vec![0; DISPLAY_WIDTH * DISPLAY_HEIGHT],
        }
    }

    /// report a redraw after these cycles (counted over the machine's life)
    pub fn redraw_on_cycles(mut self, cycles: &[u64]) -> Self {
        self.redraw_cycles = cycles.to_vec();
        self
    }

    /// signal a beep on these timer ticks
    pub fn beep_on_ticks(mut self, ticks: &[u64]) -> Self {
        self.beep_ticks = ticks.to_vec();
        self
    }

    /// refuse every program as too large
    pub fn rejecting_programs(mut self) -> Self {
        self.reject_programs = true;
        self
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().calls.push((self.id, call));
    }
}

impl Machine for ScriptedMachine {
    fn advance_one_cycle(&mut self) {
        self.cycle += 1;
        self.display.fill(0);
        let lit = (self.cycle - 1) as usize % self.display.len();
        self.display[lit] = 1;
        self.redraw = self.redraw_cycles.contains(&self.cycle);
        self.record(Call::Cycle);
    }

    fn pending_redraw(&self) -> bool {
        self.redraw
    }

    fn tick_timers(&mut self) -> bool {
        self.timer_ticks += 1;
        self.record(Call::Timers);
        self.beep_ticks.contains(&self.timer_ticks)
    }

    fn snapshot_display(&self) -> &[Pixel] {
        &self.display
    }

    fn load_program(&mut self, program: &[u8]) -> Result<(), HarnessError> {
        if self.reject_programs {
            return Err(HarnessError::RomTooLarge {
                size: program.len(),
                max_size: 0,
            });
        }
        self.record(Call::Load(program.to_vec()));
        Ok(())
    }

    fn set_key(&mut self, key: Key, pressed: bool) {
        self.record(Call::SetKey(key, pressed));
    }
}

/// remembers every pulse it was asked for
#[derive(Debug, Default)]
pub struct RecordingSound {
    pub pulses: Vec<(u16, f32, Duration)>,
}

impl Sound for RecordingSound {
    fn pulse(&mut self, frequency: u16, gain: f32, duration: Duration) {
        self.pulses.push((frequency, gain, duration));
    }
}
