use beep::beep;
use log::warn;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Makes beeps. Fire and forget: a pulse returns straight away, nothing is
/// queued, and a new pulse may cut across one still sounding.
pub trait Sound {
    fn pulse(&mut self, frequency: u16, gain: f32, duration: Duration);
}

/// the tone the scheduler asks for when the sound timer is running
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: u16,
    pub gain: f32,
    pub duration: Duration,
}

pub const SIMPLEBEEP_PITCH: u16 = 2093; // C

impl Default for Tone {
    fn default() -> Self {
        Tone {
            frequency: SIMPLEBEEP_PITCH,
            gain: 1.0,
            duration: Duration::from_millis(50),
        }
    }
}

/// PC speaker beeps via the `beep` crate. The speaker has no volume
/// control, so any gain above zero is full volume.
///
/// One background thread turns the speaker off. Each pulse hands it a new
/// deadline, which replaces any earlier one.
pub struct SimpleBeep {
    stops: Option<Sender<Instant>>,
    worker: Option<JoinHandle<()>>,
    failed: bool,
}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep {
            stops: None,
            worker: None,
            failed: false,
        }
    }

    /// the stop thread, started on first use
    fn stops(&mut self) -> Option<&Sender<Instant>> {
        if self.stops.is_none() {
            let (tx, rx) = mpsc::channel();
            let spawned = thread::Builder::new()
                .name("beep-stop".into())
                .spawn(move || silence_at_deadlines(rx, silence_speaker));
            match spawned {
                Ok(worker) => {
                    self.stops = Some(tx);
                    self.worker = Some(worker);
                }
                Err(e) => {
                    warn!("couldn't start the beep thread, carrying on without sound: {}", e);
                    self.failed = true;
                }
            }
        }
        self.stops.as_ref()
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new()
    }
}

impl Sound for SimpleBeep {
    fn pulse(&mut self, frequency: u16, gain: f32, duration: Duration) {
        if gain <= 0.0 || self.failed {
            return;
        }
        let Some(stops) = self.stops().cloned() else {
            return;
        };
        if let Err(e) = beep(frequency) {
            // usually a permissions problem with the speaker device
            warn!("beep failed, carrying on without sound: {}", e);
            self.failed = true;
            return;
        }
        if stops.send(Instant::now() + duration).is_err() {
            warn!("beep thread has stopped; silencing now");
            silence_speaker();
        }
    }
}

impl Drop for SimpleBeep {
    fn drop(&mut self) {
        // closing the channel silences anything still sounding and ends the thread
        self.stops.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn silence_speaker() {
    if let Err(e) = beep(0) {
        warn!("couldn't silence the speaker: {}", e);
    }
}

/// Call `silence` once the latest deadline passes. A deadline that arrives
/// before the current one is due replaces it.
fn silence_at_deadlines(deadlines: Receiver<Instant>, mut silence: impl FnMut()) {
    let mut due: Option<Instant> = None;
    loop {
        let next = match due {
            None => deadlines.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(at) => deadlines.recv_timeout(at.saturating_duration_since(Instant::now())),
        };
        match next {
            Ok(at) => due = Some(at),
            Err(RecvTimeoutError::Timeout) => {
                silence();
                due = None;
            }
            Err(RecvTimeoutError::Disconnected) => {
                if due.is_some() {
                    silence();
                }
                return;
            }
        }
    }
}

pub struct Mute {}

impl Mute {
    pub fn new() -> Self {
        Mute {}
    }
}

impl Default for Mute {
    fn default() -> Self {
        Self::new()
    }
}

impl Sound for Mute {
    fn pulse(&mut self, _frequency: u16, _gain: f32, _duration: Duration) {}
}
