//! # session
//!
//! Owns the one running (machine, scheduler) pair and swaps it out when a new
//! ROM arrives.
//!
//! ```text
//!  Idle ──select──► Loading ──loaded──► Running ──select──► Loading ...
//!                      │                                       │
//!                      └──failed──► Idle          failed ──────┴──► Running (old one)
//! ```
//!
//! The old session keeps running while its replacement loads. Activation
//! cancels the old pending tick and retires its token in one step, so a
//! tick for the old session that was already due when the swap happened
//! finds its token dead and does nothing.
//!
//! Key state lives in one `InputMapper` for the life of the process; it is
//! cleared whenever a session activates so nothing stays held across ROMs.
use crate::clock::{RefreshPrimitive, SessionToken, TickHandle, TokenSource};
use crate::error::HarnessError;
use crate::input::{InputMapper, KeyTable};
use crate::machine::Machine;
use crate::rom::{LoadTicket, Rom};
use crate::scheduler::{CycleScheduler, SchedulerSettings, Sinks, TickOutcome};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// a ROM is on its way; any running session carries on until it lands
    Loading,
    Running,
}

/// what became of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Ran(TickOutcome),
    /// the tick's session is gone; nothing ran and nothing was rescheduled
    Stale,
}

struct Session<M> {
    token: SessionToken,
    vm: M,
    scheduler: CycleScheduler,
    rom: String,
    pending: Option<TickHandle>,
}

pub struct SessionManager<M, F>
where
    F: FnMut() -> M,
{
    factory: F,
    settings: SchedulerSettings,
    tokens: TokenSource,
    input: InputMapper,
    session: Option<Session<M>>,
    loading: Option<LoadTicket>,
    tickets: u64,
}

impl<M, F> SessionManager<M, F>
where
    M: Machine,
    F: FnMut() -> M,
{
    /// `factory` builds a fresh machine for every session
    pub fn new(factory: F, settings: SchedulerSettings, input: InputMapper) -> Self {
        SessionManager {
            factory,
            settings,
            tokens: TokenSource::new(),
            input,
            session: None,
            loading: None,
            tickets: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.loading.is_some() {
            SessionState::Loading
        } else if self.session.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    /// Start a selection. The returned ticket must accompany the finished
    /// load; any earlier ticket is stale from here on.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.tickets += 1;
        let ticket = LoadTicket(self.tickets);
        self.loading = Some(ticket);
        ticket
    }

    /// Finish a selection. On success the new session is running and its
    /// first tick is requested; `Ok(None)` means the ticket was superseded
    /// and the result was dropped. On failure whatever was running before is
    /// left exactly as it was.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Rom, HarnessError>,
        refresh: &mut impl RefreshPrimitive,
    ) -> Result<Option<SessionToken>, HarnessError> {
        if self.loading != Some(ticket) {
            debug!("discarding superseded load {:?}", ticket);
            return Ok(None);
        }
        self.loading = None;

        let rom = result?;
        let mut vm = (self.factory)();
        vm.load_program(&rom.bytes)?;

        if let Some(old) = self.session.take() {
            if let Some(handle) = old.pending {
                refresh.cancel(handle);
            }
            debug!(
                "retiring {} after {} ticks ({} cycles)",
                old.rom,
                old.scheduler.ticks(),
                old.scheduler.cycles()
            );
        }

        let token = self.tokens.activate();
        self.input.reset();
        info!("running {} ({} bytes)", rom.name, rom.bytes.len());
        if let Some(description) = &rom.description {
            info!("{}", description);
        }
        let pending = Some(refresh.request_tick(token));
        self.session = Some(Session {
            token,
            vm,
            scheduler: CycleScheduler::with_settings(&self.settings),
            rom: rom.name,
            pending,
        });
        Ok(Some(token))
    }

    /// Run the tick `token` was scheduled for, then ask for the next one.
    pub fn on_tick(
        &mut self,
        token: SessionToken,
        refresh: &mut impl RefreshPrimitive,
        sinks: &mut Sinks<'_>,
    ) -> Result<TickStatus, HarnessError> {
        let session = match self.session.as_mut() {
            Some(s) if self.tokens.is_active(token) && s.token == token => s,
            _ => {
                debug!("discarding stale tick for {:?}", token);
                return Ok(TickStatus::Stale);
            }
        };
        session.pending = None;
        let outcome = session.scheduler.tick(&mut session.vm, sinks)?;
        session.pending = Some(refresh.request_tick(token));
        Ok(TickStatus::Ran(outcome))
    }

    /// A host key went down or up. Only real transitions reach the machine,
    /// and only if one is running.
    pub fn key_event(&mut self, host: char, pressed: bool) {
        let Some(key) = self.input.key_event(host, pressed) else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            session.vm.set_key(key, pressed);
        }
    }

    /// stop for good: no tick fires for the current session after this
    pub fn teardown(&mut self, refresh: &mut impl RefreshPrimitive) {
        self.loading = None;
        if let Some(session) = self.session.take() {
            if let Some(handle) = session.pending {
                refresh.cancel(handle);
            }
            info!(
                "stopped {} after {} ticks",
                session.rom,
                session.scheduler.ticks()
            );
        }
        self.tokens.invalidate();
        self.input.reset();
    }

    pub fn active_token(&self) -> Option<SessionToken> {
        self.tokens.active()
    }

    /// name of the running ROM
    pub fn rom_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.rom.as_str())
    }

    /// ticks run by the current session
    pub fn ticks(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.scheduler.ticks())
    }

    pub fn keys(&self) -> &KeyTable {
        self.input.table()
    }
}
