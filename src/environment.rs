//! # environment
//!
//! Sets everything up and runs the main loop. Each pass of the loop is one
//! refresh boundary:
//!
//! ```text
//!  poll host input ──► deliver finished ROM loads ──► fire due ticks ──► sleep
//! ```
//!
//! Host input and ROM completions are both handled between ticks, never
//! inside one, so a tick always runs to completion before anything else
//! touches the session.
use crate::clock::{FramePacer, RefreshQueue};
use crate::display::Display;
use crate::error::HarnessError;
use crate::input::{HostEvent, Input};
use crate::machine::Machine;
use crate::rom::{LoadTicket, Rom, RomLoader, RomRequest};
use crate::scheduler::Sinks;
use crate::session::{SessionManager, SessionState};
use crate::sound::Sound;
use log::{error, info, warn};

/// whether to keep going after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Environment<'a, M, F>
where
    F: FnMut() -> M,
{
    sessions: SessionManager<M, F>,
    refresh: RefreshQueue,
    loader: RomLoader,
    catalog: Vec<String>,
    input: &'a mut dyn Input,
    display: &'a mut dyn Display,
    sound: &'a mut dyn Sound,
}

impl<'a, M, F> Environment<'a, M, F>
where
    M: Machine,
    F: FnMut() -> M,
{
    /// `catalog` names the ROMs behind the slot keys, in slot order
    pub fn new(
        sessions: SessionManager<M, F>,
        loader: RomLoader,
        catalog: Vec<String>,
        input: &'a mut dyn Input,
        display: &'a mut dyn Display,
        sound: &'a mut dyn Sound,
    ) -> Self {
        Environment {
            sessions,
            refresh: RefreshQueue::new(),
            loader,
            catalog,
            input,
            display,
            sound,
        }
    }

    /// start loading a ROM; whatever is running carries on until it arrives
    pub fn select(&mut self, request: RomRequest) {
        let ticket = self.sessions.begin_load();
        let label = request.label();
        info!("loading {}", label);
        self.display.caption(&format!("loading {}", label));
        self.loader.submit(ticket, request);
    }

    /// select the ROM in catalog slot `slot`
    pub fn select_slot(&mut self, slot: usize) -> Result<(), HarnessError> {
        let name = self
            .catalog
            .get(slot)
            .cloned()
            .ok_or(HarnessError::UnknownSlot(slot))?;
        self.select(RomRequest::Named(name));
        Ok(())
    }

    /// act on one host event
    pub fn handle(&mut self, event: HostEvent) -> Flow {
        match event {
            HostEvent::Key { key, pressed } => self.sessions.key_event(key, pressed),
            HostEvent::SelectSlot(slot) => {
                if let Err(e) = self.select_slot(slot) {
                    self.report(&e);
                }
            }
            HostEvent::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// one refresh boundary
    pub fn step(&mut self) -> Result<Flow, HarnessError> {
        for event in self.input.poll_events()? {
            if self.handle(event) == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }

        for (ticket, result) in self.loader.poll() {
            self.finish_load(ticket, result);
        }

        let mut sinks = Sinks {
            display: &mut *self.display,
            sound: &mut *self.sound,
        };
        for token in self.refresh.fire() {
            self.sessions.on_tick(token, &mut self.refresh, &mut sinks)?;
        }
        Ok(Flow::Continue)
    }

    /// Step at the pacer's rate until the user quits or the display fails.
    /// The session is torn down either way.
    pub fn run(&mut self, pacer: &mut FramePacer) -> Result<(), HarnessError> {
        let result = loop {
            pacer.start();
            match self.step() {
                Ok(Flow::Continue) => pacer.wait(),
                Ok(Flow::Quit) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.sessions.teardown(&mut self.refresh);
        result
    }

    pub fn state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn sessions(&self) -> &SessionManager<M, F> {
        &self.sessions
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    fn finish_load(&mut self, ticket: LoadTicket, result: Result<Rom, HarnessError>) {
        match self
            .sessions
            .complete_load(ticket, result, &mut self.refresh)
        {
            Ok(Some(_)) => {
                if let Some(name) = self.sessions.rom_name() {
                    self.display.caption(name);
                }
            }
            Ok(None) => {}
            Err(e) => self.report(&e),
        }
    }

    /// tell the user something went wrong; nothing else changes
    fn report(&mut self, e: &HarnessError) {
        error!("{}", e);
        self.display.caption(&e.to_string());
        // repaint so the message shows even with nothing running
        if let Err(e) = self.display.present() {
            warn!("couldn't show error: {}", e);
        }
    }
}
