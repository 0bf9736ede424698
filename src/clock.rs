//! The host's side of time: which session may run, when ticks fire, and how
//! fast the display refreshes.
use log::debug;
use spin_sleep::LoopHelper;

/// Names the session a tick belongs to. Only the most recently activated
/// token is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u64);

/// hands out session tokens, at most one of which is live
#[derive(Debug, Default)]
pub struct TokenSource {
    issued: u64,
    active: Option<SessionToken>,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// issue a fresh token; every earlier one is dead from here on
    pub fn activate(&mut self) -> SessionToken {
        self.issued += 1;
        let token = SessionToken(self.issued);
        self.active = Some(token);
        token
    }

    /// teardown: no token is live afterwards
    pub fn invalidate(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self, token: SessionToken) -> bool {
        self.active == Some(token)
    }

    pub fn active(&self) -> Option<SessionToken> {
        self.active
    }
}

/// a scheduled tick, for cancelling it before it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// The display-refresh primitive: a tick requested now is delivered once,
/// at the next refresh boundary.
pub trait RefreshPrimitive {
    fn request_tick(&mut self, token: SessionToken) -> TickHandle;

    /// drop a tick that hasn't fired yet; unknown handles are ignored
    fn cancel(&mut self, handle: TickHandle);
}

/// Ticks waiting for the next refresh boundary.
#[derive(Debug, Default)]
pub struct RefreshQueue {
    next_handle: u64,
    pending: Vec<(TickHandle, SessionToken)>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every tick due at this boundary, oldest first. Anything
    /// requested while these run waits for the following boundary, so ticks
    /// never overlap.
    pub fn fire(&mut self) -> Vec<SessionToken> {
        self.pending.drain(..).map(|(_, token)| token).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl RefreshPrimitive for RefreshQueue {
    fn request_tick(&mut self, token: SessionToken) -> TickHandle {
        self.next_handle += 1;
        let handle = TickHandle(self.next_handle);
        self.pending.push((handle, token));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.pending.retain(|(h, _)| *h != handle);
    }
}

/// Sleeps out the rest of each refresh period.
pub struct FramePacer {
    helper: LoopHelper,
}

impl FramePacer {
    pub fn new(refresh_hz: f64) -> Self {
        FramePacer {
            helper: LoopHelper::builder()
                .report_interval_s(1.0)
                .build_with_target_rate(refresh_hz),
        }
    }

    /// mark the start of a refresh period
    pub fn start(&mut self) {
        self.helper.loop_start();
        if let Some(rate) = self.helper.report_rate() {
            debug!("refreshing at {:.1}Hz", rate);
        }
    }

    /// block until the next refresh boundary
    pub fn wait(&mut self) {
        self.helper.loop_sleep();
    }
}
