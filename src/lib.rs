//! # chip8-harness
//!
//! Runs a CHIP-8 machine against a terminal that refreshes at its own rate.
//!
//! ## Design
//!
//! * the machine is a trait (`machine::Machine`); the harness never looks
//!   inside it, so any interpreter that can step, report redraws, tick its
//!   timers and show its frame buffer will do
//! * one tick per display refresh; a tick is N machine cycles and exactly one
//!   timer tick, so CPU speed is N x refresh and the timers stay at refresh
//! * redraws are coalesced: at most one repaint per tick, from the frame as
//!   it is after the last cycle
//! * display, input and sound are traits with a terminal implementation and a
//!   dummy one for tests
//! * one session at a time; every scheduled tick carries its session's token
//!   and a tick whose token is dead does nothing
//!
//! Model
//!
//! ```text
//! Environment
//!  |-- input, display, sound, ROM loader (worker thread), refresh queue
//!  |-- session manager
//!  |    |-- input mapper: keymap + key table, shared by every session
//!  |    |-- token source
//!  |    `-- session: machine + cycle scheduler + pending tick
//!  `-- main loop, once per refresh
//!       |-- host events -> key transitions, ROM selection, quit
//!       |-- finished loads -> activate a new session (or report the failure)
//!       |-- due ticks -> session.on_tick(token)
//!       |     |-- stale token? drop it
//!       |     |-- cycle x N, OR the redraw flag
//!       |     |-- tick_timers once; beep if asked
//!       |     |-- repaint if the flag is up
//!       |     `-- request the next tick
//!       `-- sleep to the next refresh
//! ```
pub mod clock;
pub mod config;
pub mod display;
pub mod environment;
pub mod error;
pub mod input;
pub mod interpreter;
pub mod machine;
pub mod memory;
pub mod rom;
pub mod scheduler;
pub mod session;
pub mod sound;

#[cfg(test)]
mod testing;

pub use error::HarnessError;
pub use machine::{Key, Machine};
