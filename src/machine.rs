//! The boundary between the harness and whatever virtual machine it drives.
//!
//! Nothing in here does any work; it only pins down what the scheduler and
//! session manager are allowed to ask of a machine.
use crate::error::HarnessError;
use std::fmt;

/// logical display width, in pixels
pub const DISPLAY_WIDTH: usize = 64;
/// logical display height, in pixels
pub const DISPLAY_HEIGHT: usize = 32;
/// number of slots on the logical keypad
pub const KEYPAD_SIZE: usize = 16;

/// one display pixel; anything nonzero is "on"
pub type Pixel = u8;

/// A slot on the 16-key hex keypad, 0x0 to 0xF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u8);

impl Key {
    pub fn new(slot: u8) -> Option<Key> {
        if (slot as usize) < KEYPAD_SIZE {
            Some(Key(slot))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Key> {
        (0..KEYPAD_SIZE as u8).map(Key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// What the harness needs from a machine.
///
/// All calls are synchronous and only touch the machine's own state.
pub trait Machine {
    /// execute exactly one instruction
    fn advance_one_cycle(&mut self);

    /// did the display change since the machine last cleared the flag?
    /// the machine decides when to clear it (normally on the next cycle)
    fn pending_redraw(&self) -> bool;

    /// decrement the 60Hz timers by one unit; true if a tone should sound.
    /// called once per host tick, never once per cycle
    fn tick_timers(&mut self) -> bool;

    /// the current frame, row-major, `DISPLAY_WIDTH * DISPLAY_HEIGHT` long
    fn snapshot_display(&self) -> &[Pixel];

    /// reset the machine and install a program at its load address
    fn load_program(&mut self, program: &[u8]) -> Result<(), HarnessError>;

    /// press or release one keypad line; repeating a call changes nothing
    fn set_key(&mut self, key: Key, pressed: bool);
}
