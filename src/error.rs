use std::io;
use thiserror::Error;

/// Everything that can stop a transition in the harness.
///
/// Unmapped keys and stale ticks are expected outcomes, not errors, so they
/// never show up here.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("could not fetch ROM `{name}`: {source}")]
    RomFetch {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("ROM `{name}` is empty")]
    RomEmpty { name: String },

    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("no ROM in catalog slot {0}")]
    UnknownSlot(usize),

    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}
