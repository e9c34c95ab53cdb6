//! # Loopseq Core
//!
//! Transport-free core of the loopseq step sequencer: the lock-guarded
//! [`Pattern`] state that editors mutate, the plain [`PatternSnapshot`] the
//! playback loop walks, humanization and timing math, and JSON persistence.
//!
//! Nothing in this crate touches MIDI ports or the terminal.
//!
//! ## Example
//!
//! ```
//! use loopseq_core::{Pattern, Pitch};
//!
//! let pattern = Pattern::new(16);
//! let c3: Pitch = "C3".parse().unwrap();
//! pattern.set_note_with_duration(1, c3, 2).unwrap();
//! assert_eq!(pattern.step(1).unwrap().duration, 2);
//! ```

pub mod error;
pub mod persistence;
pub mod types;

pub use error::{ParsePitchError, PersistenceError, RangeError};
pub use types::{
    CcSelector, FastRandSource, Humanize, Pattern, PatternSnapshot, Pitch, RandomSource, Step,
};
