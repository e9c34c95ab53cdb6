//! Pattern module - the step grid that editors mutate and the engine plays.
//!
//! - `step`: [`Step`] value object and per-step CC selection
//! - `core`: lock-guarded [`Pattern`] and its lock-free [`PatternSnapshot`]

mod core;
mod step;


pub use self::core::{
    Pattern, PatternSnapshot, DEFAULT_LENGTH, DEFAULT_TEMPO, MAX_STEPS, MAX_SWING, MAX_TEMPO,
    MIN_TEMPO,
};
pub use step::{CcSelector, Step, DEFAULT_DURATION, DEFAULT_GATE, DEFAULT_VELOCITY, MAX_MIDI_VALUE};
