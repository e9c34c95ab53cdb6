// loopseq-core/src/types/mod.rs

pub mod humanize;
pub mod note;
pub mod pattern;
pub mod time;

pub use humanize::{FastRandSource, Humanize, RandomSource};
pub use note::Pitch;
pub use pattern::{CcSelector, Pattern, PatternSnapshot, Step};
