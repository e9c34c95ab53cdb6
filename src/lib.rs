//! # loopseq
//!
//! A live-editable MIDI step sequencer. One pattern of up to 64 sixteenth-note
//! steps loops continuously while it is edited from a REPL or a watched file;
//! edits are heard from the next loop boundary.
//!
//! ## Modules
//!
//! - `audio`: the [`MidiSink`](audio::MidiSink) capability, the midir-backed
//!   output handle, an in-memory recorder, and the playback engine that walks
//!   the pattern on its own thread.
//! - `commands`: the REPL command registry and its handlers.
//! - `config`: command-line options.
//! - `repl`: the interactive loop and pattern-file watcher.
//!
//! The pattern model itself lives in `loopseq-core`.

pub mod audio;
pub mod commands;
pub mod config;
pub mod repl;

// Re-export commonly used types for convenience
pub use crate::audio::{EngineConfig, EngineState, MidiSink, PlaybackEngine, RecordingSink};
pub use loopseq_core::{Pattern, Pitch};
