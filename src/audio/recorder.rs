//! In-memory MIDI sink.
//!
//! Records every message with the instant it was sent. Used by the tests, and
//! in log-only form by `--dry-run`.

use crate::audio::midi::{MidiSink, SinkError};
use log::info;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    ControlChange { number: u8, value: u8 },
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::NoteOn { pitch, velocity } => {
                write!(f, "note on  {:>3} vel {:>3}", pitch, velocity)
            }
            MidiMessage::NoteOff { pitch } => write!(f, "note off {:>3}", pitch),
            MidiMessage::ControlChange { number, value } => {
                write!(f, "cc {:>3} = {:>3}", number, value)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub at: Instant,
    pub message: MidiMessage,
}

pub struct RecordingSink {
    events: Mutex<Vec<MidiEvent>>,
    failing: AtomicBool,
    log_messages: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            log_messages: false,
        }
    }

    /// Sink that logs every message at info level and keeps nothing
    pub fn logging() -> Self {
        Self {
            log_messages: true,
            ..Self::new()
        }
    }

    /// While set, every send fails with a transport error and nothing is recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn events(&self) -> Vec<MidiEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.events().into_iter().map(|e| e.message).collect()
    }

    fn record(&self, message: MidiMessage) -> Result<(), SinkError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(SinkError::Transport("recorder set to fail".into()));
        }
        if self.log_messages {
            info!("{}", message);
            return Ok(());
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MidiEvent {
                at: Instant::now(),
                message,
            });
        Ok(())
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiSink for RecordingSink {
    fn note_on(&self, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::NoteOn { pitch, velocity })
    }

    fn note_off(&self, pitch: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::NoteOff { pitch })
    }

    fn control_change(&self, number: u8, value: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::ControlChange { number, value })
    }
}
