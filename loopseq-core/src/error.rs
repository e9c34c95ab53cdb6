//! Error types shared by the pattern model and the persistence layer.

use std::path::PathBuf;
use thiserror::Error;

/// A caller supplied a value outside its documented bounds.
///
/// Returned synchronously by every [`Pattern`](crate::Pattern) mutator; the
/// pattern is left untouched when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("step {step} is out of range (pattern has {len} steps)")]
    Step { step: usize, len: usize },

    #[error("{field} {value} is out of range ({min}-{max})")]
    Value {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("no global value set for CC {0}")]
    NoGlobalCc(u8),
}

impl RangeError {
    pub(crate) fn value(field: &'static str, value: impl Into<i64>, min: i64, max: i64) -> Self {
        RangeError::Value {
            field,
            value: value.into(),
            min,
            max,
        }
    }
}

/// Loading or saving a pattern file failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed pattern file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern file: {0}")]
    Invalid(#[from] RangeError),
}

/// A pitch name such as `C3`, `F#2` or `Bb-1` could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePitchError {
    #[error("invalid note name: {0}")]
    Name(String),

    #[error("invalid octave: {0}")]
    Octave(String),

    #[error("{0} is outside the MIDI note range")]
    Range(String),
}
