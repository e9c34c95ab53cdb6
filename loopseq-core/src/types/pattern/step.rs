//! Step - one sixteenth-note slot of a pattern.

use crate::types::Pitch;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_VELOCITY: u8 = 100;
pub const DEFAULT_GATE: u8 = 90;
pub const DEFAULT_DURATION: usize = 1;

/// Upper bound for velocities, CC numbers and CC values
pub const MAX_MIDI_VALUE: u8 = 127;

/// A single step in a pattern.
///
/// A rest (`pitch == None`) ignores velocity, gate and duration when played
/// but may still carry CC automation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub pitch: Option<Pitch>,
    /// 0-127
    pub velocity: u8,
    /// Percent of the allotted duration that sounds, 1-100
    pub gate: u8,
    /// Steps spanned by the note, 1..=pattern length
    pub duration: usize,
    /// CC number -> value, sent before the step's Note-On
    pub cc: BTreeMap<u8, u8>,
}

impl Step {
    pub fn rest() -> Self {
        Self {
            pitch: None,
            velocity: DEFAULT_VELOCITY,
            gate: DEFAULT_GATE,
            duration: DEFAULT_DURATION,
            cc: BTreeMap::new(),
        }
    }

    pub fn note(pitch: Pitch) -> Self {
        Self {
            pitch: Some(pitch),
            ..Self::rest()
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn has_cc(&self) -> bool {
        !self.cc.is_empty()
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::rest()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pitch {
            Some(pitch) => {
                write!(f, "{} v{} g{}%", pitch, self.velocity, self.gate)?;
                if self.duration > 1 {
                    write!(f, " x{}", self.duration)?;
                }
            }
            None => write!(f, "_")?,
        }
        for (cc, value) in &self.cc {
            write!(f, " cc{}={}", cc, value)?;
        }
        Ok(())
    }
}

/// Which CC entries a clear operation touches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CcSelector {
    One(u8),
    All,
}

impl FromStr for CcSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(CcSelector::All);
        }
        s.parse::<u8>()
            .map(CcSelector::One)
            .map_err(|_| format!("expected a CC number or 'all', got '{}'", s))
    }
}
