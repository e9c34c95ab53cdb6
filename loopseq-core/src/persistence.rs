//! JSON load/save for patterns.
//!
//! Only sounding steps (and rests that carry CC automation) are written, with
//! velocity, gate and duration omitted when they hold their defaults. The
//! transient global CC map is never written.
//!
//! Loading is tolerant at the step level: a bad step index, pitch name, field
//! value or CC entry is skipped with a warning instead of failing the load.
//! An unreadable file, malformed JSON, or an invalid tempo/length fails it.

use crate::error::{PersistenceError, RangeError};
use crate::types::humanize::{MAX_GATE_RANGE, MAX_TIMING_RANGE_MS, MAX_VELOCITY_RANGE};
use crate::types::pattern::{
    Pattern, PatternSnapshot, DEFAULT_DURATION, DEFAULT_GATE, DEFAULT_VELOCITY, MAX_STEPS,
    MAX_SWING,
};
use crate::types::Pitch;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// On-disk document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFile {
    pub tempo: u16,
    pub length: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub swing: i64,
    #[serde(default, skip_serializing_if = "HumanizeRecord::is_off")]
    pub humanize: HumanizeRecord,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// Persisted humanization ranges, read wide like [`StepRecord`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanizeRecord {
    #[serde(default)]
    pub velocity: i64,
    #[serde(default)]
    pub timing_ms: i64,
    #[serde(default)]
    pub gate: i64,
}

impl HumanizeRecord {
    fn is_off(&self) -> bool {
        self.velocity == 0 && self.timing_ms == 0 && self.gate == 0
    }
}

/// One persisted step.
///
/// Numeric fields are read wide so that an out-of-range value only drops
/// that field, not the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based index
    pub step: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cc: BTreeMap<String, serde_json::Value>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Narrow a wide document value before handing it to a pattern setter
fn narrow(field: &'static str, value: i64, max: u8) -> Result<u8, RangeError> {
    u8::try_from(value).map_err(|_| RangeError::Value {
        field,
        value,
        min: 0,
        max: max.into(),
    })
}

impl From<&PatternSnapshot> for PatternFile {
    fn from(snapshot: &PatternSnapshot) -> Self {
        let steps = snapshot
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| !step.is_rest() || step.has_cc())
            .map(|(i, step)| {
                let sounding = !step.is_rest();
                StepRecord {
                    step: i as i64 + 1,
                    pitch: step.pitch.map(|p| p.to_string()),
                    velocity: (sounding && step.velocity != DEFAULT_VELOCITY)
                        .then_some(step.velocity.into()),
                    gate: (sounding && step.gate != DEFAULT_GATE).then_some(step.gate.into()),
                    duration: (sounding && step.duration != DEFAULT_DURATION)
                        .then_some(step.duration as i64),
                    cc: step
                        .cc
                        .iter()
                        .map(|(cc, value)| (cc.to_string(), (*value).into()))
                        .collect(),
                }
            })
            .collect();

        PatternFile {
            tempo: snapshot.tempo,
            length: snapshot.len(),
            swing: snapshot.swing.into(),
            humanize: HumanizeRecord {
                velocity: snapshot.humanize.velocity.into(),
                timing_ms: snapshot.humanize.timing_ms.into(),
                gate: snapshot.humanize.gate.into(),
            },
            steps,
        }
    }
}

impl PatternFile {
    /// Build a fresh pattern from this document
    pub fn into_pattern(self) -> Result<Pattern, PersistenceError> {
        if !(1..=MAX_STEPS).contains(&self.length) {
            return Err(RangeError::Value {
                field: "length",
                value: self.length as i64,
                min: 1,
                max: MAX_STEPS as i64,
            }
            .into());
        }

        let pattern = Pattern::new(self.length);
        pattern.set_tempo(self.tempo)?;

        let swing = narrow("swing", self.swing, MAX_SWING).and_then(|s| pattern.set_swing(s));
        if let Err(e) = swing {
            warn!("Ignoring swing: {}", e);
        }
        let humanize = self.humanize;
        for result in [
            narrow("velocity humanization", humanize.velocity, MAX_VELOCITY_RANGE)
                .and_then(|v| pattern.set_humanize_velocity(v)),
            narrow("timing humanization", humanize.timing_ms, MAX_TIMING_RANGE_MS)
                .and_then(|t| pattern.set_humanize_timing(t)),
            narrow("gate humanization", humanize.gate, MAX_GATE_RANGE)
                .and_then(|g| pattern.set_humanize_gate(g)),
        ] {
            if let Err(e) = result {
                warn!("Ignoring humanization setting: {}", e);
            }
        }

        for record in self.steps {
            load_step(&pattern, record);
        }
        Ok(pattern)
    }
}

fn load_step(pattern: &Pattern, record: StepRecord) {
    let step = match usize::try_from(record.step) {
        Ok(step) if step >= 1 && step <= pattern.len() => step,
        _ => {
            warn!(
                "Skipping step {}: outside pattern of {} steps",
                record.step,
                pattern.len()
            );
            return;
        }
    };

    if let Some(name) = &record.pitch {
        match name.parse::<Pitch>() {
            Ok(pitch) => {
                let duration = match record.duration {
                    None => DEFAULT_DURATION,
                    Some(d) => match usize::try_from(d) {
                        Ok(d) if d >= 1 && d <= pattern.len() => d,
                        _ => {
                            warn!("Step {}: ignoring duration {}", step, d);
                            DEFAULT_DURATION
                        }
                    },
                };
                if let Err(e) = pattern.set_note_with_duration(step, pitch, duration) {
                    warn!("Step {}: {}", step, e);
                }
            }
            Err(e) => warn!("Step {}: skipping note: {}", step, e),
        }
    }

    if let Some(velocity) = record.velocity {
        let applied = u8::try_from(velocity)
            .map_err(|_| RangeError::Value {
                field: "velocity",
                value: velocity,
                min: 0,
                max: 127,
            })
            .and_then(|v| pattern.set_velocity(step, v));
        if let Err(e) = applied {
            warn!("Step {}: {}", step, e);
        }
    }

    if let Some(gate) = record.gate {
        let applied = u8::try_from(gate)
            .map_err(|_| RangeError::Value {
                field: "gate",
                value: gate,
                min: 1,
                max: 100,
            })
            .and_then(|g| pattern.set_gate(step, g));
        if let Err(e) = applied {
            warn!("Step {}: {}", step, e);
        }
    }

    for (key, value) in &record.cc {
        let cc = key.parse::<u8>().ok();
        let value = value.as_u64().and_then(|v| u8::try_from(v).ok());
        match (cc, value) {
            (Some(cc), Some(value)) => {
                if let Err(e) = pattern.set_step_cc(step, cc, value) {
                    warn!("Step {}: skipping CC {}: {}", step, key, e);
                }
            }
            _ => warn!("Step {}: skipping invalid CC entry {}", step, key),
        }
    }
}

pub fn to_json(pattern: &Pattern) -> Result<String, PersistenceError> {
    let file = PatternFile::from(&pattern.snapshot());
    Ok(serde_json::to_string_pretty(&file)?)
}

pub fn from_json(json: &str) -> Result<Pattern, PersistenceError> {
    let file: PatternFile = serde_json::from_str(json)?;
    file.into_pattern()
}

pub fn save(pattern: &Pattern, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let json = to_json(pattern)?;
    fs::write(path, json).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a pattern file into a new, independent pattern.
///
/// Callers install it with [`Pattern::install_loaded`] only once loading has
/// succeeded, so a failed load never disturbs the pattern that is playing.
pub fn load(path: impl AsRef<Path>) -> Result<Pattern, PersistenceError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    #[test]
    fn test_defaults_are_omitted() {
        let p = Pattern::new(4);
        p.set_note(1, pitch("C3")).unwrap();
        p.set_note_with_duration(3, pitch("G3"), 2).unwrap();
        p.set_velocity(3, 80).unwrap();

        let file = PatternFile::from(&p.snapshot());
        assert_eq!(file.steps.len(), 2);
        assert_eq!(file.steps[0].pitch.as_deref(), Some("C3"));
        assert_eq!(file.steps[0].velocity, None);
        assert_eq!(file.steps[0].gate, None);
        assert_eq!(file.steps[0].duration, None);
        assert_eq!(file.steps[1].step, 3);
        assert_eq!(file.steps[1].velocity, Some(80));
        assert_eq!(file.steps[1].duration, Some(2));

        let json = to_json(&p).unwrap();
        assert!(!json.contains("swing"));
        assert!(!json.contains("humanize"));
    }

    #[test]
    fn test_global_cc_is_not_written() {
        let p = Pattern::new(4);
        p.set_note(1, pitch("C3")).unwrap();
        p.set_global_cc(7, 100).unwrap();
        let json = to_json(&p).unwrap();
        assert!(!json.contains("\"7\""));
        assert!(from_json(&json).unwrap().global_cc().is_empty());
    }

    #[test]
    fn test_cc_only_rest_round_trips() {
        let p = Pattern::new(4);
        p.set_step_cc(4, 1, 127).unwrap();
        let loaded = from_json(&to_json(&p).unwrap()).unwrap();
        let step = loaded.step(4).unwrap();
        assert!(step.is_rest());
        assert_eq!(step.cc[&1], 127);
    }

    #[test]
    fn test_tolerant_load_skips_bad_entries() {
        let json = r#"{
            "tempo": 100,
            "length": 4,
            "steps": [
                { "step": 0, "pitch": "C3" },
                { "step": 9, "pitch": "D3" },
                { "step": 1, "pitch": "E3", "velocity": 300, "gate": 50 },
                { "step": 2, "pitch": "nope" },
                { "step": 3, "pitch": "G3", "duration": 12,
                  "cc": { "74": 64, "200": 1, "x": 2, "10": 999, "11": "loud" } }
            ]
        }"#;
        let p = from_json(json).unwrap();
        assert_eq!(p.tempo(), 100);

        let first = p.step(1).unwrap();
        assert_eq!(first.pitch, Some(pitch("E3")));
        assert_eq!(first.velocity, DEFAULT_VELOCITY);
        assert_eq!(first.gate, 50);

        assert!(p.step(2).unwrap().is_rest());

        let third = p.step(3).unwrap();
        assert_eq!(third.duration, 1);
        assert_eq!(third.cc.len(), 1);
        assert_eq!(third.cc[&74], 64);
    }

    #[test]
    fn test_out_of_range_settings_are_ignored() {
        let json = r#"{
            "tempo": 110,
            "length": 4,
            "swing": 300,
            "humanize": { "velocity": 1000, "timing_ms": -5, "gate": 12 },
            "steps": [ { "step": 2, "pitch": "A2" } ]
        }"#;
        let p = from_json(json).unwrap();
        assert_eq!(p.tempo(), 110);
        assert_eq!(p.swing(), 0);
        assert_eq!(p.humanize().velocity, 0);
        assert_eq!(p.humanize().timing_ms, 0);
        assert_eq!(p.humanize().gate, 12);
        assert_eq!(p.step(2).unwrap().pitch, Some(pitch("A2")));

        // Within u8 but above the cap
        let p = from_json(r#"{ "tempo": 110, "length": 4, "swing": 90 }"#).unwrap();
        assert_eq!(p.swing(), 0);
    }

    #[test]
    fn test_huge_octave_skips_the_step() {
        let json = r#"{
            "tempo": 120,
            "length": 2,
            "steps": [ { "step": 1, "pitch": "C3000" }, { "step": 2, "pitch": "C32767" } ]
        }"#;
        let p = from_json(json).unwrap();
        assert!(p.step(1).unwrap().is_rest());
        assert!(p.step(2).unwrap().is_rest());
    }

    #[test]
    fn test_invalid_document_fails() {
        assert!(matches!(
            from_json(r#"{ "tempo": 10, "length": 4 }"#),
            Err(PersistenceError::Invalid(_))
        ));
        assert!(matches!(
            from_json(r#"{ "tempo": 120, "length": 0 }"#),
            Err(PersistenceError::Invalid(_))
        ));
        assert!(matches!(
            from_json(r#"{ "tempo": 120 "#),
            Err(PersistenceError::Json(_))
        ));
        assert!(matches!(
            load("/definitely/not/here.json"),
            Err(PersistenceError::Io { .. })
        ));
    }
}
