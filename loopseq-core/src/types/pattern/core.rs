//! Pattern - lock-guarded step grid plus tempo, swing, humanization and CC state.
//!
//! Every method takes the pattern's single lock for the duration of the call
//! and releases it before returning. Mutators validate all arguments before
//! touching state, so a `RangeError` always leaves the pattern unchanged.

use super::step::{CcSelector, Step, MAX_MIDI_VALUE};
use crate::error::RangeError;
use crate::types::humanize::{Humanize, MAX_GATE_RANGE, MAX_TIMING_RANGE_MS, MAX_VELOCITY_RANGE};
use crate::types::Pitch;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const MIN_TEMPO: u16 = 20;
pub const MAX_TEMPO: u16 = 300;
pub const DEFAULT_TEMPO: u16 = 120;
pub const MAX_STEPS: usize = 64;
pub const DEFAULT_LENGTH: usize = 16;
pub const MAX_SWING: u8 = 75;

/// Plain, unlocked copy of a pattern's full state.
///
/// This is what the playback loop owns between loop boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternSnapshot {
    pub steps: Vec<Step>,
    pub tempo: u16,
    pub humanize: Humanize,
    pub swing: u8,
    /// Transient CC values sent once per loop boundary; never persisted
    pub global_cc: BTreeMap<u8, u8>,
}

impl PatternSnapshot {
    pub fn new(length: usize) -> Self {
        Self {
            steps: vec![Step::rest(); length.clamp(1, MAX_STEPS)],
            tempo: DEFAULT_TEMPO,
            humanize: Humanize::default(),
            swing: 0,
            global_cc: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 1-based step lookup
    pub fn step(&self, step: usize) -> Option<&Step> {
        step.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    fn index(&self, step: usize) -> Result<usize, RangeError> {
        if step == 0 || step > self.steps.len() {
            return Err(RangeError::Step {
                step,
                len: self.steps.len(),
            });
        }
        Ok(step - 1)
    }

    fn check_duration(&self, duration: usize) -> Result<(), RangeError> {
        if duration == 0 || duration > self.steps.len() {
            return Err(RangeError::value(
                "duration",
                duration as i64,
                1,
                self.steps.len() as i64,
            ));
        }
        Ok(())
    }
}

impl Default for PatternSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

fn check_midi(field: &'static str, value: u8) -> Result<(), RangeError> {
    if value > MAX_MIDI_VALUE {
        return Err(RangeError::value(field, value, 0, MAX_MIDI_VALUE.into()));
    }
    Ok(())
}

fn check_cap(field: &'static str, value: u8, max: u8) -> Result<(), RangeError> {
    if value > max {
        return Err(RangeError::value(field, value, 0, max.into()));
    }
    Ok(())
}

/// The shared, editable pattern.
///
/// One instance is created per session and handed by `Arc` to every editor
/// and to the playback engine.
#[derive(Debug, Default)]
pub struct Pattern {
    state: Mutex<PatternSnapshot>,
}

impl Pattern {
    /// Create a pattern of `length` default rests (clamped to 1..=64)
    pub fn new(length: usize) -> Self {
        Self::from_snapshot(PatternSnapshot::new(length))
    }

    fn from_snapshot(snapshot: PatternSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    fn state(&self) -> MutexGuard<'_, PatternSnapshot> {
        // Every mutation validates before writing, so a poisoned guard still
        // holds a consistent pattern.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deep copy of the full state, taken under the lock
    pub fn snapshot(&self) -> PatternSnapshot {
        self.state().clone()
    }

    /// Independent pattern with its own lock and deep-copied CC maps
    pub fn clone_pattern(&self) -> Pattern {
        Pattern::from_snapshot(self.snapshot())
    }

    /// Replace this pattern's state with a deep copy of `other`'s
    pub fn copy_from(&self, other: &Pattern) {
        // Copy out first so the two locks are never held together.
        let snapshot = other.snapshot();
        *self.state() = snapshot;
    }

    /// Install a pattern read from a file, keeping this pattern's global CC.
    ///
    /// Global CC values live only in memory, so a file load must not drop them.
    pub fn install_loaded(&self, loaded: &Pattern) {
        let mut snapshot = loaded.snapshot();
        let mut state = self.state();
        snapshot.global_cc = std::mem::take(&mut state.global_cc);
        *state = snapshot;
    }

    // --- accessors ---

    pub fn len(&self) -> usize {
        self.state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().is_empty()
    }

    /// 1-based step lookup
    pub fn step(&self, step: usize) -> Result<Step, RangeError> {
        let state = self.state();
        let index = state.index(step)?;
        Ok(state.steps[index].clone())
    }

    pub fn steps(&self) -> Vec<Step> {
        self.state().steps.clone()
    }

    pub fn tempo(&self) -> u16 {
        self.state().tempo
    }

    pub fn swing(&self) -> u8 {
        self.state().swing
    }

    pub fn humanize(&self) -> Humanize {
        self.state().humanize
    }

    pub fn global_cc(&self) -> BTreeMap<u8, u8> {
        self.state().global_cc.clone()
    }

    pub fn step_cc(&self, step: usize) -> Result<BTreeMap<u8, u8>, RangeError> {
        let state = self.state();
        let index = state.index(step)?;
        Ok(state.steps[index].cc.clone())
    }

    // --- step content ---

    /// Put a one-step note on `step`, keeping its velocity, gate and CC
    pub fn set_note(&self, step: usize, pitch: Pitch) -> Result<(), RangeError> {
        self.set_note_with_duration(step, pitch, 1)
    }

    pub fn set_note_with_duration(
        &self,
        step: usize,
        pitch: Pitch,
        duration: usize,
    ) -> Result<(), RangeError> {
        let mut state = self.state();
        let index = state.index(step)?;
        state.check_duration(duration)?;

        let slot = &mut state.steps[index];
        slot.pitch = Some(pitch);
        slot.duration = duration;
        Ok(())
    }

    /// Silence `step`; CC automation is kept
    pub fn set_rest(&self, step: usize) -> Result<(), RangeError> {
        let mut state = self.state();
        let index = state.index(step)?;

        let slot = &mut state.steps[index];
        slot.pitch = None;
        slot.duration = 1;
        Ok(())
    }

    pub fn set_velocity(&self, step: usize, velocity: u8) -> Result<(), RangeError> {
        let mut state = self.state();
        let index = state.index(step)?;
        check_midi("velocity", velocity)?;

        state.steps[index].velocity = velocity;
        Ok(())
    }

    pub fn set_gate(&self, step: usize, gate: u8) -> Result<(), RangeError> {
        let mut state = self.state();
        let index = state.index(step)?;
        if !(1..=100).contains(&gate) {
            return Err(RangeError::value("gate", gate, 1, 100));
        }

        state.steps[index].gate = gate;
        Ok(())
    }

    /// Turn every step into a default rest, keeping length, tempo, swing and humanization
    pub fn clear(&self) {
        let mut state = self.state();
        for step in state.steps.iter_mut() {
            *step = Step::rest();
        }
    }

    // --- global settings ---

    pub fn set_tempo(&self, bpm: u16) -> Result<(), RangeError> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&bpm) {
            return Err(RangeError::value(
                "tempo",
                bpm,
                MIN_TEMPO.into(),
                MAX_TEMPO.into(),
            ));
        }
        self.state().tempo = bpm;
        Ok(())
    }

    /// Grow with default rests or truncate; surviving steps keep their index.
    ///
    /// Durations that no longer fit are shortened to the new length.
    pub fn resize(&self, length: usize) -> Result<(), RangeError> {
        if !(1..=MAX_STEPS).contains(&length) {
            return Err(RangeError::value(
                "length",
                length as i64,
                1,
                MAX_STEPS as i64,
            ));
        }

        let mut state = self.state();
        state.steps.resize_with(length, Step::rest);
        for step in state.steps.iter_mut() {
            step.duration = step.duration.min(length);
        }
        Ok(())
    }

    pub fn set_humanize_velocity(&self, amount: u8) -> Result<(), RangeError> {
        check_cap("velocity humanization", amount, MAX_VELOCITY_RANGE)?;
        self.state().humanize.velocity = amount;
        Ok(())
    }

    pub fn set_humanize_timing(&self, amount_ms: u8) -> Result<(), RangeError> {
        check_cap("timing humanization", amount_ms, MAX_TIMING_RANGE_MS)?;
        self.state().humanize.timing_ms = amount_ms;
        Ok(())
    }

    pub fn set_humanize_gate(&self, amount: u8) -> Result<(), RangeError> {
        check_cap("gate humanization", amount, MAX_GATE_RANGE)?;
        self.state().humanize.gate = amount;
        Ok(())
    }

    pub fn set_swing(&self, percent: u8) -> Result<(), RangeError> {
        check_cap("swing", percent, MAX_SWING)?;
        self.state().swing = percent;
        Ok(())
    }

    // --- per-step CC automation ---

    pub fn set_step_cc(&self, step: usize, cc: u8, value: u8) -> Result<(), RangeError> {
        let mut state = self.state();
        let index = state.index(step)?;
        check_midi("CC number", cc)?;
        check_midi("CC value", value)?;

        state.steps[index].cc.insert(cc, value);
        Ok(())
    }

    /// Remove one CC entry (absent entries are not an error) or all of them
    pub fn clear_step_cc(&self, step: usize, which: CcSelector) -> Result<(), RangeError> {
        let mut state = self.state();
        let index = state.index(step)?;

        let cc_map = &mut state.steps[index].cc;
        match which {
            CcSelector::One(cc) => {
                check_midi("CC number", cc)?;
                cc_map.remove(&cc);
            }
            CcSelector::All => *cc_map = BTreeMap::new(),
        }
        Ok(())
    }

    // --- global CC ---

    pub fn set_global_cc(&self, cc: u8, value: u8) -> Result<(), RangeError> {
        check_midi("CC number", cc)?;
        check_midi("CC value", value)?;
        self.state().global_cc.insert(cc, value);
        Ok(())
    }

    pub fn clear_global_cc(&self, which: CcSelector) -> Result<(), RangeError> {
        let mut state = self.state();
        match which {
            CcSelector::One(cc) => {
                check_midi("CC number", cc)?;
                state.global_cc.remove(&cc);
            }
            CcSelector::All => state.global_cc.clear(),
        }
        Ok(())
    }

    /// Copy the global value for `cc` onto every note-bearing step as
    /// persistent automation, overwriting existing values.
    ///
    /// Returns the number of steps written.
    pub fn apply_global_cc(&self, cc: u8) -> Result<usize, RangeError> {
        check_midi("CC number", cc)?;
        let mut state = self.state();
        let value = *state.global_cc.get(&cc).ok_or(RangeError::NoGlobalCc(cc))?;

        let mut applied = 0;
        for step in state.steps.iter_mut().filter(|s| !s.is_rest()) {
            step.cc.insert(cc, value);
            applied += 1;
        }
        Ok(applied)
    }
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        self.clone_pattern()
    }
}
