//! Humanization: per-traversal random jitter on velocity, timing and gate.
//!
//! Each jitter function is pure over `(base, range, source)`; the random
//! source is injected so playback can be made deterministic.

use serde::{Deserialize, Serialize};

pub const MAX_VELOCITY_RANGE: u8 = 64;
pub const MAX_TIMING_RANGE_MS: u8 = 50;
pub const MAX_GATE_RANGE: u8 = 50;

/// Humanization ranges of a pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Humanize {
    /// Velocity jitter, +/- this many units
    #[serde(default)]
    pub velocity: u8,
    /// Onset jitter, +/- this many milliseconds
    #[serde(default)]
    pub timing_ms: u8,
    /// Gate jitter, +/- this many percent
    #[serde(default)]
    pub gate: u8,
}

impl Humanize {
    pub fn is_off(&self) -> bool {
        self.velocity == 0 && self.timing_ms == 0 && self.gate == 0
    }
}

/// Source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;

    /// Uniform value in `[-range, range]`
    fn symmetric(&mut self, range: f64) -> f64 {
        (self.next_unit() * 2.0 - 1.0) * range
    }
}

/// Default random source backed by `fastrand`.
pub struct FastRandSource(fastrand::Rng);

impl FastRandSource {
    pub fn new() -> Self {
        Self(fastrand::Rng::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl Default for FastRandSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FastRandSource {
    fn next_unit(&mut self) -> f64 {
        self.0.f64()
    }
}

/// Velocity +/- uniform(0, range), clamped to 0..=127
pub fn humanize_velocity(base: u8, range: u8, rng: &mut dyn RandomSource) -> u8 {
    if range == 0 {
        return base;
    }
    let jitter = rng.symmetric(f64::from(range)).round();
    (f64::from(base) + jitter).clamp(0.0, 127.0) as u8
}

/// Gate +/- uniform(0, range), clamped to 1..=100
pub fn humanize_gate(base: u8, range: u8, rng: &mut dyn RandomSource) -> u8 {
    if range == 0 {
        return base;
    }
    let jitter = rng.symmetric(f64::from(range)).round();
    (f64::from(base) + jitter).clamp(1.0, 100.0) as u8
}

/// Onset offset in milliseconds, uniform in `[-range, range]`
pub fn timing_jitter_ms(range_ms: u8, rng: &mut dyn RandomSource) -> f64 {
    if range_ms == 0 {
        return 0.0;
    }
    rng.symmetric(f64::from(range_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed sequence of unit values
    struct Sequence(Vec<f64>, usize);

    impl RandomSource for Sequence {
        fn next_unit(&mut self) -> f64 {
            let value = self.0[self.1 % self.0.len()];
            self.1 += 1;
            value
        }
    }

    #[test]
    fn test_zero_range_is_identity() {
        let mut rng = Sequence(vec![0.99], 0);
        assert_eq!(humanize_velocity(100, 0, &mut rng), 100);
        assert_eq!(humanize_gate(90, 0, &mut rng), 90);
        assert_eq!(timing_jitter_ms(0, &mut rng), 0.0);
        // No draws were consumed
        assert_eq!(rng.1, 0);
    }

    #[test]
    fn test_jitter_endpoints() {
        let mut low = Sequence(vec![0.0], 0);
        assert_eq!(humanize_velocity(100, 10, &mut low), 90);
        assert_eq!(timing_jitter_ms(20, &mut low), -20.0);

        let mut mid = Sequence(vec![0.5], 0);
        assert_eq!(humanize_velocity(100, 10, &mut mid), 100);
        assert_eq!(humanize_gate(50, 30, &mut mid), 50);
    }

    #[test]
    fn test_velocity_clamped() {
        let mut rng = FastRandSource::with_seed(7);
        for base in [0u8, 1, 63, 126, 127] {
            for _ in 0..200 {
                let v = humanize_velocity(base, MAX_VELOCITY_RANGE, &mut rng);
                assert!(v <= 127);
            }
        }
        let mut high = Sequence(vec![0.999_999], 0);
        assert_eq!(humanize_velocity(127, 64, &mut high), 127);
        let mut low = Sequence(vec![0.0], 0);
        assert_eq!(humanize_velocity(3, 64, &mut low), 0);
    }

    #[test]
    fn test_gate_clamped() {
        let mut rng = FastRandSource::with_seed(11);
        for base in [1u8, 2, 50, 99, 100] {
            for _ in 0..200 {
                let g = humanize_gate(base, MAX_GATE_RANGE, &mut rng);
                assert!((1..=100).contains(&g));
            }
        }
    }

    #[test]
    fn test_seeded_source_is_deterministic() {
        let mut a = FastRandSource::with_seed(42);
        let mut b = FastRandSource::with_seed(42);
        for _ in 0..16 {
            assert_eq!(a.next_unit(), b.next_unit());
        }
    }
}
