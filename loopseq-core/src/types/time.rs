//! Step-grid timing math.
//!
//! The grid is fixed at sixteenth notes: one step is a quarter of a beat.

use std::time::Duration;

/// Steps per quarter-note beat
pub const STEPS_PER_BEAT: f64 = 4.0;

/// Length of one sixteenth-note step in milliseconds
pub fn step_period_ms(bpm: u16) -> f64 {
    (60_000.0 / f64::from(bpm)) / STEPS_PER_BEAT
}

/// Length of one step as a `Duration`
pub fn step_period(bpm: u16) -> Duration {
    Duration::from_secs_f64(step_period_ms(bpm) / 1000.0)
}

/// True for the even, 1-based steps that swing delays
pub fn is_off_beat(step: usize) -> bool {
    step % 2 == 0
}

/// Onset delay for a 1-based step.
///
/// Off-beat steps are pushed later by `period * swing / 100`; 0% is straight.
pub fn swing_offset_ms(step: usize, step_period_ms: f64, swing_percent: u8) -> f64 {
    if is_off_beat(step) {
        step_period_ms * f64::from(swing_percent) / 100.0
    } else {
        0.0
    }
}

/// Number of step periods a note actually sounds for.
///
/// `max(1, round(duration * gate / 100))`
pub fn sounding_steps(duration: usize, gate: u8) -> usize {
    let steps = (duration as f64 * f64::from(gate) / 100.0).round() as usize;
    steps.max(1)
}

/// Converts a signed millisecond offset into a `(Duration, is_negative)` pair
pub fn signed_millis(ms: f64) -> (Duration, bool) {
    (Duration::from_secs_f64(ms.abs() / 1000.0), ms < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_period() {
        assert_eq!(step_period_ms(80), 187.5);
        assert_eq!(step_period_ms(120), 125.0);
        assert_eq!(step_period(120), Duration::from_millis(125));
    }

    #[test]
    fn test_swing_only_moves_off_beats() {
        assert_eq!(swing_offset_ms(1, 125.0, 50), 0.0);
        assert_eq!(swing_offset_ms(2, 125.0, 50), 62.5);
        assert_eq!(swing_offset_ms(3, 125.0, 75), 0.0);
        assert_eq!(swing_offset_ms(4, 125.0, 0), 0.0);
    }

    #[test]
    fn test_sounding_steps() {
        assert_eq!(sounding_steps(4, 25), 1);
        assert_eq!(sounding_steps(4, 100), 4);
        assert_eq!(sounding_steps(1, 1), 1);
        assert_eq!(sounding_steps(3, 50), 2); // 1.5 rounds away from zero
        assert_eq!(sounding_steps(64, 90), 58);
    }

    #[test]
    fn test_sounding_steps_never_exceeds_duration() {
        for duration in 1..=64 {
            for gate in 1..=100u8 {
                let steps = sounding_steps(duration, gate);
                assert!(steps >= 1);
                assert!(steps <= duration);
            }
        }
    }

    #[test]
    fn test_signed_millis() {
        assert_eq!(signed_millis(-5.0), (Duration::from_millis(5), true));
        assert_eq!(signed_millis(2.5), (Duration::from_micros(2500), false));
    }
}
