use crate::error::ParsePitchError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A MIDI note number (0-127).
///
/// Parsed from scientific pitch names where C4 is middle C (MIDI 60):
/// `midi = (octave + 1) * 12 + pitch_class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pitch(u8);

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl Pitch {
    pub const MAX: u8 = 127;

    /// Build a pitch from a raw MIDI note number
    pub fn from_midi(note: u8) -> Option<Self> {
        (note <= Self::MAX).then_some(Pitch(note))
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    /// Chromatic pitch class (0 = C ... 11 = B)
    pub fn pitch_class(self) -> u8 {
        self.0 % 12
    }

    pub fn octave(self) -> i8 {
        (self.0 / 12) as i8 - 1
    }
}

impl FromStr for Pitch {
    type Err = ParsePitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();

        let letter = chars
            .next()
            .ok_or_else(|| ParsePitchError::Name(s.to_string()))?;
        let base: i16 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(ParsePitchError::Name(s.to_string())),
        };

        // Lowercase 'b' after the letter is a flat; 's' is accepted as a sharp.
        let rest = &s[letter.len_utf8()..];
        let (shift, octave_part) = match rest.chars().next() {
            Some('#') | Some('s') | Some('S') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        if octave_part.is_empty() {
            return Err(ParsePitchError::Octave(s.to_string()));
        }
        let octave: i16 = octave_part
            .parse()
            .map_err(|_| ParsePitchError::Octave(octave_part.to_string()))?;

        if !(-1..=9).contains(&octave) {
            return Err(ParsePitchError::Range(s.to_string()));
        }
        let midi = (octave + 1) * 12 + base + shift;
        if !(0..=Self::MAX as i16).contains(&midi) {
            return Err(ParsePitchError::Range(s.to_string()));
        }
        Ok(Pitch(midi as u8))
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            SHARP_NAMES[self.pitch_class() as usize],
            self.octave()
        )
    }
}

// Pitches are stored in pattern files by name.
impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pitch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_parsing() {
        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(c4.midi(), 60);

        let c3: Pitch = "C3".parse().unwrap();
        assert_eq!(c3.midi(), 48);

        let fs2: Pitch = "F#2".parse().unwrap();
        assert_eq!(fs2.midi(), 42);

        let bb3: Pitch = "Bb3".parse().unwrap();
        assert_eq!(bb3.midi(), 58);

        let lowest: Pitch = "C-1".parse().unwrap();
        assert_eq!(lowest.midi(), 0);

        let highest: Pitch = "G9".parse().unwrap();
        assert_eq!(highest.midi(), 127);
    }

    #[test]
    fn test_pitch_parsing_errors() {
        assert!(matches!("H3".parse::<Pitch>(), Err(ParsePitchError::Name(_))));
        assert!(matches!("C".parse::<Pitch>(), Err(ParsePitchError::Octave(_))));
        assert!(matches!("Cx".parse::<Pitch>(), Err(ParsePitchError::Octave(_))));
        assert!(matches!("G#9".parse::<Pitch>(), Err(ParsePitchError::Range(_))));
        assert!(matches!("Cb-1".parse::<Pitch>(), Err(ParsePitchError::Range(_))));
        assert!("".parse::<Pitch>().is_err());
    }

    #[test]
    fn test_huge_octaves_are_out_of_range() {
        assert!(matches!("C3000".parse::<Pitch>(), Err(ParsePitchError::Range(_))));
        assert!(matches!("C32767".parse::<Pitch>(), Err(ParsePitchError::Range(_))));
        assert!(matches!("Bb-32768".parse::<Pitch>(), Err(ParsePitchError::Range(_))));
        assert!(matches!("C10".parse::<Pitch>(), Err(ParsePitchError::Range(_))));
    }

    #[test]
    fn test_pitch_display() {
        assert_eq!(Pitch::from_midi(60).unwrap().to_string(), "C4");
        assert_eq!(Pitch::from_midi(58).unwrap().to_string(), "A#3");
        assert_eq!(Pitch::from_midi(0).unwrap().to_string(), "C-1");
        assert!(Pitch::from_midi(128).is_none());
    }

    #[test]
    fn test_display_parses_back() {
        for midi in 0..=127u8 {
            let pitch = Pitch::from_midi(midi).unwrap();
            let parsed: Pitch = pitch.to_string().parse().unwrap();
            assert_eq!(parsed, pitch);
        }
    }
}
