//! # Note Arithmetic
//!
//! Pitch classes, spelled note names, octaves and MIDI numbers.
//!
//! ## Conventions
//! - Pitch class 0 is C, 11 is B.
//! - `midi = 12 * (octave + 1) + pitch_class`, so `C4` is MIDI 60.
//! - Flat spellings fold onto their sharp equivalent for arithmetic
//!   (`Db` → `C#`), while [`SpelledPitch`] keeps the original spelling
//!   for display.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FretwiseError, Result};

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// A pitch class in `0..12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn new(semitone: i32) -> Self {
        PitchClass(semitone.rem_euclid(12) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Shift by `semitones`, wrapping around the octave.
    pub fn transpose(self, semitones: i32) -> Self {
        PitchClass::new(self.0 as i32 + semitones)
    }

    /// Upward distance in semitones from `self` to `other` (0..12).
    pub fn interval_to(self, other: PitchClass) -> u8 {
        (other.0 as i32 - self.0 as i32).rem_euclid(12) as u8
    }

    /// Sharp-folded name (`C#`, never `Db`).
    pub fn name(self) -> &'static str {
        SHARP_NAMES[self.0 as usize]
    }

    pub fn spelled(self, prefer_flat: bool) -> &'static str {
        if prefer_flat {
            FLAT_NAMES[self.0 as usize]
        } else {
            SHARP_NAMES[self.0 as usize]
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Natural note letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }

    fn semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    fn offset(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

/// A note name as written: letter plus accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpelledPitch {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl SpelledPitch {
    /// Read a spelled pitch from the front of `s`, returning it and the
    /// number of bytes consumed. `♯` and `♭` are accepted alongside `#`/`b`.
    pub fn parse_prefix(s: &str) -> Result<(Self, usize)> {
        let mut chars = s.char_indices();
        let letter = match chars.next() {
            Some((_, c)) => Letter::from_char(c)
                .ok_or_else(|| FretwiseError::parse(s, format!("unknown root letter '{}'", c)))?,
            None => return Err(FretwiseError::parse(s, "empty note name")),
        };
        let (accidental, consumed) = match chars.next() {
            Some((i, '#')) | Some((i, '♯')) => (Accidental::Sharp, i + s[i..].chars().next().map_or(1, char::len_utf8)),
            Some((i, 'b')) | Some((i, '♭')) => (Accidental::Flat, i + s[i..].chars().next().map_or(1, char::len_utf8)),
            _ => (Accidental::Natural, 1),
        };
        Ok((SpelledPitch { letter, accidental }, consumed))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (pitch, consumed) = Self::parse_prefix(s)?;
        if consumed != s.len() {
            return Err(FretwiseError::parse(s, "trailing characters after note name"));
        }
        Ok(pitch)
    }

    pub fn pitch_class(self) -> PitchClass {
        PitchClass::new(self.letter.semitone() + self.accidental.offset())
    }

    /// Spell a pitch class using the sharp or flat preference.
    pub fn from_pitch_class(pc: PitchClass, prefer_flat: bool) -> Self {
        // Spelled names are always one or two ASCII characters; parsing them back cannot fail.
        let name = pc.spelled(prefer_flat);
        let mut chars = name.chars();
        let letter = chars.next().and_then(Letter::from_char).unwrap_or(Letter::C);
        let accidental = match chars.next() {
            Some('#') => Accidental::Sharp,
            Some('b') => Accidental::Flat,
            _ => Accidental::Natural,
        };
        SpelledPitch { letter, accidental }
    }

    pub fn is_flat(self) -> bool {
        self.accidental == Accidental::Flat
    }
}

impl fmt::Display for SpelledPitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter.as_char())?;
        match self.accidental {
            Accidental::Natural => Ok(()),
            Accidental::Sharp => f.write_str("#"),
            Accidental::Flat => f.write_str("b"),
        }
    }
}

/// A concrete pitch: pitch class plus octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Note {
    pub octave: i8,
    pub pitch_class: PitchClass,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i8) -> Self {
        Note { octave, pitch_class }
    }

    pub fn midi(self) -> u8 {
        (12 * (self.octave as i32 + 1) + self.pitch_class.value() as i32).clamp(0, 127) as u8
    }

    pub fn from_midi(midi: u8) -> Self {
        Note {
            octave: (midi / 12) as i8 - 1,
            pitch_class: PitchClass::new(midi as i32),
        }
    }

    /// Parse names like `C#4`, `Eb3` or `A-1`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (pitch, consumed) = SpelledPitch::parse_prefix(trimmed)?;
        let octave: i8 = trimmed[consumed..]
            .parse()
            .map_err(|_| FretwiseError::parse(s, "missing or invalid octave number"))?;
        // Cb4 sounds as B3 and B#3 as C4; resolve through MIDI.
        let midi = 12 * (octave as i32 + 1) + pitch.letter.semitone() + pitch.accidental.offset();
        if !(0..=127).contains(&midi) {
            return Err(FretwiseError::parse(s, "note outside the MIDI range"));
        }
        Ok(Note::from_midi(midi as u8))
    }

    /// The note sounded by pressing `fret` on a string tuned to `self`.
    pub fn at_fret(self, fret: u8) -> Note {
        Note::from_midi(self.midi().saturating_add(fret).min(127))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class.name(), self.octave)
    }
}

impl Serialize for Note {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Note {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Note::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_bijection() {
        assert_eq!(Note::parse("C4").unwrap().midi(), 60);
        assert_eq!(Note::parse("A4").unwrap().midi(), 69);
        assert_eq!(Note::parse("E2").unwrap().midi(), 40);
        for midi in 0..=127u8 {
            assert_eq!(Note::from_midi(midi).midi(), midi);
        }
    }

    #[test]
    fn test_flats_fold_to_sharps() {
        assert_eq!(Note::parse("Db4").unwrap().to_string(), "C#4");
        assert_eq!(Note::parse("Bb3").unwrap().midi(), 58);
        assert_eq!(Note::parse("Cb4").unwrap().to_string(), "B3");
        assert_eq!(Note::parse("B#3").unwrap().to_string(), "C4");
    }

    #[test]
    fn test_spelled_pitch_keeps_spelling() {
        let eb = SpelledPitch::parse("Eb").unwrap();
        assert_eq!(eb.to_string(), "Eb");
        assert_eq!(eb.pitch_class(), PitchClass::new(3));
        assert_eq!(eb.pitch_class().name(), "D#");
        assert_eq!(SpelledPitch::parse("F♯").unwrap().to_string(), "F#");
    }

    #[test]
    fn test_at_fret() {
        let low_e = Note::parse("E2").unwrap();
        assert_eq!(low_e.at_fret(3).to_string(), "G2");
        assert_eq!(low_e.at_fret(12).to_string(), "E3");
    }

    #[test]
    fn test_bad_names() {
        assert!(Note::parse("H4").is_err());
        assert!(Note::parse("C").is_err());
        assert!(SpelledPitch::parse("C#x").is_err());
    }

    #[test]
    fn test_interval_to_wraps() {
        let a = PitchClass::new(9);
        assert_eq!(a.interval_to(PitchClass::new(4)), 7);
        assert_eq!(PitchClass::new(-1).value(), 11);
    }
}
