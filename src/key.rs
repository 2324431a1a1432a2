//! # Key Model
//!
//! Diatonic triad and seventh tables for the 12 major and 12 (natural) minor
//! keys, the harmonic-minor dominant, and the parallel-key relation used for
//! borrowing.
//!
//! Degrees are 1-based (`1` = tonic). Out-of-range degrees yield `None`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::{Chord, Quality};
use crate::error::{FretwiseError, Result};
use crate::note::{PitchClass, SpelledPitch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_TRIADS: [Quality; 7] = [
    Quality::Major,
    Quality::Minor,
    Quality::Minor,
    Quality::Major,
    Quality::Major,
    Quality::Minor,
    Quality::Diminished,
];
const MAJOR_SEVENTHS: [Quality; 7] = [
    Quality::Major7,
    Quality::Minor7,
    Quality::Minor7,
    Quality::Major7,
    Quality::Dominant7,
    Quality::Minor7,
    Quality::HalfDiminished7,
];
const MINOR_TRIADS: [Quality; 7] = [
    Quality::Minor,
    Quality::Diminished,
    Quality::Major,
    Quality::Minor,
    Quality::Minor,
    Quality::Major,
    Quality::Major,
];
const MINOR_SEVENTHS: [Quality; 7] = [
    Quality::Minor7,
    Quality::HalfDiminished7,
    Quality::Major7,
    Quality::Minor7,
    Quality::Minor7,
    Quality::Major7,
    Quality::Dominant7,
];

/// A key: tonic plus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub tonic: SpelledPitch,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: SpelledPitch, mode: Mode) -> Self {
        Key { tonic, mode }
    }

    pub fn major(tonic: &str) -> Result<Self> {
        Ok(Key::new(SpelledPitch::parse(tonic)?, Mode::Major))
    }

    pub fn minor(tonic: &str) -> Result<Self> {
        Ok(Key::new(SpelledPitch::parse(tonic)?, Mode::Minor))
    }

    /// Parse a key name such as `C`, `Bb`, `F#m`, `A minor` or `Eb major`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (tonic_text, mode) = if let Some(rest) = trimmed.strip_suffix(" minor") {
            (rest.trim(), Mode::Minor)
        } else if let Some(rest) = trimmed.strip_suffix(" major") {
            (rest.trim(), Mode::Major)
        } else if trimmed.len() > 1 && trimmed.ends_with('m') {
            (&trimmed[..trimmed.len() - 1], Mode::Minor)
        } else {
            (trimmed, Mode::Major)
        };
        let tonic = SpelledPitch::parse(tonic_text)
            .map_err(|_| FretwiseError::parse(s, "expected a key like 'C', 'Bb' or 'F#m'"))?;
        Ok(Key { tonic, mode })
    }

    pub fn tonic_pc(&self) -> PitchClass {
        self.tonic.pitch_class()
    }

    /// Position on the circle of fifths: positive = sharps, negative = flats.
    pub fn fifths(&self) -> i8 {
        let name = self.tonic.to_string();
        let known = match self.mode {
            Mode::Major => match name.as_str() {
                "C" => Some(0),
                "G" => Some(1),
                "D" => Some(2),
                "A" => Some(3),
                "E" => Some(4),
                "B" => Some(5),
                "F#" => Some(6),
                "C#" => Some(7),
                "F" => Some(-1),
                "Bb" => Some(-2),
                "Eb" => Some(-3),
                "Ab" => Some(-4),
                "Db" => Some(-5),
                "Gb" => Some(-6),
                "Cb" => Some(-7),
                _ => None,
            },
            Mode::Minor => match name.as_str() {
                "A" => Some(0),
                "E" => Some(1),
                "B" => Some(2),
                "F#" => Some(3),
                "C#" => Some(4),
                "G#" => Some(5),
                "D#" => Some(6),
                "A#" => Some(7),
                "D" => Some(-1),
                "G" => Some(-2),
                "C" => Some(-3),
                "F" => Some(-4),
                "Bb" => Some(-5),
                "Eb" => Some(-6),
                "Ab" => Some(-7),
                _ => None,
            },
        };
        // Theoretical keys (D# major, Db minor ...) follow their written accidental.
        known.unwrap_or(if self.tonic.is_flat() { -8 } else { 8 })
    }

    /// Whether chord roots in this key are spelled with flats.
    pub fn prefer_flat(&self) -> bool {
        self.fifths() < 0
    }

    fn scale(&self) -> &'static [u8; 7] {
        match self.mode {
            Mode::Major => &MAJOR_SCALE,
            Mode::Minor => &MINOR_SCALE,
        }
    }

    fn triad_qualities(&self) -> &'static [Quality; 7] {
        match self.mode {
            Mode::Major => &MAJOR_TRIADS,
            Mode::Minor => &MINOR_TRIADS,
        }
    }

    fn seventh_qualities(&self) -> &'static [Quality; 7] {
        match self.mode {
            Mode::Major => &MAJOR_SEVENTHS,
            Mode::Minor => &MINOR_SEVENTHS,
        }
    }

    /// Root of the scale degree (1-based).
    pub fn degree_root(&self, degree: u8) -> Option<PitchClass> {
        let offset = self.scale().get((degree as usize).checked_sub(1)?)?;
        Some(self.tonic_pc().transpose(*offset as i32))
    }

    pub fn triad_quality(&self, degree: u8) -> Option<Quality> {
        self.triad_qualities().get((degree as usize).checked_sub(1)?).copied()
    }

    pub fn seventh_quality(&self, degree: u8) -> Option<Quality> {
        self.seventh_qualities().get((degree as usize).checked_sub(1)?).copied()
    }

    /// The chord built on `root` spelled for this key.
    pub fn spell(&self, root: PitchClass, quality: Quality) -> Chord {
        Chord::from_pitch_class(root, quality, self.prefer_flat())
    }

    /// # Examples
    /// ```
    /// use fretwise::Key;
    ///
    /// let c = Key::parse("C").unwrap();
    /// assert_eq!(c.diatonic_triad(2).unwrap().to_string(), "Dm");
    /// assert_eq!(c.diatonic_triad(7).unwrap().to_string(), "Bdim");
    /// ```
    pub fn diatonic_triad(&self, degree: u8) -> Option<Chord> {
        Some(self.spell(self.degree_root(degree)?, self.triad_quality(degree)?))
    }

    pub fn diatonic_seventh(&self, degree: u8) -> Option<Chord> {
        Some(self.spell(self.degree_root(degree)?, self.seventh_quality(degree)?))
    }

    /// The harmonic-minor major V (minor keys only).
    pub fn dominant_v(&self) -> Option<Chord> {
        match self.mode {
            Mode::Minor => Some(self.spell(self.degree_root(5)?, Quality::Major)),
            Mode::Major => None,
        }
    }

    /// The key on the same tonic with the other mode.
    pub fn parallel(&self) -> Key {
        let mode = match self.mode {
            Mode::Major => Mode::Minor,
            Mode::Minor => Mode::Major,
        };
        Key { tonic: self.tonic, mode }
    }

    /// All twelve major and twelve minor keys, conventionally spelled.
    pub fn all() -> Vec<Key> {
        const MAJOR: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B"];
        const MINOR: [&str; 12] = ["C", "C#", "D", "Eb", "E", "F", "F#", "G", "G#", "A", "Bb", "B"];
        let mut keys = Vec::with_capacity(24);
        for name in MAJOR {
            if let Ok(tonic) = SpelledPitch::parse(name) {
                keys.push(Key::new(tonic, Mode::Major));
            }
        }
        for name in MINOR {
            if let Ok(tonic) = SpelledPitch::parse(name) {
                keys.push(Key::new(tonic, Mode::Minor));
            }
        }
        keys
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Mode::Major => write!(f, "{}", self.tonic),
            Mode::Minor => write!(f, "{}m", self.tonic),
        }
    }
}

impl FromStr for Key {
    type Err = FretwiseError;

    fn from_str(s: &str) -> Result<Self> {
        Key::parse(s)
    }
}
