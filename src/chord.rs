//! Chord symbol parsing and the quality → interval table
//!
//! Parses chord symbols (`C`, `Am`, `G7`, `C#m7b5`, `Bbmaj7` ...) into a root
//! and a [`Quality`]. The root keeps its written spelling for display while
//! arithmetic uses the folded pitch class.

use std::fmt;
use std::str::FromStr;

use crate::error::{FretwiseError, Result};
use crate::note::{PitchClass, SpelledPitch};

/// Recognised chord qualities.
///
/// The first seven take part in harmonic analysis; the extensions are only
/// produced by the substitution generator and accepted in catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
    HalfDiminished7,
    Diminished,
    Sus2,
    Sus4,
    Dominant9,
    Minor9,
    Major9,
    Dominant7Sus4,
}

impl Quality {
    pub const ALL: [Quality; 13] = [
        Quality::Major,
        Quality::Minor,
        Quality::Dominant7,
        Quality::Major7,
        Quality::Minor7,
        Quality::HalfDiminished7,
        Quality::Diminished,
        Quality::Sus2,
        Quality::Sus4,
        Quality::Dominant9,
        Quality::Minor9,
        Quality::Major9,
        Quality::Dominant7Sus4,
    ];

    /// Canonical suffix as written after the root.
    pub fn symbol(self) -> &'static str {
        match self {
            Quality::Major => "",
            Quality::Minor => "m",
            Quality::Dominant7 => "7",
            Quality::Major7 => "maj7",
            Quality::Minor7 => "m7",
            Quality::HalfDiminished7 => "m7b5",
            Quality::Diminished => "dim",
            Quality::Sus2 => "sus2",
            Quality::Sus4 => "sus4",
            Quality::Dominant9 => "9",
            Quality::Minor9 => "m9",
            Quality::Major9 => "maj9",
            Quality::Dominant7Sus4 => "7sus4",
        }
    }

    /// Look up a suffix, accepting the usual alternate spellings.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let quality = match symbol {
            "" | "maj" | "M" => Quality::Major,
            "m" | "min" | "-" => Quality::Minor,
            "7" => Quality::Dominant7,
            "maj7" | "M7" | "Δ7" => Quality::Major7,
            "m7" | "min7" | "-7" => Quality::Minor7,
            "m7b5" | "m7♭5" | "ø" | "ø7" => Quality::HalfDiminished7,
            "dim" | "°" => Quality::Diminished,
            "sus2" => Quality::Sus2,
            "sus4" | "sus" => Quality::Sus4,
            "9" => Quality::Dominant9,
            "m9" | "min9" => Quality::Minor9,
            "maj9" | "M9" => Quality::Major9,
            "7sus4" => Quality::Dominant7Sus4,
            _ => return None,
        };
        Some(quality)
    }

    /// Intervals above the root, in ascending order.
    ///
    /// - Minor 3rd = 3, major 3rd = 4, perfect 5th = 7
    /// - Minor 7th = 10, major 7th = 11, 9th = 14
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Quality::Major => &[0, 4, 7],
            Quality::Minor => &[0, 3, 7],
            Quality::Dominant7 => &[0, 4, 7, 10],
            Quality::Major7 => &[0, 4, 7, 11],
            Quality::Minor7 => &[0, 3, 7, 10],
            Quality::HalfDiminished7 => &[0, 3, 6, 10],
            Quality::Diminished => &[0, 3, 6],
            Quality::Sus2 => &[0, 2, 7],
            Quality::Sus4 => &[0, 5, 7],
            Quality::Dominant9 => &[0, 4, 7, 10, 14],
            Quality::Minor9 => &[0, 3, 7, 10, 14],
            Quality::Major9 => &[0, 4, 7, 11, 14],
            Quality::Dominant7Sus4 => &[0, 5, 7, 10],
        }
    }

    /// Whether the harmonic analyser assigns functions to this quality.
    pub fn is_analysable(self) -> bool {
        matches!(
            self,
            Quality::Major
                | Quality::Minor
                | Quality::Dominant7
                | Quality::Major7
                | Quality::Minor7
                | Quality::HalfDiminished7
                | Quality::Diminished
        )
    }

    /// Minor or diminished third, written with a lowercase numeral.
    pub fn is_minor_like(self) -> bool {
        matches!(
            self,
            Quality::Minor | Quality::Minor7 | Quality::Minor9 | Quality::HalfDiminished7 | Quality::Diminished
        )
    }
}

/// A parsed chord symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub root: SpelledPitch,
    pub quality: Quality,
}

impl Chord {
    pub fn new(root: SpelledPitch, quality: Quality) -> Self {
        Chord { root, quality }
    }

    pub fn from_pitch_class(root: PitchClass, quality: Quality, prefer_flat: bool) -> Self {
        Chord {
            root: SpelledPitch::from_pitch_class(root, prefer_flat),
            quality,
        }
    }

    pub fn root_pc(&self) -> PitchClass {
        self.root.pitch_class()
    }

    /// Pitch classes of the chord tones, root first.
    pub fn pitch_classes(&self) -> Vec<PitchClass> {
        let root = self.root_pc();
        self.quality
            .intervals()
            .iter()
            .map(|&i| root.transpose(i as i32))
            .collect()
    }

    /// Same quality, root moved by `semitones` and respelled.
    pub fn transpose(&self, semitones: i32, prefer_flat: bool) -> Chord {
        Chord::from_pitch_class(self.root_pc().transpose(semitones), self.quality, prefer_flat)
    }

    /// Equal up to the enharmonic spelling of the root.
    pub fn same_sound(&self, other: &Chord) -> bool {
        self.root_pc() == other.root_pc() && self.quality == other.quality
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality.symbol())
    }
}

impl FromStr for Chord {
    type Err = FretwiseError;

    fn from_str(s: &str) -> Result<Self> {
        parse_chord(s)
    }
}

/// Parse a chord symbol into root and quality.
///
/// # Examples
/// ```
/// use fretwise::{parse_chord, Quality};
///
/// let chord = parse_chord("C#m7b5").unwrap();
/// assert_eq!(chord.quality, Quality::HalfDiminished7);
/// assert_eq!(chord.root_pc().value(), 1);
///
/// // Flat roots keep their spelling but fold for arithmetic
/// let bb = parse_chord("Bbmaj7").unwrap();
/// assert_eq!(bb.to_string(), "Bbmaj7");
/// assert_eq!(bb.root_pc().name(), "A#");
///
/// assert!(parse_chord("Cadd11").is_err());
/// ```
pub fn parse_chord(symbol: &str) -> Result<Chord> {
    let trimmed = symbol.trim();
    let (root, consumed) = SpelledPitch::parse_prefix(trimmed)?;
    let suffix = &trimmed[consumed..];
    let quality = Quality::from_symbol(suffix).ok_or_else(|| {
        FretwiseError::parse(symbol, format!("unsupported chord quality '{}'", suffix))
    })?;
    Ok(Chord { root, quality })
}
