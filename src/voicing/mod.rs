//! # Voicing Module
//!
//! Resolve chord symbols to concrete fretted voicings on an instrument.
//!
//! ## String Numbering
//! Catalogues list frets in chart order, lowest chart string first, the way
//! chord charts are written (`x32010` for an open C on guitar). Playback and
//! UI code address strings by *string index*, where index 0 is the top string
//! of the diagram (the last chart entry: high E on guitar, A on ukulele).
//!
//! ## Sub-modules
//! - `catalogue` - YAML catalogue documents and the built-in catalogues
//! - `validate` - advisory catalogue validation
//!
//! ## Entry Point
//! [`Catalogue::voicing_for()`] - the sounded notes of a chord's voicing

mod catalogue;
mod validate;

pub use catalogue::Catalogue;
pub use validate::{validate_catalogue, validate_voicing, CatalogueIssue, IssueKind};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FretwiseError, Result};
use crate::note::Note;

/// Supported instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Guitar,
    Ukulele,
}

impl Instrument {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guitar" => Ok(Instrument::Guitar),
            "ukulele" | "uke" => Ok(Instrument::Ukulele),
            _ => Err(FretwiseError::parse(s, "expected 'guitar' or 'ukulele'")),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Guitar => "guitar",
            Instrument::Ukulele => "ukulele",
        }
    }

    pub fn string_count(self) -> usize {
        match self {
            Instrument::Guitar => 6,
            Instrument::Ukulele => 4,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Open-string pitches in chart order (lowest chart string first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuning(pub Vec<Note>);

impl Tuning {
    pub fn string_count(&self) -> usize {
        self.0.len()
    }

    /// Open pitch of the string at `string_index` (0 = top of the diagram).
    pub fn open_string(&self, string_index: usize) -> Option<Note> {
        let position = self.string_count().checked_sub(string_index + 1)?;
        self.0.get(position).copied()
    }
}

/// One string's fret: a number, or muted (`x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFret", into = "RawFret")]
pub enum Fret {
    Muted,
    At(u8),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawFret {
    Number(u8),
    Text(String),
}

impl TryFrom<RawFret> for Fret {
    type Error = String;

    fn try_from(raw: RawFret) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawFret::Number(n) => Ok(Fret::At(n)),
            RawFret::Text(text) if text.eq_ignore_ascii_case("x") => Ok(Fret::Muted),
            RawFret::Text(text) => text
                .parse()
                .map(Fret::At)
                .map_err(|_| format!("invalid fret '{}'", text)),
        }
    }
}

impl From<Fret> for RawFret {
    fn from(fret: Fret) -> Self {
        match fret {
            Fret::Muted => RawFret::Text("x".to_string()),
            Fret::At(n) => RawFret::Number(n),
        }
    }
}

/// A barre across a range of string indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Barre {
    pub fret: u8,
    pub from_string: usize,
    pub to_string: usize,
}

/// A playable shape: one fret per string in chart order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voicing {
    pub frets: Vec<Fret>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub barres: Vec<Barre>,
}

impl Voicing {
    /// Parse a compact chart such as `x32010` (single-digit frets) or
    /// `x,10,12,12,11,x`.
    pub fn from_chart(chart: &str) -> Result<Self> {
        let tokens: Vec<String> = if chart.contains(',') {
            chart.split(',').map(|t| t.trim().to_string()).collect()
        } else {
            chart.chars().map(|c| c.to_string()).collect()
        };
        let frets = tokens
            .into_iter()
            .map(|token| {
                Fret::try_from(RawFret::Text(token)).map_err(|message| FretwiseError::parse(chart, message))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Voicing { frets, barres: Vec::new() })
    }

    /// The sounded notes, ordered by string index (top of the diagram first).
    ///
    /// Frets beyond the tuning's strings are ignored.
    pub fn notes(&self, tuning: &Tuning) -> Vec<VoicedNote> {
        let count = self.frets.len();
        let mut notes: Vec<VoicedNote> = self
            .frets
            .iter()
            .enumerate()
            .filter_map(|(position, fret)| {
                let Fret::At(n) = fret else { return None };
                let string_index = count - 1 - position;
                let open = tuning.open_string(string_index)?;
                Some(VoicedNote {
                    note: open.at_fret(*n),
                    string_index,
                })
            })
            .collect();
        notes.sort_by_key(|n| n.string_index);
        notes
    }

    pub fn is_all_muted(&self) -> bool {
        self.frets.iter().all(|f| *f == Fret::Muted)
    }
}

impl fmt::Display for Voicing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wide = self.frets.iter().any(|fret| matches!(fret, Fret::At(n) if *n > 9));
        for (i, fret) in self.frets.iter().enumerate() {
            if wide && i > 0 {
                f.write_str(",")?;
            }
            match fret {
                Fret::Muted => f.write_str("x")?,
                Fret::At(n) => write!(f, "{}", n)?,
            }
        }
        Ok(())
    }
}

/// A sounded note and the string it is played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicedNote {
    pub note: Note,
    pub string_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guitar_tuning() -> Tuning {
        Tuning(
            ["E2", "A2", "D3", "G3", "B3", "E4"]
                .iter()
                .map(|n| Note::parse(n).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_open_string_indexing() {
        let tuning = guitar_tuning();
        assert_eq!(tuning.open_string(0).unwrap().to_string(), "E4");
        assert_eq!(tuning.open_string(5).unwrap().to_string(), "E2");
        assert!(tuning.open_string(6).is_none());
    }

    #[test]
    fn test_notes_high_string_first() {
        let c = Voicing::from_chart("x32010").unwrap();
        let notes: Vec<String> = c
            .notes(&guitar_tuning())
            .iter()
            .map(|n| format!("{}@{}", n.note, n.string_index))
            .collect();
        assert_eq!(notes, ["E4@0", "C4@1", "G3@2", "E3@3", "C3@4"]);
    }

    #[test]
    fn test_chart_forms() {
        let wide = Voicing::from_chart("x,10,12,12,11,x").unwrap();
        assert_eq!(wide.frets[1], Fret::At(10));
        assert_eq!(wide.to_string(), "x,10,12,12,11,x");
        assert_eq!(Voicing::from_chart("x32010").unwrap().to_string(), "x32010");
        assert!(Voicing::from_chart("x3201q").is_err());
        assert!(Voicing::from_chart("xxxxxx").unwrap().is_all_muted());
    }

    #[test]
    fn test_fret_yaml() {
        let voicing: Voicing = serde_yaml::from_str("frets: [x, 3, 2, 0, 1, 0]").unwrap();
        assert_eq!(voicing.frets[0], Fret::Muted);
        assert_eq!(voicing.frets[1], Fret::At(3));
        let text = serde_yaml::to_string(&voicing).unwrap();
        let back: Voicing = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, voicing);
    }
}
