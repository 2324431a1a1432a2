//! # Rhythm Model
//!
//! Strum and arpeggio patterns, the preset library, and editable grids.
//!
//! ## Pattern Forms
//! - [`StrumPattern`] - ordered beats (`down`, `up`, `rest`), each a fraction
//!   of the measure; the fractions of a pattern sum to 1
//! - [`ArpeggioPattern`] - ordered string indices, one per step. An empty
//!   `noteOrder` makes the pattern *scalable*: the order is derived per chord
//!   from the strings the voicing actually sounds, rising in pitch when the
//!   name contains "Ascending" and falling otherwise
//!
//! ## Grids
//! A [`CustomPattern`] stores the user's grid. A strum grid has one cell per
//! step of the time signature; an arpeggio grid is string × step. Both
//! convert to the canonical pattern forms with [`CustomPattern::to_pattern()`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FretwiseError, Result};
use crate::voicing::{Instrument, VoicedNote};

/// Time signatures with presets.
pub const SUPPORTED_TIME_SIGNATURES: [(u8, u8); 8] =
    [(2, 2), (2, 4), (3, 4), (3, 8), (4, 4), (6, 8), (9, 8), (12, 8)];

const DEFAULT_PATTERN_BPM: u16 = 100;

/// Time signature (e.g. 4/4, 6/8), serialised as `"4/4"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    pub fn parse(s: &str) -> Result<Self> {
        let (num, den) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| FretwiseError::parse(s, "expected N/D"))?;
        let numerator: u8 = num
            .trim()
            .parse()
            .map_err(|_| FretwiseError::parse(s, "invalid numerator"))?;
        let denominator: u8 = den
            .trim()
            .parse()
            .map_err(|_| FretwiseError::parse(s, "invalid denominator"))?;
        if !SUPPORTED_TIME_SIGNATURES.contains(&(numerator, denominator)) {
            return Err(FretwiseError::parse(s, "unsupported time signature"));
        }
        Ok(TimeSignature {
            numerator,
            denominator,
        })
    }

    pub fn all() -> Vec<TimeSignature> {
        SUPPORTED_TIME_SIGNATURES
            .iter()
            .map(|&(numerator, denominator)| TimeSignature {
                numerator,
                denominator,
            })
            .collect()
    }

    /// Grid steps per measure: eighth-note resolution.
    pub fn steps(self) -> usize {
        usize::from(self.numerator) * 8 / usize::from(self.denominator)
    }

    pub fn beats_per_measure(self) -> u8 {
        self.numerator
    }

    fn slug(self) -> String {
        format!("{}-{}", self.numerator, self.denominator)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = FretwiseError;

    fn try_from(s: String) -> Result<Self> {
        TimeSignature::parse(&s)
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

/// Stroke type of a strum beat or strum grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stroke {
    Down,
    Up,
    Rest,
}

impl Stroke {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'D' | 'd' => Some(Stroke::Down),
            'U' | 'u' => Some(Stroke::Up),
            '-' | '.' => Some(Stroke::Rest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrumBeat {
    #[serde(rename = "type")]
    pub stroke: Stroke,
    /// Fraction of the measure, in (0, 1].
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrumPattern {
    pub name: String,
    pub bpm: u16,
    pub beats_per_measure: u8,
    pub time_signature: TimeSignature,
    pub beats: Vec<StrumBeat>,
}

impl StrumPattern {
    pub fn total_duration(&self) -> f64 {
        self.beats.iter().map(|b| b.duration).sum()
    }

    /// Every beat lies in (0, 1] and the beats fill exactly one measure.
    pub fn is_well_formed(&self) -> bool {
        !self.beats.is_empty()
            && self.beats.iter().all(|b| b.duration > 0.0 && b.duration <= 1.0)
            && (self.total_duration() - 1.0).abs() < 1e-9
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArpeggioPattern {
    pub name: String,
    pub bpm: u16,
    pub beats_per_measure: u8,
    pub time_signature: TimeSignature,
    #[serde(default)]
    pub note_order: Vec<usize>,
}

impl ArpeggioPattern {
    pub fn is_scalable(&self) -> bool {
        self.note_order.is_empty()
    }

    pub fn is_ascending(&self) -> bool {
        self.name.contains("Ascending")
    }

    /// The string order for one chord.
    ///
    /// Fixed patterns return their `noteOrder`; scalable ones sort the
    /// voicing's sounded strings by pitch. Recomputed on every call so a
    /// voicing change is picked up on the next pass.
    pub fn order_for(&self, voicing: &[VoicedNote]) -> Vec<usize> {
        if !self.is_scalable() {
            return self.note_order.clone();
        }
        let mut sounded: Vec<&VoicedNote> = voicing.iter().collect();
        sounded.sort_by_key(|n| (n.note.midi(), std::cmp::Reverse(n.string_index)));
        if !self.is_ascending() {
            sounded.reverse();
        }
        sounded.into_iter().map(|n| n.string_index).collect()
    }
}

/// A resolved playback pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Pattern {
    Block,
    Strum(StrumPattern),
    Arpeggio(ArpeggioPattern),
}

impl Pattern {
    pub fn beats_per_measure(&self) -> Option<u8> {
        match self {
            Pattern::Block => None,
            Pattern::Strum(p) => Some(p.beats_per_measure),
            Pattern::Arpeggio(p) => Some(p.beats_per_measure),
        }
    }
}

/// Reference from a progression node or song slot to a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PatternRef {
    #[default]
    Block,
    Strum(String),
    Arpeggio(String),
}

/// Cells of a user-editable grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "cells", rename_all = "lowercase")]
pub enum PatternGrid {
    /// One stroke per step.
    Strum(Vec<Stroke>),
    /// `cells[string_index][step]`.
    Arpeggio(Vec<Vec<bool>>),
}

/// A user pattern as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPattern {
    pub id: String,
    pub name: String,
    pub time_signature: TimeSignature,
    #[serde(default = "default_bpm")]
    pub bpm: u16,
    pub grid: PatternGrid,
}

fn default_bpm() -> u16 {
    DEFAULT_PATTERN_BPM
}

impl CustomPattern {
    pub fn to_pattern(&self) -> Result<Pattern> {
        let steps = self.time_signature.steps();
        let wrong_width = |found: usize| {
            FretwiseError::parse(
                &self.name,
                format!("grid has {} steps, {} needs {}", found, self.time_signature, steps),
            )
        };
        match &self.grid {
            PatternGrid::Strum(cells) => {
                if cells.len() != steps {
                    return Err(wrong_width(cells.len()));
                }
                let duration = 1.0 / steps as f64;
                Ok(Pattern::Strum(StrumPattern {
                    name: self.name.clone(),
                    bpm: self.bpm,
                    beats_per_measure: self.time_signature.beats_per_measure(),
                    time_signature: self.time_signature,
                    beats: cells
                        .iter()
                        .map(|&stroke| StrumBeat { stroke, duration })
                        .collect(),
                }))
            }
            PatternGrid::Arpeggio(rows) => {
                if let Some(row) = rows.iter().find(|row| row.len() != steps) {
                    return Err(wrong_width(row.len()));
                }
                let mut note_order = Vec::new();
                for step in 0..steps {
                    for (string_index, row) in rows.iter().enumerate() {
                        if row[step] {
                            note_order.push(string_index);
                        }
                    }
                }
                if note_order.is_empty() {
                    return Err(FretwiseError::parse(&self.name, "arpeggio grid has no active cells"));
                }
                Ok(Pattern::Arpeggio(ArpeggioPattern {
                    name: self.name.clone(),
                    bpm: self.bpm,
                    beats_per_measure: self.time_signature.beats_per_measure(),
                    time_signature: self.time_signature,
                    note_order,
                }))
            }
        }
    }
}

// (time signature, name, beats as stroke/denominator tokens)
const STRUM_PRESETS: &[((u8, u8), &str, &str)] = &[
    ((2, 2), "Cut Time", "D/2 D/2"),
    ((2, 2), "Two Feel", "D/4 -/4 D/4 U/4"),
    ((2, 4), "March", "D/2 D/2"),
    ((2, 4), "Polka", "D/4 U/4 D/4 U/4"),
    ((3, 4), "Waltz", "D/3 D/3 D/3"),
    ((3, 4), "Waltz Strum", "D/3 D/6 U/6 D/6 U/6"),
    ((3, 8), "Jig", "D/3 U/3 U/3"),
    ((4, 4), "Down Strums", "D/4 D/4 D/4 D/4"),
    ((4, 4), "Folk", "D/4 D/8 U/8 -/8 U/8 D/8 U/8"),
    ((4, 4), "Rock Eighths", "D/8 D/8 D/8 D/8 D/8 D/8 D/8 D/8"),
    ((4, 4), "Pop Push", "D/8 -/8 D/8 U/8 -/8 U/8 D/8 U/8"),
    ((4, 4), "Offbeat", "-/8 U/8 -/8 U/8 -/8 U/8 -/8 U/8"),
    ((6, 8), "Compound", "D/6 -/6 U/6 D/6 -/6 U/6"),
    ((6, 8), "Ballad", "D/6 D/6 U/6 D/6 D/6 U/6"),
    ((9, 8), "Slip Jig", "D/9 U/9 U/9 D/9 U/9 U/9 D/9 U/9 U/9"),
    ((12, 8), "Slow Blues", "D/12 U/12 U/12 D/12 U/12 U/12 D/12 U/12 U/12 D/12 U/12 U/12"),
];

const GUITAR_ARPEGGIOS: &[((u8, u8), &str, &[usize])] = &[
    ((4, 4), "Travis", &[5, 2, 3, 1, 4, 2, 3, 1]),
    ((4, 4), "Broken Chord", &[4, 3, 2, 1, 0, 1, 2, 3]),
    ((3, 4), "Waltz Pick", &[4, 2, 1, 0, 1, 2]),
    ((6, 8), "Ballad Roll", &[5, 3, 2, 1, 2, 3]),
    ((12, 8), "Slow Roll", &[5, 3, 2, 1, 0, 1, 2, 3, 2, 1, 0, 1]),
];

const UKULELE_ARPEGGIOS: &[((u8, u8), &str, &[usize])] = &[
    ((4, 4), "Campfire", &[3, 2, 1, 0, 1, 2, 1, 0]),
    ((4, 4), "Pinch", &[2, 0, 1, 0, 2, 0, 1, 0]),
    ((3, 4), "Waltz Pick", &[2, 1, 0, 1, 0, 1]),
    ((6, 8), "Roll", &[3, 2, 1, 0, 1, 2]),
];

fn parse_beats(tokens: &str) -> Vec<StrumBeat> {
    tokens
        .split_whitespace()
        .filter_map(|token| {
            let (stroke, den) = token.split_once('/')?;
            let stroke = Stroke::from_char(stroke.chars().next()?)?;
            let den: u32 = den.parse().ok()?;
            Some(StrumBeat {
                stroke,
                duration: 1.0 / f64::from(den),
            })
        })
        .collect()
}

fn slug(name: &str) -> String {
    name.to_ascii_lowercase().replace(' ', "-")
}

fn time_signature(pair: (u8, u8)) -> TimeSignature {
    TimeSignature {
        numerator: pair.0,
        denominator: pair.1,
    }
}

/// Patterns addressable by id: presets for one instrument plus custom ones.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: BTreeMap<String, Pattern>,
}

impl PatternLibrary {
    pub fn presets(instrument: Instrument) -> Self {
        let mut patterns = BTreeMap::new();

        for &(ts, name, beats) in STRUM_PRESETS {
            let ts = time_signature(ts);
            patterns.insert(
                format!("strum-{}-{}", ts.slug(), slug(name)),
                Pattern::Strum(StrumPattern {
                    name: name.to_string(),
                    bpm: DEFAULT_PATTERN_BPM,
                    beats_per_measure: ts.beats_per_measure(),
                    time_signature: ts,
                    beats: parse_beats(beats),
                }),
            );
        }

        let fixed = match instrument {
            Instrument::Guitar => GUITAR_ARPEGGIOS,
            Instrument::Ukulele => UKULELE_ARPEGGIOS,
        };
        let scalable = TimeSignature::all().into_iter().flat_map(|ts| {
            ["Ascending", "Descending"]
                .into_iter()
                .map(move |name| (ts, name, &[] as &[usize]))
        });
        let fixed = fixed
            .iter()
            .map(|&(ts, name, order)| (time_signature(ts), name, order));
        for (ts, name, order) in scalable.chain(fixed) {
            patterns.insert(
                format!("arp-{}-{}", ts.slug(), slug(name)),
                Pattern::Arpeggio(ArpeggioPattern {
                    name: name.to_string(),
                    bpm: DEFAULT_PATTERN_BPM,
                    beats_per_measure: ts.beats_per_measure(),
                    time_signature: ts,
                    note_order: order.to_vec(),
                }),
            );
        }

        PatternLibrary { patterns }
    }

    /// Add a user pattern under its own id, replacing any pattern with that id.
    pub fn insert_custom(&mut self, custom: &CustomPattern) -> Result<()> {
        let pattern = custom.to_pattern()?;
        if let Pattern::Strum(strum) = &pattern {
            if !strum.is_well_formed() {
                return Err(FretwiseError::parse(&custom.id, "strum beats do not fill one measure"));
            }
        }
        self.patterns.insert(custom.id.clone(), pattern);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    /// Resolve a reference; a dangling id resolves to block.
    pub fn resolve(&self, reference: &PatternRef) -> Pattern {
        let (id, wanted_strum) = match reference {
            PatternRef::Block => return Pattern::Block,
            PatternRef::Strum(id) => (id, true),
            PatternRef::Arpeggio(id) => (id, false),
        };
        match self.patterns.get(id) {
            Some(Pattern::Strum(strum)) if wanted_strum && !strum.is_well_formed() => {
                tracing::warn!("strum pattern '{}' does not fill one measure, playing block", id);
                Pattern::Block
            }
            Some(p @ Pattern::Strum(_)) if wanted_strum => p.clone(),
            Some(p @ Pattern::Arpeggio(_)) if !wanted_strum => p.clone(),
            _ => {
                tracing::warn!("unknown pattern id '{}', playing block", id);
                Pattern::Block
            }
        }
    }

    pub fn for_time_signature(&self, ts: TimeSignature) -> impl Iterator<Item = (&str, &Pattern)> {
        self.patterns.iter().filter_map(move |(id, p)| {
            let matches = match p {
                Pattern::Block => false,
                Pattern::Strum(s) => s.time_signature == ts,
                Pattern::Arpeggio(a) => a.time_signature == ts,
            };
            matches.then_some((id.as_str(), p))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pattern)> {
        self.patterns.iter().map(|(id, p)| (id.as_str(), p))
    }
}
