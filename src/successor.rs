//! # Successor Engine
//!
//! Weighted transition tables from one chord function to the next, one table
//! per mode. Suggestions are a *ranking*, not a sample: candidates are sorted
//! by descending weight (ties keep table order) and nothing here is random.
//!
//! Also hosts two helpers built on the same analysis:
//! - [`substitutions`] - alternative colours for a chord (sus, sevenths, ninths,
//!   tritone substitution)
//! - [`FORMULAS`] - named progression templates realised through [`realize`]

use crate::analysis::{function_of, realize, realize_str, RomanNumeral};
use crate::chord::{parse_chord, Chord, Quality};
use crate::key::{Key, Mode};

/// One edge of a transition table.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub to: RomanNumeral,
    pub weight: u32,
    pub is_borrowed: bool,
}

/// A ranked suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub chord: String,
    pub roman: RomanNumeral,
    pub weight: u32,
    pub is_borrowed: bool,
}

type RawTable = &'static [(&'static str, &'static [(&'static str, u32, bool)])];

const MAJOR_TABLE: RawTable = &[
    ("I", &[
        ("IV", 10, false), ("V", 10, false), ("ii", 8, false), ("vi", 8, false),
        ("I", 6, false), ("iii", 5, false), ("V/V", 4, false), ("iv", 4, true),
        ("♭VII", 3, true), ("V/vi", 3, false), ("vii", 2, false),
    ]),
    ("ii", &[
        ("V", 10, false), ("vii", 6, false), ("IV", 5, false), ("ii", 4, false),
        ("V/V", 4, false), ("I", 3, false), ("iv", 3, true),
    ]),
    ("iii", &[
        ("vi", 10, false), ("IV", 8, false), ("ii", 6, false), ("iii", 4, false),
        ("V/vi", 4, false), ("I", 3, false),
    ]),
    ("IV", &[
        ("V", 10, false), ("I", 9, false), ("ii", 6, false), ("iv", 6, true),
        ("IV", 5, false), ("vii", 4, false), ("vi", 4, false), ("♭VII", 3, true),
    ]),
    ("V", &[
        ("I", 10, false), ("vi", 8, false), ("IV", 5, false), ("V", 5, false),
        ("iii", 3, false), ("V/vi", 3, false), ("♭VI", 3, true),
    ]),
    ("vi", &[
        ("IV", 10, false), ("ii", 9, false), ("V", 7, false), ("iii", 5, false),
        ("vi", 4, false), ("I", 4, false), ("V/V", 3, false), ("♭VI", 2, true),
    ]),
    ("vii", &[("I", 10, false), ("iii", 5, false), ("vi", 4, false), ("vii", 2, false)]),
    ("V/V", &[("V", 10, false), ("ii", 3, false), ("V/V", 2, false)]),
    ("V/vi", &[("vi", 10, false), ("IV", 4, false)]),
    ("V/ii", &[("ii", 10, false), ("V/V", 3, false)]),
    ("V/iii", &[("iii", 10, false), ("vi", 3, false)]),
    ("iv", &[("I", 8, true), ("V", 6, true), ("♭VII", 5, true), ("iv", 3, true)]),
    ("♭VII", &[("I", 8, true), ("IV", 6, true), ("♭VI", 4, true), ("♭VII", 3, true)]),
    ("♭VI", &[("♭VII", 8, true), ("V", 6, true), ("I", 5, true), ("iv", 4, true)]),
    ("♭III", &[("♭VI", 6, true), ("IV", 5, true), ("♭VII", 5, true), ("♭III", 3, true)]),
];

const MINOR_TABLE: RawTable = &[
    ("i", &[
        ("iv", 10, false), ("V", 10, false), ("VI", 8, false), ("VII", 8, false),
        ("i", 6, false), ("III", 6, false), ("ii", 4, false), ("v", 4, false),
        ("V/iv", 3, false),
    ]),
    ("ii", &[("V", 10, false), ("v", 6, false), ("i", 4, false), ("ii", 3, false), ("VII", 3, false)]),
    ("III", &[
        ("VI", 10, false), ("iv", 8, false), ("VII", 7, false), ("III", 4, false), ("i", 4, false),
    ]),
    ("iv", &[
        ("V", 10, false), ("i", 9, false), ("VII", 7, false), ("ii", 5, false), ("iv", 5, false),
        ("VI", 4, false), ("v", 4, false),
    ]),
    ("v", &[("i", 8, false), ("VI", 7, false), ("iv", 6, false), ("v", 4, false)]),
    ("V", &[("i", 10, false), ("VI", 6, false), ("V", 4, false), ("iv", 3, false)]),
    ("VI", &[
        ("VII", 10, false), ("iv", 8, false), ("ii", 6, false), ("i", 6, false), ("III", 5, false),
        ("V", 5, false), ("VI", 4, false),
    ]),
    ("VII", &[("III", 10, false), ("i", 9, false), ("VI", 6, false), ("VII", 4, false), ("v", 3, false)]),
    ("V/iv", &[("iv", 10, false), ("VII", 3, false)]),
];

/// Outgoing transitions for every function in one mode.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    entries: Vec<(RomanNumeral, Vec<Transition>)>,
}

impl TransitionTable {
    fn from_raw(raw: RawTable) -> Self {
        let parse = |text: &str| match RomanNumeral::parse(text) {
            Ok(roman) => Some(roman),
            Err(e) => {
                tracing::warn!("skipping transition numeral '{}': {}", text, e);
                None
            }
        };
        let entries = raw
            .iter()
            .filter_map(|(from, edges)| {
                let from = parse(from)?;
                let edges = edges
                    .iter()
                    .filter_map(|(to, weight, is_borrowed)| {
                        Some(Transition {
                            to: parse(to)?,
                            weight: *weight,
                            is_borrowed: *is_borrowed,
                        })
                    })
                    .collect();
                Some((from, edges))
            })
            .collect();
        TransitionTable { entries }
    }

    pub fn major() -> Self {
        Self::from_raw(MAJOR_TABLE)
    }

    pub fn minor() -> Self {
        Self::from_raw(MINOR_TABLE)
    }

    pub fn transitions_from(&self, from: &RomanNumeral) -> &[Transition] {
        self.entries
            .iter()
            .find(|(f, _)| f == from)
            .map(|(_, edges)| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn functions(&self) -> impl Iterator<Item = &RomanNumeral> {
        self.entries.iter().map(|(f, _)| f)
    }
}

/// Ranked next-chord suggestions for a key.
#[derive(Debug, Clone)]
pub struct SuccessorEngine {
    major: TransitionTable,
    minor: TransitionTable,
}

impl Default for SuccessorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuccessorEngine {
    pub fn new() -> Self {
        SuccessorEngine {
            major: TransitionTable::major(),
            minor: TransitionTable::minor(),
        }
    }

    pub fn table(&self, mode: Mode) -> &TransitionTable {
        match mode {
            Mode::Major => &self.major,
            Mode::Minor => &self.minor,
        }
    }

    /// Ranked candidates with their numerals and weights.
    ///
    /// Empty when `from_chord` has no function in `key`.
    pub fn ranked(&self, from_chord: &str, key: &Key, allow_borrowed: bool) -> Vec<Suggestion> {
        let from = match parse_chord(from_chord).ok().and_then(|c| function_of(&c, key)) {
            Some(roman) => roman.base(),
            None => return Vec::new(),
        };

        let mut edges: Vec<&Transition> = self
            .table(key.mode)
            .transitions_from(&from)
            .iter()
            .filter(|t| allow_borrowed || key.mode == Mode::Minor || !t.is_borrowed)
            .collect();
        // Stable sort keeps table order among equal weights.
        edges.sort_by(|a, b| b.weight.cmp(&a.weight));

        let mut out: Vec<Suggestion> = Vec::new();
        for edge in edges {
            let chord = if edge.to == from {
                from_chord.trim().to_string()
            } else {
                match realize(&edge.to, key) {
                    Some(chord) => chord.to_string(),
                    None => continue,
                }
            };
            if out.iter().any(|s| s.chord == chord) {
                continue;
            }
            out.push(Suggestion {
                chord,
                roman: edge.to.clone(),
                weight: edge.weight,
                is_borrowed: edge.is_borrowed,
            });
        }
        out
    }

    /// Next-chord symbols, best first.
    ///
    /// # Examples
    /// ```
    /// use fretwise::{Key, SuccessorEngine};
    ///
    /// let engine = SuccessorEngine::new();
    /// let next = engine.suggest("C", &Key::parse("C").unwrap(), false);
    /// assert_eq!(&next[..4], ["F", "G", "Dm", "Am"]);
    /// ```
    pub fn suggest(&self, from_chord: &str, key: &Key, allow_borrowed: bool) -> Vec<String> {
        self.ranked(from_chord, key, allow_borrowed)
            .into_iter()
            .map(|s| s.chord)
            .collect()
    }
}

/// Alternative colours for a chord on the same root, plus the tritone
/// substitute for dominant sevenths.
pub fn substitutions(chord: &Chord) -> Vec<Chord> {
    let same_root: &[Quality] = match chord.quality {
        Quality::Major => &[Quality::Major7, Quality::Sus2, Quality::Sus4, Quality::Major9],
        Quality::Minor => &[Quality::Minor7, Quality::Minor9, Quality::Sus2, Quality::Sus4],
        Quality::Dominant7 => &[Quality::Dominant9, Quality::Dominant7Sus4, Quality::Major],
        Quality::Major7 => &[Quality::Major9, Quality::Major],
        Quality::Minor7 => &[Quality::Minor9, Quality::Minor],
        Quality::HalfDiminished7 => &[Quality::Diminished, Quality::Minor7],
        Quality::Diminished => &[Quality::HalfDiminished7],
        Quality::Sus2 => &[Quality::Major, Quality::Sus4],
        Quality::Sus4 => &[Quality::Major, Quality::Sus2, Quality::Dominant7Sus4],
        Quality::Dominant9 => &[Quality::Dominant7],
        Quality::Minor9 => &[Quality::Minor7],
        Quality::Major9 => &[Quality::Major7],
        Quality::Dominant7Sus4 => &[Quality::Dominant7, Quality::Sus4],
    };
    let mut out: Vec<Chord> = same_root
        .iter()
        .map(|&quality| Chord::new(chord.root, quality))
        .collect();
    if chord.quality == Quality::Dominant7 {
        out.push(chord.transpose(6, true));
    }
    out
}

/// A named progression template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionFormula {
    pub name: &'static str,
    pub mode: Mode,
    pub numerals: &'static [&'static str],
}

pub const FORMULAS: &[ProgressionFormula] = &[
    ProgressionFormula { name: "Pop", mode: Mode::Major, numerals: &["I", "V", "vi", "IV"] },
    ProgressionFormula { name: "Fifties", mode: Mode::Major, numerals: &["I", "vi", "IV", "V"] },
    ProgressionFormula { name: "Jazz ii-V-I", mode: Mode::Major, numerals: &["iim7", "V7", "Imaj7"] },
    ProgressionFormula { name: "Minor ii-V-i", mode: Mode::Minor, numerals: &["iim7b5", "V7", "im7"] },
    ProgressionFormula { name: "Andalusian", mode: Mode::Minor, numerals: &["i", "VII", "VI", "V"] },
    ProgressionFormula { name: "Mixolydian Rock", mode: Mode::Major, numerals: &["I", "♭VII", "IV", "I"] },
    ProgressionFormula {
        name: "Twelve-Bar Blues",
        mode: Mode::Major,
        numerals: &["I7", "I7", "I7", "I7", "IV7", "IV7", "I7", "I7", "V7", "IV7", "I7", "V7"],
    },
];

/// Realise each numeral of a formula; numerals without meaning in `key` give `None`.
pub fn realize_formula(numerals: &[&str], key: &Key) -> Vec<Option<Chord>> {
    numerals.iter().map(|n| realize_str(n, key)).collect()
}
