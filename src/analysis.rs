//! # Harmonic Analysis
//!
//! Round-trip between chord symbols and Roman-numeral functions within a key.
//!
//! ## Numeral Syntax
//! ```text
//! [♭|b] numeral [quality] [/ target]
//!
//! numeral  I II III IV V VI VII   (uppercase = major triad)
//!          i ii iii iv v vi vii   (lowercase = minor or diminished triad)
//! quality  any chord quality suffix (7, maj7, m7, m7b5, dim ...)
//! target   a diatonic numeral, for secondary dominants (V/V, V7/ii)
//! ```
//!
//! Without a quality suffix a numeral means the triad implied by the key.
//! A suffix overrides that quality on the same root, so the jazz formula
//! `iim7b5 V7 im7` realises to `Bm7b5 E7 Am7` in A minor.
//!
//! ## Non-diatonic Rules
//! - **Harmonic-minor dominant**: in a minor key `V` is the major V (and `V7`).
//! - **Borrowed chords**: a major key borrows `iv`, `♭III`, `♭VI` and `♭VII`
//!   from its parallel minor.
//! - **Secondary dominants**: `V/x` is the major triad a fifth above the
//!   diatonic target `x`; `V7/x` is its dominant-seventh spelling.

use std::fmt;
use std::str::FromStr;

use crate::chord::{parse_chord, Chord, Quality};
use crate::error::{FretwiseError, Result};
use crate::key::{Key, Mode};

const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// A Roman-numeral chord function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RomanNumeral {
    pub flat: bool,
    /// Scale degree, 1-based.
    pub degree: u8,
    pub upper: bool,
    /// Explicit quality overriding the implied triad.
    pub quality: Option<Quality>,
    /// Target of a secondary dominant.
    pub target: Option<Box<RomanNumeral>>,
}

impl RomanNumeral {
    pub fn new(degree: u8, upper: bool) -> Self {
        RomanNumeral {
            flat: false,
            degree,
            upper,
            quality: None,
            target: None,
        }
    }

    pub fn flat(degree: u8, upper: bool) -> Self {
        RomanNumeral {
            flat: true,
            ..RomanNumeral::new(degree, upper)
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// `V/target`
    pub fn secondary(target: RomanNumeral) -> Self {
        RomanNumeral {
            target: Some(Box::new(target)),
            ..RomanNumeral::new(5, true)
        }
    }

    /// The diatonic numeral of `degree`, cased by the key's triad quality.
    pub fn diatonic(key: &Key, degree: u8) -> Option<Self> {
        let quality = key.triad_quality(degree)?;
        Some(RomanNumeral::new(degree, !quality.is_minor_like()))
    }

    /// The function without a top-level quality suffix (`V7/ii` → `V/ii`).
    pub fn base(&self) -> RomanNumeral {
        RomanNumeral {
            quality: None,
            ..self.clone()
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (head, target) = match trimmed.split_once('/') {
            Some((head, target)) => (head, Some(Box::new(RomanNumeral::parse(target)?))),
            None => (trimmed, None),
        };

        let (flat, rest) = if let Some(rest) = head.strip_prefix('♭') {
            (true, rest)
        } else if let Some(rest) = head.strip_prefix('b') {
            (true, rest)
        } else {
            (false, head)
        };

        let numeral_len = rest
            .char_indices()
            .find(|(_, c)| !matches!(c, 'I' | 'V' | 'i' | 'v'))
            .map_or(rest.len(), |(i, _)| i);
        let (numeral, suffix) = rest.split_at(numeral_len);
        if numeral.is_empty() {
            return Err(FretwiseError::parse(s, "missing Roman numeral"));
        }

        let upper = numeral.chars().all(|c| c.is_ascii_uppercase());
        let lower = numeral.chars().all(|c| c.is_ascii_lowercase());
        if !upper && !lower {
            return Err(FretwiseError::parse(s, "mixed-case Roman numeral"));
        }
        let degree = NUMERALS
            .iter()
            .position(|n| n.eq_ignore_ascii_case(numeral))
            .ok_or_else(|| FretwiseError::parse(s, format!("unknown numeral '{}'", numeral)))?
            as u8
            + 1;

        let quality = if suffix.is_empty() {
            None
        } else {
            Some(Quality::from_symbol(suffix).ok_or_else(|| {
                FretwiseError::parse(s, format!("unsupported quality suffix '{}'", suffix))
            })?)
        };

        Ok(RomanNumeral {
            flat,
            degree,
            upper,
            quality,
            target,
        })
    }
}

impl fmt::Display for RomanNumeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flat {
            f.write_str("♭")?;
        }
        let numeral = NUMERALS[(self.degree.clamp(1, 7) - 1) as usize];
        if self.upper {
            f.write_str(numeral)?;
        } else {
            f.write_str(&numeral.to_ascii_lowercase())?;
        }
        if let Some(quality) = self.quality {
            f.write_str(quality.symbol())?;
        }
        if let Some(target) = &self.target {
            write!(f, "/{}", target)?;
        }
        Ok(())
    }
}

impl FromStr for RomanNumeral {
    type Err = FretwiseError;

    fn from_str(s: &str) -> Result<Self> {
        RomanNumeral::parse(s)
    }
}

/// Borrowed numerals for major keys with the qualities accepted for each.
fn borrowed_rules() -> [(RomanNumeral, [Quality; 2]); 4] {
    [
        (RomanNumeral::new(4, false), [Quality::Minor, Quality::Minor7]),
        (RomanNumeral::flat(7, true), [Quality::Major, Quality::Dominant7]),
        (RomanNumeral::flat(6, true), [Quality::Major, Quality::Major7]),
        (RomanNumeral::flat(3, true), [Quality::Major, Quality::Major7]),
    ]
}

/// Non-tonic, non-diminished diatonic chords that a secondary dominant may target.
pub fn secondary_targets(key: &Key) -> Vec<RomanNumeral> {
    (2..=7)
        .filter_map(|degree| {
            let quality = key.triad_quality(degree)?;
            if quality == Quality::Diminished {
                return None;
            }
            if key.mode == Mode::Minor && degree == 5 {
                return Some(RomanNumeral::new(5, true));
            }
            RomanNumeral::diatonic(key, degree)
        })
        .collect()
}

/// Every diatonic numeral of the key, including the minor-key major `V`.
pub fn diatonic_numerals(key: &Key) -> Vec<RomanNumeral> {
    let mut numerals: Vec<RomanNumeral> = (1..=7).filter_map(|d| RomanNumeral::diatonic(key, d)).collect();
    if key.mode == Mode::Minor {
        numerals.insert(5, RomanNumeral::new(5, true));
    }
    numerals
}

fn is_diatonic_numeral(roman: &RomanNumeral, key: &Key) -> bool {
    if roman.flat || roman.target.is_some() {
        return false;
    }
    diatonic_numerals(key)
        .iter()
        .any(|n| n.degree == roman.degree && n.upper == roman.upper)
}

/// Whether the numeral is one of the major-key borrowed chords.
pub fn is_borrowed(roman: &RomanNumeral, key: &Key) -> bool {
    key.mode == Mode::Major
        && roman.target.is_none()
        && borrowed_rules().iter().any(|(rule, _)| {
            rule.degree == roman.degree && rule.flat == roman.flat && rule.upper == roman.upper
        })
}

/// Root and implied triad quality of a numeral without a target.
fn numeral_chord(roman: &RomanNumeral, key: &Key) -> Option<(crate::note::PitchClass, Quality)> {
    if is_diatonic_numeral(roman, key) {
        let root = key.degree_root(roman.degree)?;
        let quality = if key.mode == Mode::Minor && roman.degree == 5 && roman.upper {
            Quality::Major
        } else {
            key.triad_quality(roman.degree)?
        };
        return Some((root, quality));
    }
    if is_borrowed(roman, key) {
        let parallel = key.parallel();
        let root = parallel.degree_root(roman.degree)?;
        let quality = parallel.triad_quality(roman.degree)?;
        return Some((root, quality));
    }
    None
}

/// Realise a numeral as a concrete chord in `key`.
///
/// Returns `None` for numerals with no meaning in the key: uppercase forms
/// of minor degrees, flats outside the borrowed set, or secondary dominants
/// whose target is not a diatonic chord.
///
/// # Examples
/// ```
/// use fretwise::{realize, Key, RomanNumeral};
///
/// let c = Key::parse("C").unwrap();
/// let v_of_v: RomanNumeral = "V/V".parse().unwrap();
/// assert_eq!(realize(&v_of_v, &c).unwrap().to_string(), "D");
///
/// let a_minor = Key::parse("Am").unwrap();
/// let v: RomanNumeral = "V".parse().unwrap();
/// assert_eq!(realize(&v, &a_minor).unwrap().to_string(), "E");
/// ```
pub fn realize(roman: &RomanNumeral, key: &Key) -> Option<Chord> {
    if let Some(target) = &roman.target {
        if roman.flat || roman.degree != 5 || !roman.upper {
            return None;
        }
        if target.quality.is_some() || !is_diatonic_numeral(target, key) {
            return None;
        }
        if !secondary_targets(key)
            .iter()
            .any(|t| t.degree == target.degree)
        {
            return None;
        }
        let target_root = key.degree_root(target.degree)?;
        let quality = roman.quality.unwrap_or(Quality::Major);
        return Some(key.spell(target_root.transpose(7), quality));
    }
    let (root, implied) = numeral_chord(roman, key)?;
    Some(key.spell(root, roman.quality.unwrap_or(implied)))
}

/// Realise a numeral given as text; malformed numerals give `None`.
pub fn realize_str(roman: &str, key: &Key) -> Option<Chord> {
    match RomanNumeral::parse(roman) {
        Ok(roman) => realize(&roman, key),
        Err(e) => {
            tracing::debug!("cannot realise '{}': {}", roman, e);
            None
        }
    }
}

/// Determine the function of `chord` in `key`.
///
/// Diatonic triads and sevenths match first; then the minor-key major V,
/// then borrowed chords, then secondary dominants. Extension qualities
/// (`sus2`, `9` ...) have no function.
///
/// # Examples
/// ```
/// use fretwise::{function_of, parse_chord, Key};
///
/// let c = Key::parse("C").unwrap();
/// let roman = |s: &str| function_of(&parse_chord(s).unwrap(), &c).map(|r| r.to_string());
///
/// assert_eq!(roman("Dm").as_deref(), Some("ii"));
/// assert_eq!(roman("G7").as_deref(), Some("V7"));
/// assert_eq!(roman("Bb").as_deref(), Some("♭VII"));
/// assert_eq!(roman("E7").as_deref(), Some("V7/vi"));
/// assert_eq!(roman("Csus4"), None);
/// ```
pub fn function_of(chord: &Chord, key: &Key) -> Option<RomanNumeral> {
    if !chord.quality.is_analysable() {
        return None;
    }
    let root = chord.root_pc();

    for degree in 1..=7u8 {
        if key.degree_root(degree) != Some(root) {
            continue;
        }
        if key.triad_quality(degree) == Some(chord.quality) {
            return RomanNumeral::diatonic(key, degree);
        }
        if key.seventh_quality(degree) == Some(chord.quality) {
            return RomanNumeral::diatonic(key, degree).map(|r| r.with_quality(chord.quality));
        }
    }

    if key.mode == Mode::Minor && key.degree_root(5) == Some(root) {
        match chord.quality {
            Quality::Major => return Some(RomanNumeral::new(5, true)),
            Quality::Dominant7 => return Some(RomanNumeral::new(5, true).with_quality(Quality::Dominant7)),
            _ => {}
        }
    }

    if key.mode == Mode::Major {
        let parallel = key.parallel();
        for (rule, accepted) in borrowed_rules() {
            if parallel.degree_root(rule.degree) != Some(root) || !accepted.contains(&chord.quality) {
                continue;
            }
            return Some(if parallel.triad_quality(rule.degree) == Some(chord.quality) {
                rule
            } else {
                rule.with_quality(chord.quality)
            });
        }
    }

    for target in secondary_targets(key) {
        let target_root = key.degree_root(target.degree)?;
        if target_root.transpose(7) != root {
            continue;
        }
        match chord.quality {
            Quality::Major => return Some(RomanNumeral::secondary(target)),
            Quality::Dominant7 => {
                return Some(RomanNumeral::secondary(target).with_quality(Quality::Dominant7))
            }
            _ => {}
        }
    }

    None
}

/// Analyse a chord symbol; unparseable symbols have no function.
pub fn analyze(symbol: &str, key: &Key) -> Option<RomanNumeral> {
    match parse_chord(symbol) {
        Ok(chord) => function_of(&chord, key),
        Err(e) => {
            tracing::debug!("no function for '{}': {}", symbol, e);
            None
        }
    }
}
