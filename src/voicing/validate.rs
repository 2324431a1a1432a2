//! Catalogue validation
//!
//! Scans every (chord, voicing) pair and reports advisory findings. The
//! report never rejects a catalogue; [`super::Catalogue::load`] only drops
//! voicings whose string count is wrong.

use std::fmt;

use super::{Catalogue, Tuning, Voicing};
use crate::chord::parse_chord;
use crate::note::PitchClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Chord tones not sounded by any string.
    Missing(Vec<PitchClass>),
    /// Sounded pitch classes outside the chord.
    NonChordTones(Vec<PitchClass>),
    AllMuted,
    StringCountMismatch { expected: usize, found: usize },
    /// The symbol's quality is not one the analyser understands.
    UnsupportedQuality(String),
}

fn join(pcs: &[PitchClass]) -> String {
    pcs.iter().map(|pc| pc.name()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Missing(pcs) => write!(f, "missing: {}", join(pcs)),
            IssueKind::NonChordTones(pcs) => write!(f, "non-chord tones: {}", join(pcs)),
            IssueKind::AllMuted => f.write_str("all strings muted"),
            IssueKind::StringCountMismatch { expected, found } => {
                write!(f, "{} strings given, tuning has {}", found, expected)
            }
            IssueKind::UnsupportedQuality(message) => write!(f, "quality not supported: {}", message),
        }
    }
}

/// One finding for one voicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueIssue {
    pub chord: String,
    pub voicing_index: usize,
    pub kind: IssueKind,
}

impl fmt::Display for CatalogueIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} voicing {}: {}", self.chord, self.voicing_index, self.kind)
    }
}

/// Check a single voicing of `symbol` against `tuning`.
pub fn validate_voicing(symbol: &str, voicing_index: usize, voicing: &Voicing, tuning: &Tuning) -> Vec<CatalogueIssue> {
    let issue = |kind| CatalogueIssue {
        chord: symbol.to_string(),
        voicing_index,
        kind,
    };

    if voicing.frets.len() != tuning.string_count() {
        return vec![issue(IssueKind::StringCountMismatch {
            expected: tuning.string_count(),
            found: voicing.frets.len(),
        })];
    }
    let chord = match parse_chord(symbol) {
        Ok(chord) => chord,
        Err(e) => return vec![issue(IssueKind::UnsupportedQuality(e.to_string()))],
    };
    if voicing.is_all_muted() {
        return vec![issue(IssueKind::AllMuted)];
    }

    let expected = chord.pitch_classes();
    let sounded: Vec<PitchClass> = voicing
        .notes(tuning)
        .iter()
        .map(|n| n.note.pitch_class)
        .collect();

    let mut issues = Vec::new();
    let missing: Vec<PitchClass> = expected
        .iter()
        .filter(|pc| !sounded.contains(pc))
        .copied()
        .collect();
    if !missing.is_empty() {
        issues.push(issue(IssueKind::Missing(missing)));
    }
    let mut extra: Vec<PitchClass> = sounded
        .iter()
        .filter(|pc| !expected.contains(pc))
        .copied()
        .collect();
    extra.sort();
    extra.dedup();
    if !extra.is_empty() {
        issues.push(issue(IssueKind::NonChordTones(extra)));
    }
    issues
}

/// Validate every voicing in the catalogue.
pub fn validate_catalogue(catalogue: &Catalogue) -> Vec<CatalogueIssue> {
    catalogue
        .chords
        .iter()
        .flat_map(|(symbol, voicings)| {
            voicings
                .iter()
                .enumerate()
                .flat_map(move |(i, v)| validate_voicing(symbol, i, v, &catalogue.tuning))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voicing::{Fret, Instrument};

    fn guitar() -> Catalogue {
        Catalogue::builtin(Instrument::Guitar).unwrap()
    }

    #[test]
    fn test_open_c_is_clean() {
        let tuning = guitar().tuning;
        let c = Voicing::from_chart("x32010").unwrap();
        assert!(validate_voicing("C", 0, &c, &tuning).is_empty());
    }

    #[test]
    fn test_sharpened_b_string_is_one_non_chord_tone() {
        let tuning = guitar().tuning;
        let mut c = Voicing::from_chart("x32010").unwrap();
        c.frets[4] = Fret::At(2);
        let issues = validate_voicing("C", 0, &c, &tuning);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind.to_string(), "non-chord tones: C#");
    }

    #[test]
    fn test_missing_fifth() {
        let tuning = guitar().tuning;
        let c7 = Voicing::from_chart("x32310").unwrap();
        let issues = validate_voicing("C7", 0, &c7, &tuning);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "C7 voicing 0: missing: G");
    }

    #[test]
    fn test_structural_issues() {
        let tuning = guitar().tuning;
        let muted = Voicing::from_chart("xxxxxx").unwrap();
        assert_eq!(validate_voicing("C", 0, &muted, &tuning)[0].kind, IssueKind::AllMuted);

        let short = Voicing::from_chart("x3201").unwrap();
        assert_eq!(
            validate_voicing("C", 0, &short, &tuning)[0].kind,
            IssueKind::StringCountMismatch { expected: 6, found: 5 }
        );

        let c = Voicing::from_chart("x32010").unwrap();
        assert!(matches!(
            validate_voicing("Cadd9", 0, &c, &tuning)[0].kind,
            IssueKind::UnsupportedQuality(_)
        ));
    }

    #[test]
    fn test_builtin_catalogues_validate_clean() {
        for instrument in [Instrument::Guitar, Instrument::Ukulele] {
            let issues = validate_catalogue(&Catalogue::builtin(instrument).unwrap());
            assert!(issues.is_empty(), "{:?}", issues);
        }
    }
}
