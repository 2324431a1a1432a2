//! Voicing catalogues
//!
//! A catalogue maps chord symbols to an ordered list of voicings for one
//! tuning; the first voicing is the default. Catalogues are YAML documents:
//!
//! ```yaml
//! instrument: guitar
//! tuning: [E2, A2, D3, G3, B3, E4]
//! chords:
//!   "C":
//!     - frets: [x, 3, 2, 0, 1, 0]
//!     - frets: [x, 3, 5, 5, 5, 3]
//!       barres: [{fret: 3, from-string: 0, to-string: 4}]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::validate::validate_catalogue;
use super::{Instrument, Tuning, VoicedNote, Voicing};
use crate::chord::parse_chord;
use crate::error::{FretwiseError, Result};

const GUITAR_YAML: &str = include_str!("../../data/guitar.yaml");
const UKULELE_YAML: &str = include_str!("../../data/ukulele.yaml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalogue {
    pub instrument: Instrument,
    pub tuning: Tuning,
    pub chords: BTreeMap<String, Vec<Voicing>>,
}

impl Catalogue {
    /// Deserialise a catalogue document as written, without validation.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| FretwiseError::Catalogue(e.to_string()))
    }

    /// Deserialise, log validation findings, and drop voicings whose string
    /// count does not match the tuning.
    pub fn load(text: &str) -> Result<Self> {
        let mut catalogue = Self::from_yaml(text)?;
        for issue in validate_catalogue(&catalogue) {
            tracing::warn!("{} catalogue: {}", catalogue.instrument, issue);
        }
        let strings = catalogue.tuning.string_count();
        for (symbol, voicings) in catalogue.chords.iter_mut() {
            let before = voicings.len();
            voicings.retain(|v| v.frets.len() == strings);
            if voicings.len() != before {
                tracing::warn!(
                    "dropped {} voicing(s) of {} with the wrong string count",
                    before - voicings.len(),
                    symbol
                );
            }
        }
        catalogue.chords.retain(|_, voicings| !voicings.is_empty());
        Ok(catalogue)
    }

    /// The catalogue shipped with the crate for `instrument`.
    pub fn builtin(instrument: Instrument) -> Result<Self> {
        let text = match instrument {
            Instrument::Guitar => GUITAR_YAML,
            Instrument::Ukulele => UKULELE_YAML,
        };
        Self::load(text)
    }

    /// Voicings for a symbol, matching enharmonic spellings (`A#` finds `Bb`).
    pub fn voicings(&self, symbol: &str) -> &[Voicing] {
        if let Some(voicings) = self.chords.get(symbol.trim()) {
            return voicings;
        }
        let Ok(wanted) = parse_chord(symbol) else {
            return &[];
        };
        self.chords
            .iter()
            .find(|(name, _)| parse_chord(name).is_ok_and(|c| c.same_sound(&wanted)))
            .map(|(_, voicings)| voicings.as_slice())
            .unwrap_or(&[])
    }

    /// The voicing at `index`, falling back to the default when out of range.
    pub fn voicing(&self, symbol: &str, index: usize) -> Option<&Voicing> {
        let voicings = self.voicings(symbol);
        voicings.get(index).or_else(|| voicings.first())
    }

    /// Sounded notes of `symbol`'s voicing, top string first.
    ///
    /// Empty when the chord is not catalogued.
    ///
    /// # Example
    /// ```
    /// use fretwise::{Catalogue, Instrument};
    ///
    /// let guitar = Catalogue::builtin(Instrument::Guitar).unwrap();
    /// let notes: Vec<String> = guitar
    ///     .voicing_for("C", 0)
    ///     .iter()
    ///     .map(|n| n.note.to_string())
    ///     .collect();
    /// assert_eq!(notes, ["E4", "C4", "G3", "E3", "C3"]);
    /// ```
    pub fn voicing_for(&self, symbol: &str, index: usize) -> Vec<VoicedNote> {
        self.voicing(symbol, index)
            .map(|v| v.notes(&self.tuning))
            .unwrap_or_default()
    }

    pub fn string_count(&self) -> usize {
        self.tuning.string_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::Chord;
    use crate::note::PitchClass;
    use std::collections::BTreeSet;

    #[test]
    fn test_builtin_catalogues_load() {
        let guitar = Catalogue::builtin(Instrument::Guitar).unwrap();
        assert_eq!(guitar.string_count(), 6);
        assert!(guitar.chords.len() >= 150);
        let uke = Catalogue::builtin(Instrument::Ukulele).unwrap();
        assert_eq!(uke.string_count(), 4);
        assert_eq!(uke.voicing_for("C", 0).len(), 4);
    }

    #[test]
    fn test_index_falls_back_to_first() {
        let guitar = Catalogue::builtin(Instrument::Guitar).unwrap();
        assert_eq!(guitar.voicing("C", 99), guitar.voicing("C", 0));
        assert_ne!(guitar.voicing("C", 1), guitar.voicing("C", 0));
    }

    #[test]
    fn test_enharmonic_lookup() {
        let guitar = Catalogue::builtin(Instrument::Guitar).unwrap();
        assert_eq!(guitar.voicings("A#m"), guitar.voicings("Bbm"));
        assert!(!guitar.voicings("Db7").is_empty());
        assert!(guitar.voicings("Cadd11").is_empty());
        assert!(guitar.voicing_for("Cadd11", 0).is_empty());
    }

    #[test]
    fn test_voicings_sound_their_chord() {
        for instrument in [Instrument::Guitar, Instrument::Ukulele] {
            let catalogue = Catalogue::builtin(instrument).unwrap();
            for (symbol, voicings) in &catalogue.chords {
                let chord: Chord = parse_chord(symbol).unwrap();
                let expected: BTreeSet<PitchClass> = chord.pitch_classes().into_iter().collect();
                for voicing in voicings {
                    let sounded: BTreeSet<PitchClass> = voicing
                        .notes(&catalogue.tuning)
                        .iter()
                        .map(|n| n.note.pitch_class)
                        .collect();
                    assert_eq!(sounded, expected, "{} {} {}", instrument, symbol, voicing);
                }
            }
        }
    }

    #[test]
    fn test_load_drops_wrong_string_count() {
        let yaml = r#"
instrument: guitar
tuning: [E2, A2, D3, G3, B3, E4]
chords:
  "C":
    - frets: [x, 3, 2, 0, 1]
    - frets: [x, 3, 2, 0, 1, 0]
  "G":
    - frets: [3, 2, 0]
"#;
        let raw = Catalogue::from_yaml(yaml).unwrap();
        assert_eq!(raw.chords["C"].len(), 2);
        let loaded = Catalogue::load(yaml).unwrap();
        assert_eq!(loaded.chords["C"].len(), 1);
        assert!(!loaded.chords.contains_key("G"));
    }

    #[test]
    fn test_bad_yaml_is_catalogue_error() {
        let err = Catalogue::from_yaml("instrument: banjo").unwrap_err();
        assert!(matches!(err, FretwiseError::Catalogue(_)));
    }
}
