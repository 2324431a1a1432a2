pub mod analysis;
pub mod chord;
pub mod config;
pub mod error;
pub mod key;
pub mod midi;
pub mod note;
pub mod playback;
pub mod progression;
pub mod rhythm;
pub mod store;
pub mod successor;
pub mod transpose;
pub mod voicing;

pub use analysis::{analyze, function_of, realize, realize_str, RomanNumeral};
pub use chord::{parse_chord, Chord, Quality};
pub use config::EngineConfig;
pub use error::*;
pub use key::{Key, Mode};
pub use midi::{export_midi, MidiOptions};
pub use note::{Note, PitchClass};
pub use playback::{PlaybackController, PlaybackItem};
pub use progression::{ProgressionTree, Song, SongSection};
pub use rhythm::{PatternLibrary, PatternRef};
pub use successor::SuccessorEngine;
pub use transpose::transpose;
pub use voicing::{validate_catalogue, Catalogue, CatalogueIssue, Instrument, VoicedNote, Voicing};

/// Ranked next-chord suggestions from `from_chord` in `key`.
/// A malformed chord yields no suggestions.
pub fn suggest(from_chord: &str, key: &Key, allow_borrowed: bool) -> Vec<String> {
    SuccessorEngine::new().suggest(from_chord, key, allow_borrowed)
}

/// The sounded notes of a chord's voicing from the built-in catalogue.
/// An out-of-range index falls back to the first voicing; an unknown
/// chord yields no notes.
pub fn voicing_for(symbol: &str, instrument: Instrument, index: usize) -> Result<Vec<VoicedNote>> {
    Ok(Catalogue::builtin(instrument)?.voicing_for(symbol, index))
}
