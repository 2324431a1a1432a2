//! Persistence
//!
//! The engine keeps one JSON document per user: saved progressions, songs,
//! custom patterns and opaque UI state for each instrument, plus the last
//! active instrument. The document lives behind the [`Store`] trait, and
//! [`DebouncedWriter`] coalesces bursts of edits into one commit.
//!
//! Fields the engine does not know are kept in flattened maps, so a
//! document written by a newer front end survives a load/save cycle.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FretwiseError, Result};
use crate::progression::Song;
use crate::rhythm::CustomPattern;
use crate::voicing::Instrument;

/// Key of the document in the store.
pub const DOCUMENT_KEY: &str = "fretwise";

/// A key/value space of JSON values.
pub trait Store {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn put(&mut self, key: &str, value: Value) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A store kept as a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| FretwiseError::Store(format!("{}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| FretwiseError::Store(format!("{}: {}", self.path.display(), e)))
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);
        let content = serde_json::to_string_pretty(&all)
            .map_err(|e| FretwiseError::Store(e.to_string()))?;
        fs::write(&self.path, content)
            .map_err(|e| FretwiseError::Store(format!("{}: {}", self.path.display(), e)))
    }
}

/// A named progression as saved by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedProgression {
    pub name: String,
    pub tonic: String,
    pub chords: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SavedProgression {
    pub fn new(name: &str, tonic: &str, chords: &[&str]) -> Self {
        SavedProgression {
            name: name.to_string(),
            tonic: tonic.to_string(),
            chords: chords.iter().map(|c| c.to_string()).collect(),
            extra: Map::new(),
        }
    }

    fn same_identity(&self, other: &SavedProgression) -> bool {
        self.name == other.name && self.tonic == other.tonic && self.chords == other.chords
    }
}

/// Everything saved for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentState {
    pub progressions: Vec<SavedProgression>,
    pub songs: Vec<Song>,
    pub custom_patterns: Vec<CustomPattern>,
    pub color_settings: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    pub arranger_state: Map<String, Value>,
    pub workspace_state: Map<String, Value>,
    pub ui_layout: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredDocument {
    pub last_active_instrument: Instrument,
    pub guitar: InstrumentState,
    pub ukulele: InstrumentState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredDocument {
    /// Read the document; a store without one yields the defaults.
    /// Song sections come back with one slot entry per chord.
    pub fn load(store: &dyn Store) -> Result<Self> {
        let Some(value) = store.get(DOCUMENT_KEY)? else {
            return Ok(StoredDocument::default());
        };
        let mut document: StoredDocument = serde_json::from_value(value)
            .map_err(|e| FretwiseError::Store(format!("stored document: {}", e)))?;
        for state in [&mut document.guitar, &mut document.ukulele] {
            state.songs.iter_mut().for_each(Song::align);
        }
        Ok(document)
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<()> {
        let value = serde_json::to_value(self).map_err(|e| FretwiseError::Store(e.to_string()))?;
        store.put(DOCUMENT_KEY, value)
    }

    pub fn instrument(&self, instrument: Instrument) -> &InstrumentState {
        match instrument {
            Instrument::Guitar => &self.guitar,
            Instrument::Ukulele => &self.ukulele,
        }
    }

    pub fn instrument_mut(&mut self, instrument: Instrument) -> &mut InstrumentState {
        match instrument {
            Instrument::Guitar => &mut self.guitar,
            Instrument::Ukulele => &mut self.ukulele,
        }
    }
}

/// Holds the in-memory document and commits it after edits settle.
///
/// Each edit pushes the commit deadline `debounce` into the future. A failed
/// commit leaves the writer dirty and retries one debounce later; the
/// in-memory document stays authoritative throughout.
pub struct DebouncedWriter<S: Store> {
    store: S,
    document: StoredDocument,
    debounce: Duration,
    deadline: Option<Instant>,
}

impl<S: Store> DebouncedWriter<S> {
    pub fn open(store: S, debounce: Duration) -> Result<Self> {
        let document = StoredDocument::load(&store)?;
        Ok(DebouncedWriter {
            store,
            document,
            debounce,
            deadline: None,
        })
    }

    pub fn document(&self) -> &StoredDocument {
        &self.document
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_dirty(&self) -> bool {
        self.deadline.is_some()
    }

    /// Edit the document and schedule a commit.
    pub fn update<F: FnOnce(&mut StoredDocument)>(&mut self, now: Instant, edit: F) {
        edit(&mut self.document);
        self.deadline = Some(now + self.debounce);
    }

    /// Commit if the debounce window has passed. Returns whether a commit
    /// happened.
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return Ok(false),
        }
        match self.commit() {
            Ok(()) => Ok(true),
            Err(e) => {
                self.deadline = Some(now + self.debounce);
                Err(e)
            }
        }
    }

    /// Commit now if anything is pending, e.g. when the session ends.
    pub fn force_flush(&mut self) -> Result<()> {
        if self.is_dirty() {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.document.save(&mut self.store) {
            Ok(()) => {
                self.deadline = None;
                tracing::info!("stored document committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("store commit failed, will retry: {}", e);
                Err(e)
            }
        }
    }
}

fn parse_records<T: DeserializeOwned>(json: &str) -> Result<Vec<T>> {
    serde_json::from_str(json).map_err(|e| FretwiseError::ImportFormat(e.to_string()))
}

fn to_json<T: Serialize>(records: &[T]) -> Result<String> {
    serde_json::to_string_pretty(records).map_err(|e| FretwiseError::Store(e.to_string()))
}

impl InstrumentState {
    pub fn export_patterns(&self) -> Result<String> {
        to_json(&self.custom_patterns)
    }

    pub fn export_progressions(&self) -> Result<String> {
        to_json(&self.progressions)
    }

    pub fn export_songs(&self) -> Result<String> {
        to_json(&self.songs)
    }

    /// Import custom patterns, skipping exact duplicates. Every record must
    /// convert to a playable pattern or nothing is imported.
    pub fn import_patterns(&mut self, json: &str) -> Result<usize> {
        let records: Vec<CustomPattern> = parse_records(json)?;
        for record in &records {
            record
                .to_pattern()
                .map_err(|e| FretwiseError::ImportFormat(format!("pattern '{}': {}", record.name, e)))?;
        }
        let mut added = 0;
        for record in records {
            if self.custom_patterns.contains(&record) {
                continue;
            }
            self.custom_patterns.push(record);
            added += 1;
        }
        Ok(added)
    }

    /// Import progressions, skipping any whose name, tonic and chords match
    /// one already saved.
    pub fn import_progressions(&mut self, json: &str) -> Result<usize> {
        let records: Vec<SavedProgression> = parse_records(json)?;
        let mut added = 0;
        for record in records {
            if self.progressions.iter().any(|p| p.same_identity(&record)) {
                continue;
            }
            self.progressions.push(record);
            added += 1;
        }
        Ok(added)
    }

    /// Import songs, skipping any whose name and structure match one
    /// already saved.
    pub fn import_songs(&mut self, json: &str) -> Result<usize> {
        let records: Vec<Song> = parse_records(json)?;
        if let Some(bad) = records.iter().find(|s| !s.is_consistent()) {
            return Err(FretwiseError::ImportFormat(format!(
                "song '{}' has sections with mismatched slot arrays",
                bad.name
            )));
        }
        let mut added = 0;
        for record in records {
            if self
                .songs
                .iter()
                .any(|s| s.name == record.name && s.structure == record.structure)
            {
                continue;
            }
            self.songs.push(record);
            added += 1;
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::SongSection;
    use crate::rhythm::{PatternGrid, Stroke, TimeSignature};
    use serde_json::json;

    struct FailingStore {
        fail: bool,
        inner: MemoryStore,
    }

    impl Store for FailingStore {
        fn get(&self, key: &str) -> Result<Option<Value>> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &str, value: Value) -> Result<()> {
            if self.fail {
                return Err(FretwiseError::Store("disk full".into()));
            }
            self.inner.put(key, value)
        }
    }

    fn pattern(id: &str) -> CustomPattern {
        CustomPattern {
            id: id.to_string(),
            name: "Shuffle".to_string(),
            time_signature: TimeSignature::parse("2/4").unwrap(),
            bpm: 90,
            grid: PatternGrid::Strum(vec![Stroke::Down, Stroke::Rest, Stroke::Up, Stroke::Up]),
        }
    }

    #[test]
    fn test_defaults_when_store_is_empty() {
        let doc = StoredDocument::load(&MemoryStore::new()).unwrap();
        assert_eq!(doc, StoredDocument::default());
        assert_eq!(doc.last_active_instrument, Instrument::Guitar);
    }

    #[test]
    fn test_short_section_arrays_are_padded_on_load() {
        let mut store = MemoryStore::new();
        store
            .put(
                DOCUMENT_KEY,
                json!({
                    "guitar": {
                        "songs": [{
                            "name": "Sketch",
                            "structure": ["v"],
                            "sections": [{"id": "v", "label": "Verse", "chords": ["C", "G"]}]
                        }]
                    }
                }),
            )
            .unwrap();

        let mut doc = StoredDocument::load(&store).unwrap();
        let section = doc.guitar.songs[0].section_mut("v").unwrap();
        assert!(section.is_consistent());
        assert_eq!(section.voicing_indices, [0, 0]);

        assert!(section.move_chord(0, 1));
        assert_eq!(section.chords, ["G", "C"]);
        section.insert_chord(2, "Am");
        assert!(section.set_pattern(2, crate::rhythm::PatternRef::Strum("s".into())));
        assert!(section.is_consistent());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let mut store = MemoryStore::new();
        store
            .put(
                DOCUMENT_KEY,
                json!({
                    "lastActiveInstrument": "ukulele",
                    "theme": "dark",
                    "guitar": {
                        "progressions": [{"name": "Pop", "tonic": "C", "chords": ["C", "G"], "starred": true}],
                        "backgroundColor": "#222",
                        "futureField": [1, 2, 3]
                    }
                }),
            )
            .unwrap();

        let doc = StoredDocument::load(&store).unwrap();
        assert_eq!(doc.last_active_instrument, Instrument::Ukulele);
        assert_eq!(doc.guitar.background_color.as_deref(), Some("#222"));
        assert!(doc.ukulele.progressions.is_empty());

        doc.save(&mut store).unwrap();
        let saved = store.get(DOCUMENT_KEY).unwrap().unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["guitar"]["futureField"], json!([1, 2, 3]));
        assert_eq!(saved["guitar"]["progressions"][0]["starred"], true);
        assert!(saved["ukulele"].get("backgroundColor").is_none());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.get("missing").unwrap(), None);
        store.put("a", json!(1)).unwrap();
        store.put("b", json!({"x": true})).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("a").unwrap(), Some(json!(1)));
        assert_eq!(reopened.get("b").unwrap(), Some(json!({"x": true})));
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("a"), Err(FretwiseError::Store(_))));
    }

    #[test]
    fn test_debounce_coalesces_edits() {
        let start = Instant::now();
        let mut writer = DebouncedWriter::open(MemoryStore::new(), Duration::from_secs(2)).unwrap();

        writer.update(start, |d| d.guitar.progressions.push(SavedProgression::new("A", "C", &["C"])));
        writer.update(start + Duration::from_secs(1), |d| {
            d.guitar.progressions.push(SavedProgression::new("B", "C", &["F"]))
        });

        assert!(!writer.tick(start + Duration::from_secs(2)).unwrap());
        assert!(writer.store().get(DOCUMENT_KEY).unwrap().is_none());

        assert!(writer.tick(start + Duration::from_secs(3)).unwrap());
        assert!(!writer.is_dirty());
        let saved = StoredDocument::load(writer.store()).unwrap();
        assert_eq!(saved.guitar.progressions.len(), 2);
    }

    #[test]
    fn test_failed_commit_stays_dirty_and_retries() {
        let start = Instant::now();
        let store = FailingStore {
            fail: true,
            inner: MemoryStore::new(),
        };
        let mut writer = DebouncedWriter::open(store, Duration::from_secs(2)).unwrap();
        writer.update(start, |d| d.last_active_instrument = Instrument::Ukulele);

        let failed_at = start + Duration::from_secs(2);
        assert!(matches!(writer.tick(failed_at), Err(FretwiseError::Store(_))));
        assert!(writer.is_dirty());
        assert_eq!(writer.document().last_active_instrument, Instrument::Ukulele);

        writer.store.fail = false;
        assert!(!writer.tick(failed_at + Duration::from_secs(1)).unwrap());
        assert!(writer.tick(failed_at + Duration::from_secs(2)).unwrap());
        assert!(!writer.is_dirty());
    }

    #[test]
    fn test_force_flush() {
        let mut writer = DebouncedWriter::open(MemoryStore::new(), Duration::from_secs(2)).unwrap();
        writer.force_flush().unwrap();
        assert!(writer.store().get(DOCUMENT_KEY).unwrap().is_none());

        writer.update(Instant::now(), |d| d.ukulele.custom_patterns.push(pattern("p1")));
        writer.force_flush().unwrap();
        let saved = StoredDocument::load(writer.store()).unwrap();
        assert_eq!(saved.ukulele.custom_patterns, [pattern("p1")]);
    }

    #[test]
    fn test_pattern_import_skips_duplicates() {
        let mut state = InstrumentState::default();
        state.custom_patterns.push(pattern("p1"));
        let exported = state.export_patterns().unwrap();

        let mut other = pattern("p2");
        other.bpm = 120;
        let incoming = to_json(&[pattern("p1"), other.clone()]).unwrap();

        assert_eq!(state.import_patterns(&exported).unwrap(), 0);
        assert_eq!(state.import_patterns(&incoming).unwrap(), 1);
        assert_eq!(state.custom_patterns, [pattern("p1"), other]);
    }

    #[test]
    fn test_bad_import_leaves_state_untouched() {
        let mut state = InstrumentState::default();
        state.custom_patterns.push(pattern("p1"));
        let before = state.clone();

        assert!(matches!(state.import_patterns("{\"not\": \"an array\"}"), Err(FretwiseError::ImportFormat(_))));

        let mut wrong_length = pattern("p3");
        wrong_length.grid = PatternGrid::Strum(vec![Stroke::Down]);
        let mixed = to_json(&[pattern("p2"), wrong_length]).unwrap();
        assert!(matches!(state.import_patterns(&mixed), Err(FretwiseError::ImportFormat(_))));

        let mut section = SongSection::new("verse", "Verse");
        section.chords.push("C".into());
        let mut song = Song::new("Broken");
        song.add_section(section);
        let songs = to_json(&[song]).unwrap();
        assert!(matches!(state.import_songs(&songs), Err(FretwiseError::ImportFormat(_))));

        assert_eq!(state, before);
    }

    #[test]
    fn test_progression_and_song_dedupe() {
        let mut state = InstrumentState::default();
        let json = json!([
            {"name": "Pop", "tonic": "C", "chords": ["C", "G", "Am", "F"]},
            {"name": "Pop", "tonic": "G", "chords": ["G", "D", "Em", "C"]},
            {"name": "Pop", "tonic": "C", "chords": ["C", "G", "Am", "F"], "note": "copy"}
        ])
        .to_string();
        assert_eq!(state.import_progressions(&json).unwrap(), 2);
        assert_eq!(state.import_progressions(&state.export_progressions().unwrap()).unwrap(), 0);

        let mut verse = SongSection::new("verse", "Verse");
        verse.push_chord("C");
        let mut song = Song::new("Tune");
        song.add_section(verse);
        let mut renamed = song.clone();
        renamed.name = "Tune 2".into();
        let songs = to_json(&[song.clone(), song, renamed]).unwrap();
        assert_eq!(state.import_songs(&songs).unwrap(), 2);
    }
}
