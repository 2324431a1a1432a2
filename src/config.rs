//! Engine configuration
//!
//! Loaded from YAML with kebab-case keys. Every key is optional:
//!
//! ```yaml
//! instrument: ukulele
//! bpm: 90
//! loop: true
//! allow-borrowed: true
//! down-stagger-ms: 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FretwiseError, Result};
use crate::voicing::Instrument;

pub const MIN_BPM: u16 = 20;
pub const MAX_BPM: u16 = 300;

/// Raw configuration for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawConfig {
    pub instrument: Option<String>,
    pub bpm: Option<u16>,
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
    pub allow_borrowed: Option<bool>,
    pub block_stagger_ms: Option<f64>,
    pub down_stagger_ms: Option<f64>,
    pub up_stagger_ms: Option<f64>,
    pub block_note_seconds: Option<f64>,
    pub strum_note_ratio: Option<f64>,
    pub arpeggio_note_ratio: Option<f64>,
    pub midi_strum_offset_ticks: Option<u32>,
    pub store_debounce_ms: Option<u64>,
}

/// Playback timing constants, in seconds or as fractions of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Delay between strings of a block chord.
    pub block_stagger: f64,
    pub down_stagger: f64,
    pub up_stagger: f64,
    /// Sample length of a block chord note.
    pub block_note_seconds: f64,
    /// Strum note length as a fraction of its beat.
    pub strum_note_ratio: f64,
    /// Arpeggio sample length as a multiple of its step.
    pub arpeggio_note_ratio: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            block_stagger: 0.020,
            down_stagger: 0.012,
            up_stagger: 0.008,
            block_note_seconds: 1.5,
            strum_note_ratio: 0.9,
            arpeggio_note_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub instrument: Instrument,
    pub bpm: u16,
    pub looping: bool,
    pub allow_borrowed: bool,
    pub timing: Timing,
    pub midi_strum_offset_ticks: u32,
    pub store_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            instrument: Instrument::Guitar,
            bpm: 100,
            looping: false,
            allow_borrowed: false,
            timing: Timing::default(),
            midi_strum_offset_ticks: 5,
            store_debounce: Duration::from_millis(2000),
        }
    }
}

fn non_negative(name: &str, value: Option<f64>, default: f64) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(FretwiseError::Config(format!("{} must be non-negative, got {}", name, v))),
        None => Ok(default),
    }
}

fn positive(name: &str, value: Option<f64>, default: f64) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(FretwiseError::Config(format!("{} must be positive, got {}", name, v))),
        None => Ok(default),
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| FretwiseError::Config(e.to_string()))?
        };
        Self::from_raw(raw)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FretwiseError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let defaults = EngineConfig::default();
        let d = defaults.timing;

        let instrument = match &raw.instrument {
            Some(name) => Instrument::parse(name)
                .map_err(|_| FretwiseError::Config(format!("Invalid instrument: {}", name)))?,
            None => defaults.instrument,
        };

        let bpm = raw.bpm.unwrap_or(defaults.bpm);
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(FretwiseError::Config(format!(
                "bpm must be between {} and {}, got {}",
                MIN_BPM, MAX_BPM, bpm
            )));
        }

        let ms = |v: Option<f64>| v.map(|ms| ms / 1000.0);
        let timing = Timing {
            block_stagger: non_negative("block-stagger-ms", ms(raw.block_stagger_ms), d.block_stagger)?,
            down_stagger: non_negative("down-stagger-ms", ms(raw.down_stagger_ms), d.down_stagger)?,
            up_stagger: non_negative("up-stagger-ms", ms(raw.up_stagger_ms), d.up_stagger)?,
            block_note_seconds: positive("block-note-seconds", raw.block_note_seconds, d.block_note_seconds)?,
            strum_note_ratio: positive("strum-note-ratio", raw.strum_note_ratio, d.strum_note_ratio)?,
            arpeggio_note_ratio: positive("arpeggio-note-ratio", raw.arpeggio_note_ratio, d.arpeggio_note_ratio)?,
        };

        Ok(EngineConfig {
            instrument,
            bpm,
            looping: raw.looping.unwrap_or(defaults.looping),
            allow_borrowed: raw.allow_borrowed.unwrap_or(defaults.allow_borrowed),
            timing,
            midi_strum_offset_ticks: raw.midi_strum_offset_ticks.unwrap_or(defaults.midi_strum_offset_ticks),
            store_debounce: raw
                .store_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_debounce),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(EngineConfig::from_yaml("").unwrap(), EngineConfig::default());
        assert_eq!(EngineConfig::from_yaml("  \n").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_yaml(
            "instrument: ukulele\nbpm: 90\nloop: true\ndown-stagger-ms: 10\nstore-debounce-ms: 500\n",
        )
        .unwrap();
        assert_eq!(config.instrument, Instrument::Ukulele);
        assert_eq!(config.bpm, 90);
        assert!(config.looping);
        assert!(!config.allow_borrowed);
        assert!((config.timing.down_stagger - 0.010).abs() < 1e-12);
        assert_eq!(config.timing.up_stagger, 0.008);
        assert_eq!(config.store_debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_values() {
        for yaml in [
            "bpm: 5",
            "bpm: 400",
            "instrument: banjo",
            "strum-note-ratio: 0",
            "up-stagger-ms: -1",
            "tempo: 120",
            "bpm: [1, 2]",
        ] {
            let err = EngineConfig::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, FretwiseError::Config(_)), "{}: {:?}", yaml, err);
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fretwise.yaml");
        std::fs::write(&path, "allow-borrowed: true\n").unwrap();
        assert!(EngineConfig::load(&path).unwrap().allow_borrowed);
        assert!(EngineConfig::load(&dir.path().join("missing.yaml")).is_err());
    }
}
