//! Standard MIDI file export
//!
//! A progression is written as a format-0 file with one track at 480 ticks
//! per quarter note. Each chord is laid out with the same ordering rules as
//! live playback: block chords sound together, strums step through the
//! strings with a small tick offset, arpeggios divide the measure evenly.

use crate::chord::parse_chord;
use crate::config::{EngineConfig, MAX_BPM, MIN_BPM};
use crate::error::{FretwiseError, Result};
use crate::playback::{low_to_high, PlaybackItem};
use crate::rhythm::{Pattern, PatternLibrary, Stroke};
use crate::voicing::{Catalogue, VoicedNote};

pub const TICKS_PER_QUARTER: u16 = 480;

const VELOCITY: u8 = 100;
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const BLOCK_BEATS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiOptions {
    pub bpm: u16,
    /// Ticks between successive strings of a strum.
    pub strum_offset_ticks: u32,
}

impl Default for MidiOptions {
    fn default() -> Self {
        MidiOptions {
            bpm: 100,
            strum_offset_ticks: 5,
        }
    }
}

impl MidiOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        MidiOptions {
            bpm: config.bpm.clamp(MIN_BPM, MAX_BPM),
            strum_offset_ticks: config.midi_strum_offset_ticks,
        }
    }

    /// Override the tempo, rejecting values outside the supported range.
    pub fn with_bpm(self, bpm: u16) -> Result<Self> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(FretwiseError::Config(format!(
                "bpm must be between {} and {}, got {}",
                MIN_BPM, MAX_BPM, bpm
            )));
        }
        Ok(MidiOptions { bpm, ..self })
    }
}

/// A chord with its sounded notes and resolved pattern. Empty `notes`
/// writes silence for the chord's length.
#[derive(Debug, Clone, PartialEq)]
pub struct RealisedChord {
    pub notes: Vec<VoicedNote>,
    pub pattern: Pattern,
}

/// Ticks a chord occupies under `pattern`. A block chord holds a whole
/// 4/4 measure.
pub fn chord_ticks(pattern: &Pattern) -> u32 {
    let beats = pattern
        .beats_per_measure()
        .map(u32::from)
        .unwrap_or(BLOCK_BEATS);
    u32::from(TICKS_PER_QUARTER) * beats
}

/// Resolve voicings and patterns for each item.
pub fn realise(items: &[PlaybackItem], catalogue: &Catalogue, library: &PatternLibrary) -> Vec<RealisedChord> {
    items
        .iter()
        .map(|item| {
            let pattern = library.resolve(&item.pattern);
            let notes = match parse_chord(&item.chord) {
                Ok(_) => catalogue.voicing_for(&item.chord, item.voicing_index),
                Err(e) => {
                    tracing::warn!("writing '{}' as silence: {}", item.chord, e);
                    Vec::new()
                }
            };
            if notes.is_empty() {
                tracing::debug!("no voicing for '{}', writing silence", item.chord);
            }
            RealisedChord { notes, pattern }
        })
        .collect()
}

/// Export a progression as MIDI bytes.
pub fn export_midi(
    items: &[PlaybackItem],
    catalogue: &Catalogue,
    library: &PatternLibrary,
    options: &MidiOptions,
) -> Vec<u8> {
    export_realised(&realise(items, catalogue, library), options)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    // offs sort ahead of ons at the same tick
    Off,
    On,
}

#[derive(Debug, Clone, Copy)]
struct TimedEvent {
    tick: u32,
    kind: Kind,
    pitch: u8,
}

fn note(events: &mut Vec<TimedEvent>, pitch: u8, on: u32, off: u32) {
    events.push(TimedEvent { tick: on, kind: Kind::On, pitch });
    events.push(TimedEvent { tick: off, kind: Kind::Off, pitch });
}

fn lay_out(chord: &RealisedChord, start: u32, options: &MidiOptions, events: &mut Vec<TimedEvent>) {
    let length = chord_ticks(&chord.pattern);
    if chord.notes.is_empty() {
        return;
    }
    match &chord.pattern {
        Pattern::Block => {
            for n in low_to_high(&chord.notes) {
                note(events, n.note.midi(), start, start + length);
            }
        }
        Pattern::Strum(strum) => {
            let down = low_to_high(&chord.notes);
            let up: Vec<VoicedNote> = down.iter().rev().copied().collect();
            let mut elapsed = 0.0;
            for beat in &strum.beats {
                let beat_start = start + (elapsed * f64::from(length)).round().min(f64::from(length)) as u32;
                elapsed += beat.duration;
                let beat_end = start + (elapsed * f64::from(length)).round().min(f64::from(length)) as u32;
                let notes = match beat.stroke {
                    Stroke::Rest => continue,
                    Stroke::Down => &down,
                    Stroke::Up => &up,
                };
                let span = beat_end.saturating_sub(beat_start);
                if span == 0 {
                    continue;
                }
                for (i, n) in notes.iter().enumerate() {
                    let offset = (i as u32 * options.strum_offset_ticks).min(span.saturating_sub(1));
                    note(events, n.note.midi(), beat_start + offset, beat_end);
                }
            }
        }
        Pattern::Arpeggio(arpeggio) => {
            let order = arpeggio.order_for(&chord.notes);
            if order.is_empty() {
                return;
            }
            let step = length / order.len() as u32;
            for (i, string_index) in order.into_iter().enumerate() {
                let Some(n) = chord.notes.iter().find(|n| n.string_index == string_index) else {
                    continue;
                };
                let on = start + i as u32 * step;
                note(events, n.note.midi(), on, on + step);
            }
        }
    }
}

/// Serialise realised chords. The same input always yields the same bytes.
pub fn export_realised(chords: &[RealisedChord], options: &MidiOptions) -> Vec<u8> {
    let mut events = Vec::new();
    let mut cursor = 0u32;
    for chord in chords {
        lay_out(chord, cursor, options, &mut events);
        cursor += chord_ticks(&chord.pattern);
    }
    events.sort_by_key(|e| (e.tick, e.kind));

    let track = build_track(&events, cursor, options.bpm);
    tracing::debug!(
        "midi export: {} chords, {} events, {} ticks",
        chords.len(),
        events.len(),
        cursor
    );

    let mut out = Vec::with_capacity(22 + track.len());
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // format 0
    out.extend_from_slice(&1u16.to_be_bytes()); // 1 track
    out.extend_from_slice(&TICKS_PER_QUARTER.to_be_bytes());

    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track.len() as u32).to_be_bytes());
    out.extend_from_slice(&track);
    out
}

fn build_track(events: &[TimedEvent], end: u32, bpm: u16) -> Vec<u8> {
    let mut t = Vec::new();

    // the tempo meta holds 24 bits
    let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    let micros = (60_000_000.0 / f64::from(bpm)).round() as u32;
    t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
    t.extend_from_slice(&micros.to_be_bytes()[1..]);

    let mut last = 0;
    for event in events {
        write_vlq(&mut t, event.tick - last);
        last = event.tick;
        match event.kind {
            Kind::On => t.extend_from_slice(&[NOTE_ON, event.pitch, VELOCITY]),
            Kind::Off => t.extend_from_slice(&[NOTE_OFF, event.pitch, 0x00]),
        }
    }

    write_vlq(&mut t, end.saturating_sub(last));
    t.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    t
}

/// Write a MIDI variable-length quantity.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut i = bytes.len() - 1;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) | 0x80) as u8;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}
