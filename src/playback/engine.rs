//! Chord scheduling engine
//!
//! Turns one voiced chord and its pattern into timed [`ScheduledEvent`]s.
//! Pure and clock-free: the session supplies the start time and dispatches
//! the records, so the rules here are testable without audio.

use crate::config::Timing;
use crate::rhythm::{ArpeggioPattern, Pattern, Stroke, StrumPattern};
use crate::voicing::VoicedNote;

use super::types::{Action, ChordSchedule, PlayOptions, ScheduledEvent};

const DOWN_GAIN: (f64, f64) = (1.0, 0.75);
const UP_GAIN: (f64, f64) = (0.85, 0.60);
const BLOCK_GAIN: f64 = 1.0;
const ARPEGGIO_GAIN: f64 = 1.0;

/// Seconds the chord occupies: one beat for a block chord, a full measure
/// of the pattern otherwise.
pub fn chord_duration(pattern: &Pattern, bpm: u16) -> f64 {
    let beat = 60.0 / f64::from(bpm.max(1));
    match pattern.beats_per_measure() {
        None => beat,
        Some(beats) => beat * f64::from(beats),
    }
}

/// Sounded notes from the lowest physical string to the highest.
pub fn low_to_high(voicing: &[VoicedNote]) -> Vec<VoicedNote> {
    let mut notes = voicing.to_vec();
    notes.sort_by(|a, b| b.string_index.cmp(&a.string_index));
    notes
}

fn ramp(index: usize, count: usize, (from, to): (f64, f64)) -> f64 {
    if count <= 1 {
        return from;
    }
    from + (to - from) * index as f64 / (count - 1) as f64
}

fn play(at: f64, note: &VoicedNote, duration: f64, gain: f64) -> ScheduledEvent {
    ScheduledEvent {
        at,
        action: Action::PlayNote {
            note: note.note,
            string_index: note.string_index,
            options: PlayOptions { duration, gain },
        },
    }
}

/// Schedule one chord starting at `start` on the audio clock.
pub fn schedule_chord(
    voicing: &[VoicedNote],
    pattern: &Pattern,
    start: f64,
    bpm: u16,
    timing: &Timing,
) -> ChordSchedule {
    let duration = chord_duration(pattern, bpm);
    let events = match pattern {
        Pattern::Block => schedule_block(voicing, start, timing),
        Pattern::Strum(strum) => schedule_strum(voicing, strum, start, duration, timing),
        Pattern::Arpeggio(arpeggio) => schedule_arpeggio(voicing, arpeggio, start, duration, timing),
    };
    ChordSchedule {
        start,
        duration,
        events,
    }
}

fn schedule_block(voicing: &[VoicedNote], start: f64, timing: &Timing) -> Vec<ScheduledEvent> {
    low_to_high(voicing)
        .iter()
        .enumerate()
        .map(|(i, note)| {
            play(
                start + i as f64 * timing.block_stagger,
                note,
                timing.block_note_seconds,
                BLOCK_GAIN,
            )
        })
        .collect()
}

fn schedule_strum(
    voicing: &[VoicedNote],
    pattern: &StrumPattern,
    start: f64,
    chord_duration: f64,
    timing: &Timing,
) -> Vec<ScheduledEvent> {
    let down = low_to_high(voicing);
    let up: Vec<VoicedNote> = down.iter().rev().copied().collect();

    let mut events = Vec::new();
    let mut elapsed = 0.0;
    for beat in &pattern.beats {
        let beat_start = start + elapsed * chord_duration;
        let note_duration = timing.strum_note_ratio * beat.duration * chord_duration;
        elapsed += beat.duration;

        let (notes, stagger, gains) = match beat.stroke {
            Stroke::Rest => continue,
            Stroke::Down => (&down, timing.down_stagger, DOWN_GAIN),
            Stroke::Up => (&up, timing.up_stagger, UP_GAIN),
        };
        for (i, note) in notes.iter().enumerate() {
            events.push(play(
                beat_start + i as f64 * stagger,
                note,
                note_duration,
                ramp(i, notes.len(), gains),
            ));
        }
    }
    events
}

fn schedule_arpeggio(
    voicing: &[VoicedNote],
    pattern: &ArpeggioPattern,
    start: f64,
    chord_duration: f64,
    timing: &Timing,
) -> Vec<ScheduledEvent> {
    let order = pattern.order_for(voicing);
    if order.is_empty() {
        return Vec::new();
    }
    let step_duration = chord_duration / order.len() as f64;

    let mut events = Vec::new();
    for (step, string_index) in order.into_iter().enumerate() {
        // Muted string: the step stays silent.
        let Some(note) = voicing.iter().find(|n| n.string_index == string_index) else {
            continue;
        };
        let at = start + step as f64 * step_duration;
        events.push(play(at, note, timing.arpeggio_note_ratio * step_duration, ARPEGGIO_GAIN));
        events.push(ScheduledEvent {
            at,
            action: Action::Highlight {
                string_index,
                step,
                duration_ms: step_duration * 1000.0,
            },
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::{StrumBeat, TimeSignature};
    use crate::voicing::{Catalogue, Instrument};

    fn c_major() -> Vec<VoicedNote> {
        Catalogue::builtin(Instrument::Guitar).unwrap().voicing_for("C", 0)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_chord_duration() {
        assert!(close(chord_duration(&Pattern::Block, 120), 0.5));
        let strum = Pattern::Strum(StrumPattern {
            name: "Waltz".into(),
            bpm: 100,
            beats_per_measure: 3,
            time_signature: TimeSignature::parse("3/4").unwrap(),
            beats: vec![],
        });
        assert!(close(chord_duration(&strum, 60), 3.0));
    }

    #[test]
    fn test_block_staggers_low_to_high() {
        let schedule = schedule_chord(&c_major(), &Pattern::Block, 10.0, 120, &Timing::default());
        let notes: Vec<_> = schedule.notes().collect();
        assert_eq!(notes.len(), 5);
        assert_eq!(notes[0].1.to_string(), "C3");
        assert_eq!(notes[4].1.to_string(), "E4");
        assert!(close(notes[0].0, 10.0));
        assert!(close(notes[4].0, 10.08));
        assert!(notes.iter().all(|(_, _, o)| o.duration == 1.5));
    }

    #[test]
    fn test_strum_up_reverses_and_softens() {
        let pattern = Pattern::Strum(StrumPattern {
            name: "Two".into(),
            bpm: 100,
            beats_per_measure: 2,
            time_signature: TimeSignature::parse("2/4").unwrap(),
            beats: vec![
                StrumBeat { stroke: Stroke::Down, duration: 0.5 },
                StrumBeat { stroke: Stroke::Up, duration: 0.5 },
            ],
        });
        let schedule = schedule_chord(&c_major(), &pattern, 0.0, 60, &Timing::default());
        assert!(close(schedule.duration, 2.0));
        let notes: Vec<_> = schedule.notes().collect();
        assert_eq!(notes.len(), 10);

        let (down, up) = notes.split_at(5);
        assert_eq!(down[0].1.to_string(), "C3");
        assert!(close(down[0].2.gain, 1.0));
        assert!(close(down[4].2.gain, 0.75));
        assert!(close(down[1].0, 0.012));
        assert!(close(down[0].2.duration, 0.9));

        assert_eq!(up[0].1.to_string(), "E4");
        assert_eq!(up[4].1.to_string(), "C3");
        assert!(close(up[0].0, 1.0));
        assert!(close(up[1].0, 1.008));
        assert!(close(up[0].2.gain, 0.85));
        assert!(close(up[4].2.gain, 0.60));
    }

    #[test]
    fn test_arpeggio_skips_muted_strings() {
        let pattern = Pattern::Arpeggio(ArpeggioPattern {
            name: "Fixed".into(),
            bpm: 100,
            beats_per_measure: 4,
            time_signature: TimeSignature::default(),
            note_order: vec![5, 4, 3, 2],
        });
        let schedule = schedule_chord(&c_major(), &pattern, 0.0, 120, &Timing::default());
        let notes: Vec<_> = schedule.notes().collect();
        // string 5 is muted in x32010
        assert_eq!(notes.len(), 3);
        assert!(close(notes[0].0, 0.5));
        assert!(close(notes[0].2.duration, 0.75));
        let steps: Vec<usize> = schedule
            .events
            .iter()
            .filter_map(|e| match e.action {
                Action::Highlight { step, .. } => Some(step),
                _ => None,
            })
            .collect();
        assert_eq!(steps, [1, 2, 3]);
    }
}
