//! Playback type definitions
//!
//! Items to play, the schedule records the engine emits, and session state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::note::Note;
use crate::progression::NodeId;
use crate::rhythm::PatternRef;

/// One chord to play.
///
/// # Fields
/// - `chord`: chord symbol, looked up in the voicing catalogue
/// - `voicing_index`: which catalogue voicing (out of range falls back to the first)
/// - `pattern`: effective pattern, already resolved through ancestors
/// - `node`: the progression node it came from, for UI focus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackItem {
    pub chord: String,
    pub voicing_index: usize,
    pub pattern: PatternRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

impl PlaybackItem {
    pub fn new(chord: &str, pattern: PatternRef) -> Self {
        PlaybackItem {
            chord: chord.to_string(),
            voicing_index: 0,
            pattern,
            node: None,
        }
    }

    pub fn block(chord: &str) -> Self {
        Self::new(chord, PatternRef::Block)
    }
}

/// Sample options for one note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayOptions {
    /// Sample length in seconds.
    pub duration: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Start a sample on the audio clock.
    #[serde(rename_all = "camelCase")]
    PlayNote {
        note: Note,
        string_index: usize,
        options: PlayOptions,
    },
    /// Highlight a string in the UI for one arpeggio step.
    #[serde(rename_all = "camelCase")]
    Highlight {
        string_index: usize,
        step: usize,
        duration_ms: f64,
    },
}

/// An action at an audio-clock time (seconds).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub at: f64,
    pub action: Action,
}

/// Everything one chord schedules, plus how long to wait before the next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordSchedule {
    pub start: f64,
    pub duration: f64,
    pub events: Vec<ScheduledEvent>,
}

impl ChordSchedule {
    pub fn notes(&self) -> impl Iterator<Item = (f64, &Note, &PlayOptions)> {
        self.events.iter().filter_map(|e| match &e.action {
            Action::PlayNote { note, options, .. } => Some((e.at, note, options)),
            Action::Highlight { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Playing,
    Cancelling,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Cancelled,
}

/// Cooperative cancellation flag shared between the UI and a session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
