//! # Playback Module
//!
//! Audition progressions and songs on a sampled instrument.
//!
//! ## Purpose
//! The scheduler is cooperative and single-threaded. For each chord it
//! front-loads every note onto the audio clock, then waits out the chord on
//! the wall clock before moving on. Cancellation is checked at chord
//! boundaries, so samples already scheduled still sound.
//!
//! ## Sub-modules
//! - `types` - PlaybackItem, ScheduledEvent, CancelToken, session state
//! - `engine` - Per-chord scheduling rules (block, strum, arpeggio)
//! - `session` - PlaybackController, audio/clock/observer traits
//!
//! ## Scheduling Rules
//!
//! ### Block
//! All notes at once with a 20 ms pick stagger, lowest string first; each
//! sample lasts 1.5 s. The chord occupies one beat.
//!
//! ### Strum
//! Each beat of the pattern is a fraction of the measure. Down strokes run
//! low to high with a 12 ms stagger and gain falling from 1.00 to 0.75; up
//! strokes run high to low with an 8 ms stagger, gain 0.85 to 0.60. Notes
//! last 90% of their beat. Rests only advance time.
//!
//! ### Arpeggio
//! The measure divides evenly among the pattern's steps. A step whose string
//! is muted stays silent. Samples last 1.5 steps, and each sounded step
//! fires [`PlaybackObserver::on_note_play`] for UI highlighting.
//!
//! ## Example
//! ```rust
//! use fretwise::playback::{chord_duration, schedule_chord, PlaybackItem};
//! use fretwise::config::Timing;
//! use fretwise::rhythm::Pattern;
//! use fretwise::{Catalogue, Instrument};
//!
//! let guitar = Catalogue::builtin(Instrument::Guitar).unwrap();
//! let voicing = guitar.voicing_for("G", 0);
//! let schedule = schedule_chord(&voicing, &Pattern::Block, 0.0, 120, &Timing::default());
//!
//! assert_eq!(schedule.notes().count(), 6);
//! assert_eq!(chord_duration(&Pattern::Block, 120), 0.5);
//! # let _ = PlaybackItem::block("G");
//! ```

mod engine;
mod session;
mod types;

#[cfg(test)]
mod tests;

pub use engine::{chord_duration, low_to_high, schedule_chord};
pub use session::{
    AudioPlayer, Clock, LiveProgression, PlaybackController, PlaybackObserver, ProgressionSource,
    SystemClock,
};
pub use types::{
    Action, CancelToken, ChordSchedule, PlayOptions, PlaybackItem, ScheduledEvent, SessionOutcome,
    SessionState,
};
