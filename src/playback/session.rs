//! Playback sessions
//!
//! [`PlaybackController`] owns the audio player, the clock, and the session
//! state. A session walks its items one chord at a time: check the cancel
//! token, focus the chord, schedule its notes on the audio clock, then wait
//! out the chord on the wall clock.

use crate::config::{EngineConfig, Timing, MAX_BPM, MIN_BPM};
use crate::error::{FretwiseError, Result};
use crate::note::Note;
use crate::progression::{Song, SongSection};
use crate::rhythm::PatternLibrary;
use crate::voicing::Catalogue;

use super::engine::schedule_chord;
use super::types::{
    Action, CancelToken, ChordSchedule, PlayOptions, PlaybackItem, SessionOutcome, SessionState,
};

/// The sampled-instrument player.
pub trait AudioPlayer {
    /// Set up the audio context. Called at most once per session, lazily.
    fn init(&mut self) -> Result<()>;
    fn is_ready(&self) -> bool;
    /// Audio clock, seconds, monotonic.
    fn current_time(&self) -> f64;
    fn play(&mut self, note: Note, at: f64, options: PlayOptions);
}

/// Wall-clock waiting between chords.
pub trait Clock {
    fn sleep(&mut self, seconds: f64);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, seconds: f64) {
        if seconds > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
        }
    }
}

/// UI callbacks. Every method defaults to doing nothing.
pub trait PlaybackObserver {
    /// Called before any note of the item is scheduled.
    fn on_focus(&mut self, _position: usize, _item: &PlaybackItem) {}
    /// An arpeggio step; `delay_ms` is its offset from the chord start.
    fn on_note_play(&mut self, _string_index: usize, _step: usize, _duration_ms: f64, _delay_ms: f64) {}
    fn on_section_begin(&mut self, _section: &SongSection) {}
    fn on_section_end(&mut self, _section: &SongSection) {}
    fn on_finish(&mut self, _outcome: SessionOutcome) {}
}

impl PlaybackObserver for () {}

/// Supplies the items to play. Re-read at the start of every loop pass so
/// edits made while looping are heard on the next pass.
pub trait ProgressionSource {
    fn items(&self) -> Vec<PlaybackItem>;
}

impl ProgressionSource for Vec<PlaybackItem> {
    fn items(&self) -> Vec<PlaybackItem> {
        self.clone()
    }
}

/// A source backed by a closure, e.g. a view onto a live progression tree.
pub struct LiveProgression<F>(pub F);

impl<F: Fn() -> Vec<PlaybackItem>> ProgressionSource for LiveProgression<F> {
    fn items(&self) -> Vec<PlaybackItem> {
        (self.0)()
    }
}

#[derive(Debug, Default)]
struct Pass {
    scheduled: usize,
    cancelled: bool,
}

pub struct PlaybackController<A: AudioPlayer, C: Clock> {
    audio: A,
    clock: C,
    catalogue: Catalogue,
    library: PatternLibrary,
    timing: Timing,
    bpm: u16,
    looping: bool,
    state: SessionState,
    active: Option<CancelToken>,
}

impl<A: AudioPlayer, C: Clock> PlaybackController<A, C> {
    pub fn new(audio: A, clock: C, catalogue: Catalogue, library: PatternLibrary, config: &EngineConfig) -> Self {
        PlaybackController {
            audio,
            clock,
            catalogue,
            library,
            timing: config.timing,
            bpm: config.bpm,
            looping: config.looping,
            state: SessionState::Idle,
            active: None,
        }
    }

    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// Takes effect from the next chord; clamped to the supported range.
    pub fn set_bpm(&mut self, bpm: u16) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn library_mut(&mut self) -> &mut PatternLibrary {
        &mut self.library
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Cancel the current session, if any. It stops at the next chord boundary.
    pub fn cancel(&mut self) {
        if let Some(token) = &self.active {
            token.cancel();
            if self.state == SessionState::Playing {
                self.state = SessionState::Cancelling;
            }
        }
    }

    fn begin(&mut self, token: &CancelToken) -> Result<()> {
        if let Some(previous) = self.active.take() {
            if !previous.same_as(token) {
                previous.cancel();
            }
        }
        if !self.audio.is_ready() {
            let init = self.audio.init().and_then(|_| {
                if self.audio.is_ready() {
                    Ok(())
                } else {
                    Err(FretwiseError::AudioUnavailable("player did not become ready".into()))
                }
            });
            if let Err(e) = init {
                self.state = SessionState::Idle;
                tracing::warn!("audio init failed: {}", e);
                return Err(match e {
                    FretwiseError::AudioUnavailable(_) => e,
                    other => FretwiseError::AudioUnavailable(other.to_string()),
                });
            }
        }
        self.active = Some(token.clone());
        self.state = SessionState::Playing;
        tracing::info!("playback session started at {} bpm", self.bpm);
        Ok(())
    }

    /// Completed sessions report through the observer, then settle at idle.
    fn finish(&mut self, outcome: SessionOutcome, observer: &mut dyn PlaybackObserver) {
        if outcome == SessionOutcome::Completed {
            self.state = SessionState::Completed;
        }
        tracing::info!("playback session finished: {:?}", outcome);
        observer.on_finish(outcome);
        self.state = SessionState::Idle;
    }

    fn dispatch(&mut self, schedule: &ChordSchedule, observer: &mut dyn PlaybackObserver) {
        for event in &schedule.events {
            match &event.action {
                Action::PlayNote { note, options, .. } => self.audio.play(*note, event.at, *options),
                Action::Highlight {
                    string_index,
                    step,
                    duration_ms,
                } => {
                    let delay_ms = ((event.at - schedule.start) * 1000.0).max(0.0);
                    observer.on_note_play(*string_index, *step, *duration_ms, delay_ms);
                }
            }
        }
    }

    fn play_items(
        &mut self,
        items: &[PlaybackItem],
        observer: &mut dyn PlaybackObserver,
        token: &CancelToken,
    ) -> Pass {
        let mut pass = Pass::default();
        for (position, item) in items.iter().enumerate() {
            if token.is_cancelled() {
                pass.cancelled = true;
                return pass;
            }
            observer.on_focus(position, item);

            let pattern = self.library.resolve(&item.pattern);
            let voicing = self.catalogue.voicing_for(&item.chord, item.voicing_index);
            if voicing.is_empty() {
                tracing::warn!("no voicing for '{}', skipping", item.chord);
                continue;
            }

            let start = self.audio.current_time();
            let schedule = schedule_chord(&voicing, &pattern, start, self.bpm, &self.timing);
            tracing::debug!(
                "chord {} '{}' at {:.3}s: {} events over {:.3}s",
                position,
                item.chord,
                start,
                schedule.events.len(),
                schedule.duration
            );
            self.dispatch(&schedule, observer);
            pass.scheduled += 1;
            self.clock.sleep(schedule.duration);
        }
        pass.cancelled = token.is_cancelled();
        pass
    }

    /// Play a progression until it ends, or until cancelled when looping.
    ///
    /// Starting a session cancels the previous session's token.
    pub fn play_progression(
        &mut self,
        source: &dyn ProgressionSource,
        observer: &mut dyn PlaybackObserver,
        token: &CancelToken,
    ) -> Result<SessionOutcome> {
        self.begin(token)?;
        let outcome = loop {
            let items = source.items();
            let pass = self.play_items(&items, observer, token);
            if pass.cancelled {
                self.state = SessionState::Cancelling;
                break SessionOutcome::Cancelled;
            }
            if !self.looping {
                break SessionOutcome::Completed;
            }
            if pass.scheduled == 0 {
                tracing::warn!("nothing playable in looped progression, stopping");
                break SessionOutcome::Completed;
            }
        };
        self.finish(outcome, observer);
        Ok(outcome)
    }

    /// Play a song's sections in structure order, marking each section.
    pub fn play_song(
        &mut self,
        song: &Song,
        observer: &mut dyn PlaybackObserver,
        token: &CancelToken,
    ) -> Result<SessionOutcome> {
        self.begin(token)?;
        let sections = song.play_order();
        let outcome = 'session: loop {
            let mut scheduled = 0;
            for section in &sections {
                if token.is_cancelled() {
                    self.state = SessionState::Cancelling;
                    break 'session SessionOutcome::Cancelled;
                }
                observer.on_section_begin(section);
                let pass = self.play_items(&section.items(), observer, token);
                observer.on_section_end(section);
                scheduled += pass.scheduled;
                if pass.cancelled {
                    self.state = SessionState::Cancelling;
                    break 'session SessionOutcome::Cancelled;
                }
            }
            if !self.looping || scheduled == 0 {
                break SessionOutcome::Completed;
            }
        };
        self.finish(outcome, observer);
        Ok(outcome)
    }
}
