use super::*;
use crate::config::EngineConfig;
use crate::error::{FretwiseError, Result};
use crate::note::Note;
use crate::progression::{ProgressionTree, Song, SongSection};
use crate::rhythm::{CustomPattern, PatternGrid, PatternLibrary, PatternRef, Stroke, TimeSignature};
use crate::voicing::{Catalogue, Instrument};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Default)]
struct FakeAudio {
    now: Rc<Cell<f64>>,
    ready: bool,
    fail_init: bool,
    init_calls: usize,
    played: Vec<(Note, f64, PlayOptions)>,
}

impl AudioPlayer for FakeAudio {
    fn init(&mut self) -> Result<()> {
        self.init_calls += 1;
        if self.fail_init {
            return Err(FretwiseError::AudioUnavailable("no output device".into()));
        }
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn current_time(&self) -> f64 {
        self.now.get()
    }

    fn play(&mut self, note: Note, at: f64, options: PlayOptions) {
        self.played.push((note, at, options));
    }
}

/// Advances the fake audio clock instead of sleeping.
struct FakeClock {
    now: Rc<Cell<f64>>,
    sleeps: Vec<f64>,
}

impl Clock for FakeClock {
    fn sleep(&mut self, seconds: f64) {
        self.sleeps.push(seconds);
        self.now.set(self.now.get() + seconds);
    }
}

#[derive(Default)]
struct Recorder {
    focused: Vec<String>,
    highlights: Vec<(usize, usize, f64, f64)>,
    sections: Vec<String>,
    finished: Option<SessionOutcome>,
    cancel_on_focus: Option<(usize, CancelToken)>,
}

impl PlaybackObserver for Recorder {
    fn on_focus(&mut self, _position: usize, item: &PlaybackItem) {
        self.focused.push(item.chord.clone());
        if let Some((count, token)) = &self.cancel_on_focus {
            if self.focused.len() == *count {
                token.cancel();
            }
        }
    }

    fn on_note_play(&mut self, string_index: usize, step: usize, duration_ms: f64, delay_ms: f64) {
        self.highlights.push((string_index, step, duration_ms, delay_ms));
    }

    fn on_section_begin(&mut self, section: &SongSection) {
        self.sections.push(format!("begin {}", section.id));
    }

    fn on_section_end(&mut self, section: &SongSection) {
        self.sections.push(format!("end {}", section.id));
    }

    fn on_finish(&mut self, outcome: SessionOutcome) {
        self.finished = Some(outcome);
    }
}

fn controller_with(audio: FakeAudio, bpm: u16) -> PlaybackController<FakeAudio, FakeClock> {
    let clock = FakeClock {
        now: audio.now.clone(),
        sleeps: Vec::new(),
    };
    let config = EngineConfig {
        bpm,
        ..EngineConfig::default()
    };
    PlaybackController::new(
        audio,
        clock,
        Catalogue::builtin(Instrument::Guitar).unwrap(),
        PatternLibrary::presets(Instrument::Guitar),
        &config,
    )
}

fn controller(bpm: u16) -> PlaybackController<FakeAudio, FakeClock> {
    controller_with(FakeAudio::default(), bpm)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_block_progression_waits_one_beat_per_chord() {
    let mut player = controller(120);
    let items = vec![PlaybackItem::block("C"), PlaybackItem::block("G")];
    let mut recorder = Recorder::default();

    let outcome = player
        .play_progression(&items, &mut recorder, &CancelToken::new())
        .unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    // completed, then back to idle
    assert_eq!(player.state(), SessionState::Idle);
    assert_eq!(recorder.focused, ["C", "G"]);
    assert_eq!(recorder.finished, Some(SessionOutcome::Completed));
    assert_eq!(player.clock().sleeps, [0.5, 0.5]);

    let played = &player.audio().played;
    assert_eq!(played.len(), 11);
    // G starts when C's beat is over
    assert!(close(played[5].1, 0.5));
    assert_eq!(played[5].0.to_string(), "G2");
}

#[test]
fn test_scalable_arpeggio_on_partial_voicing() {
    let mut player = controller(120);
    let items = vec![PlaybackItem::new("Dm", PatternRef::Arpeggio("arp-4-4-ascending".into()))];
    let mut recorder = Recorder::default();

    player
        .play_progression(&items, &mut recorder, &CancelToken::new())
        .unwrap();

    let strings: Vec<usize> = recorder.highlights.iter().map(|h| h.0).collect();
    assert_eq!(strings, [3, 2, 1, 0]);
    let delays: Vec<f64> = recorder.highlights.iter().map(|h| h.3).collect();
    assert_eq!(delays, [0.0, 500.0, 1000.0, 1500.0]);
    assert!(recorder.highlights.iter().all(|h| close(h.2, 500.0)));

    let notes: Vec<String> = player.audio().played.iter().map(|p| p.0.to_string()).collect();
    assert_eq!(notes, ["D3", "A3", "D4", "F4"]);
    assert!(close(player.audio().played[0].2.duration, 0.75));
    assert_eq!(player.clock().sleeps, [2.0]);
}

#[test]
fn test_custom_strum_pattern() {
    let mut player = controller(60);
    player
        .library_mut()
        .insert_custom(&CustomPattern {
            id: "mine".into(),
            name: "Mine".into(),
            time_signature: TimeSignature::parse("2/4").unwrap(),
            bpm: 100,
            grid: PatternGrid::Strum(vec![Stroke::Down, Stroke::Rest, Stroke::Up, Stroke::Rest]),
        })
        .unwrap();
    let items = vec![PlaybackItem::new("Em", PatternRef::Strum("mine".into()))];
    player.play_progression(&items, &mut (), &CancelToken::new()).unwrap();

    let played = &player.audio().played;
    assert_eq!(played.len(), 12);
    assert_eq!(played[0].0.to_string(), "E2");
    assert_eq!(played[6].0.to_string(), "E4");
    assert!(close(played[6].1, 1.0));
    assert!(close(played[0].2.duration, 0.45));
    assert_eq!(player.clock().sleeps, [2.0]);
}

#[test]
fn test_unknown_pattern_plays_block() {
    let mut player = controller(120);
    let items = vec![PlaybackItem::new("C", PatternRef::Strum("missing".into()))];
    player.play_progression(&items, &mut (), &CancelToken::new()).unwrap();
    assert_eq!(player.clock().sleeps, [0.5]);
    assert!(player.audio().played.iter().all(|p| p.2.duration == 1.5));
}

#[test]
fn test_cancel_stops_at_next_chord() {
    let mut player = controller(120);
    let token = CancelToken::new();
    let items: Vec<PlaybackItem> = ["C", "G", "Am", "F"].iter().map(|c| PlaybackItem::block(c)).collect();
    let mut recorder = Recorder {
        cancel_on_focus: Some((2, token.clone())),
        ..Recorder::default()
    };

    let outcome = player.play_progression(&items, &mut recorder, &token).unwrap();

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(player.state(), SessionState::Idle);
    // the chord in focus when cancelled still sounds
    assert_eq!(recorder.focused, ["C", "G"]);
    assert_eq!(player.clock().sleeps.len(), 2);
    assert_eq!(recorder.finished, Some(SessionOutcome::Cancelled));
}

#[test]
fn test_loop_rederives_scalable_order_each_pass() {
    let mut player = controller(120);
    player.set_looping(true);
    let token = CancelToken::new();
    let voicing = Rc::new(Cell::new(0usize));

    let source_voicing = voicing.clone();
    let source = LiveProgression(move || {
        let mut item = PlaybackItem::new("C", PatternRef::Arpeggio("arp-4-4-ascending".into()));
        item.voicing_index = source_voicing.get();
        vec![item]
    });

    struct SwitchVoicing {
        voicing: Rc<Cell<usize>>,
        token: CancelToken,
        passes: usize,
        highlights: Rc<RefCell<Vec<usize>>>,
    }

    impl PlaybackObserver for SwitchVoicing {
        fn on_focus(&mut self, _position: usize, _item: &PlaybackItem) {
            self.passes += 1;
            match self.passes {
                1 => self.voicing.set(2),
                2 => self.token.cancel(),
                _ => {}
            }
        }

        fn on_note_play(&mut self, string_index: usize, _step: usize, _duration_ms: f64, _delay_ms: f64) {
            self.highlights.borrow_mut().push(string_index);
        }
    }

    let highlights = Rc::new(RefCell::new(Vec::new()));
    let mut observer = SwitchVoicing {
        voicing: voicing.clone(),
        token: token.clone(),
        passes: 0,
        highlights: highlights.clone(),
    };

    let outcome = player.play_progression(&source, &mut observer, &token).unwrap();

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(observer.passes, 2);
    assert_eq!(*highlights.borrow(), [4, 3, 2, 1, 0, 5, 4, 3, 2, 1, 0]);
}

#[test]
fn test_audio_init_failure_aborts_session() {
    let audio = FakeAudio {
        fail_init: true,
        ..FakeAudio::default()
    };
    let mut player = controller_with(audio, 120);
    let mut recorder = Recorder::default();
    let items = vec![PlaybackItem::block("C")];

    let err = player
        .play_progression(&items, &mut recorder, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, FretwiseError::AudioUnavailable(_)));
    assert_eq!(player.audio().init_calls, 1);
    assert!(player.audio().played.is_empty());
    assert!(recorder.focused.is_empty());
    assert_eq!(player.state(), SessionState::Idle);
}

#[test]
fn test_audio_initialised_lazily_once() {
    let mut player = controller(120);
    let items = vec![PlaybackItem::block("C")];
    player.play_progression(&items, &mut (), &CancelToken::new()).unwrap();
    player.play_progression(&items, &mut (), &CancelToken::new()).unwrap();
    assert_eq!(player.audio().init_calls, 1);
}

#[test]
fn test_new_session_cancels_previous_token() {
    let mut player = controller(120);
    let items = vec![PlaybackItem::block("C")];
    let first = CancelToken::new();
    player.play_progression(&items, &mut (), &first).unwrap();
    assert!(!first.is_cancelled());

    let second = CancelToken::new();
    player.play_progression(&items, &mut (), &second).unwrap();
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
}

#[test]
fn test_unvoiced_chord_is_skipped_but_focused() {
    let mut player = controller(120);
    let items = vec![PlaybackItem::block("Cadd11"), PlaybackItem::block("C")];
    let mut recorder = Recorder::default();
    player
        .play_progression(&items, &mut recorder, &CancelToken::new())
        .unwrap();
    assert_eq!(recorder.focused, ["Cadd11", "C"]);
    assert_eq!(player.clock().sleeps, [0.5]);
}

#[test]
fn test_tree_items_inherit_patterns() {
    let mut tree = ProgressionTree::new();
    let c = tree.add_root("C");
    let am = tree.add_child(c, "Am").unwrap();
    tree.set_strum_pattern(c, Some("strum-4-4-down-strums".into()));
    let items = tree.playback_items(&tree.path_to(am));

    let mut player = controller(120);
    player.play_progression(&items, &mut (), &CancelToken::new()).unwrap();
    assert_eq!(player.clock().sleeps, [2.0, 2.0]);
    // four down strokes on five and five strings
    assert_eq!(player.audio().played.len(), 40);
}

#[test]
fn test_song_marks_sections() {
    let mut verse = SongSection::new("v", "Verse");
    verse.push_chord("C");
    verse.push_chord("G");
    let mut chorus = SongSection::new("c", "Chorus");
    chorus.push_chord("F");
    let mut song = Song::new("Tune");
    song.add_section(verse);
    song.add_section(chorus);
    song.insert_in_structure(2, "v");

    let mut player = controller(120);
    let mut recorder = Recorder::default();
    let outcome = player.play_song(&song, &mut recorder, &CancelToken::new()).unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(recorder.focused, ["C", "G", "F", "C", "G"]);
    assert_eq!(
        recorder.sections,
        ["begin v", "end v", "begin c", "end c", "begin v", "end v"]
    );
}

#[test]
fn test_song_cancel_mid_section() {
    let mut verse = SongSection::new("v", "Verse");
    for chord in ["C", "G", "Am"] {
        verse.push_chord(chord);
    }
    let mut song = Song::new("Tune");
    song.add_section(verse.clone());
    let mut bridge = verse;
    bridge.id = "b".into();
    song.add_section(bridge);

    let token = CancelToken::new();
    let mut recorder = Recorder {
        cancel_on_focus: Some((2, token.clone())),
        ..Recorder::default()
    };
    let mut player = controller(120);
    player.set_looping(true);
    let outcome = player.play_song(&song, &mut recorder, &token).unwrap();

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(recorder.focused, ["C", "G"]);
    assert_eq!(recorder.sections, ["begin v", "end v"]);
}

#[test]
fn test_bpm_is_clamped() {
    let mut player = controller(120);
    player.set_bpm(1000);
    assert_eq!(player.bpm(), 300);
    player.set_bpm(1);
    assert_eq!(player.bpm(), 20);
}
