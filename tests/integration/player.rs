//! Player integration tests
//!
//! Compile through the stub, then drive the scheduler by hand with block
//! boundaries that are exact in binary so offsets are integral.

use crate::helpers::*;
use sheetplay::prelude::*;
use sheetplay::Error;

/// 0.25 s (the first notes) minus half a block.
const HALF_BLOCK_BEFORE: f64 = 0.1875;
const BLOCK_SECONDS: f64 = TEST_BLOCK_SIZE as f64 / TEST_SAMPLE_RATE;

#[test]
fn test_compiled_sheet_plays_through_scheduler() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    let set = player.open_sheet_blocking("/songs/two.sheet").unwrap();
    assert_eq!(set.track_names(), ["Bass", "Drums"]);
    assert_eq!(player.track_names(), ["Bass", "Drums"]);

    let mut scheduler = player.scheduler();
    assert!(cycle(&mut scheduler, 0.0, true).is_empty());

    let events = cycle(&mut scheduler, HALF_BLOCK_BEFORE, true);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.is_note_on() && e.frame_offset == 512));
    assert_eq!(events[0].channel_num(), 0);
    assert_eq!(events[1].channel_num(), 9);
    assert_eq!(scheduler.pending_note_offs(), 2);
}

#[test]
fn test_mute_before_compile_applies_by_name() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    player.mute_track("Drums");
    assert!(player.is_track_muted("Drums"));

    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    let mut scheduler = player.scheduler();
    let events = cycle(&mut scheduler, HALF_BLOCK_BEFORE, true);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].note(), Some(36));
}

#[test]
fn test_mute_while_playing_keeps_pending_note_offs() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    let mut scheduler = player.scheduler();

    assert_eq!(cycle(&mut scheduler, HALF_BLOCK_BEFORE, true).len(), 2);
    player.mute_track("Bass");
    player.mute_track("Drums");

    // Note-offs at 0.75 s land in the fourth following block at offset 512.
    let mut offs = Vec::new();
    for k in 1..=4 {
        let events = cycle(&mut scheduler, HALF_BLOCK_BEFORE + k as f64 * BLOCK_SECONDS, true);
        assert!(events.iter().all(|e| !e.is_note_on()));
        offs.extend(events.into_iter().map(|e| (k, e)));
    }
    assert_eq!(offs.len(), 2);
    for (k, event) in &offs {
        assert_eq!(*k, 4);
        assert!(event.is_note_off());
        assert_eq!(event.frame_offset, 512);
    }
}

#[test]
fn test_unmute_restores_output_next_cycle() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    player.mute_track("Bass");
    player.unmute_track("Bass");
    assert!(player.muted_tracks().is_empty());

    let mut scheduler = player.scheduler();
    assert_eq!(cycle(&mut scheduler, HALF_BLOCK_BEFORE, true).len(), 2);
}

#[test]
fn test_failed_recompile_keeps_previous_sheet() {
    let compiler = StubCompiler::new(two_track_sheet());
    let player = test_player(compiler.clone());
    let first = player.open_sheet_blocking("/songs/two.sheet").unwrap();

    compiler.respond(Response::Failure("unknown instrument 'tuba'".into()));
    let err = player.open_sheet_blocking("/songs/two.sheet").unwrap_err();
    assert!(matches!(err, Error::CompilationFailure { .. }));
    assert!(err.to_string().contains("unknown instrument"));

    let current = player.current().unwrap();
    assert_eq!(current.generation(), first.generation());
    assert_eq!(player.track_names(), ["Bass", "Drums"]);
}

#[test]
fn test_garbage_midi_is_rejected() {
    let compiler = StubCompiler::new(b"not a midi file".to_vec());
    let player = test_player(compiler);
    let err = player.open_sheet_blocking("/songs/bad.sheet").unwrap_err();
    assert!(matches!(err, Error::Midi(_)));
    assert!(player.current().is_none());
}

#[test]
fn test_mutes_follow_names_across_recompile() {
    let compiler = StubCompiler::new(two_track_sheet());
    let player = test_player(compiler.clone());
    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    player.mute_track("Drums");
    assert!(player.playback().mutes().is_muted(1));

    // Same tracks, swapped order.
    compiler.respond(Response::Sheet {
        midi: smf(&[
            track("Drums", 9, vec![note(0.5, 1.0, 38)]),
            track("Bass", 0, vec![note(0.5, 1.0, 36)]),
        ]),
        sources: Vec::new(),
        events: Vec::new(),
    });
    player.open_sheet_blocking("/songs/two.sheet").unwrap();

    let mutes = player.playback().mutes();
    assert!(mutes.is_muted(0));
    assert!(!mutes.is_muted(1));
}

#[test]
fn test_recompile_resets_cursors() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    let mut scheduler = player.scheduler();
    assert_eq!(cycle(&mut scheduler, HALF_BLOCK_BEFORE, true).len(), 2);

    // Same position again after a recompile: fresh cursors, same notes.
    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    let events = cycle(&mut scheduler, HALF_BLOCK_BEFORE, true);
    assert_eq!(events.iter().filter(|e| e.is_note_on()).count(), 2);
}

#[test]
fn test_stop_sends_all_notes_off() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    player.open_sheet_blocking("/songs/two.sheet").unwrap();
    let mut scheduler = player.scheduler();
    cycle(&mut scheduler, HALF_BLOCK_BEFORE, true);

    let events = cycle(&mut scheduler, HALF_BLOCK_BEFORE + BLOCK_SECONDS, false);
    assert_eq!(events.len(), 16);
    assert!(events.iter().all(|e| e.is_all_notes_off() && e.frame_offset == 0));
    assert_eq!(scheduler.pending_note_offs(), 0);
}
