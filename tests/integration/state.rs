//! State integration tests
//!
//! A blob saved by one player instance restores sheet and mutes in another.

use crate::helpers::*;
use sheetplay::PlaybackState;

#[test]
fn test_state_moves_between_players() {
    let first = test_player(StubCompiler::new(two_track_sheet()));
    first.open_sheet_blocking("/songs/two.sheet").unwrap();
    first.mute_track("Bass");
    let blob = first.save_state();
    first.shutdown();

    let second = test_player(StubCompiler::new(two_track_sheet()));
    let listened = listener();
    second.set_listener(listened.listener.clone());
    assert!(second.restore_state(&blob));

    assert_eq!(second.sheet_path().unwrap().to_str(), Some("/songs/two.sheet"));
    assert_eq!(second.muted_tracks(), ["Bass"]);

    // The sheet is reopened in the background; mutes resolve once it lands.
    listened.tracks.recv_timeout(WAIT).unwrap();
    let mutes = second.playback().mutes();
    assert!(mutes.is_muted(0));
    assert!(!mutes.is_muted(1));
}

#[test]
fn test_foreign_state_is_ignored() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    player.mute_track("Drums");

    assert!(!player.restore_state(b"<xml/>"));
    assert!(!player.restore_state(br#"{"magicCode":"other","sheetPath":"","mutedTracks":[]}"#));
    assert_eq!(player.muted_tracks(), ["Drums"]);
    assert!(player.sheet_path().is_none());
}

#[test]
fn test_state_without_sheet_only_restores_mutes() {
    let state = PlaybackState {
        sheet_path: None,
        muted_tracks: ["Lead".to_string()].into(),
    };
    let player = test_player(StubCompiler::new(two_track_sheet()));
    assert!(player.restore_state(&state.to_bytes()));
    assert_eq!(player.muted_tracks(), ["Lead"]);
    assert!(player.sheet_path().is_none());
}
