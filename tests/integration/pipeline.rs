//! Pipeline integration tests
//!
//! Background compiles, listener notifications and file watching.

use crate::helpers::*;
use sheetplay::prelude::*;
use sheetplay::Source;
use std::time::{Duration, Instant};

fn wait_for_log(logs: &crossbeam_channel::Receiver<LogEntry>, needle: &str) -> LogEntry {
    let deadline = Instant::now() + WAIT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let entry = logs
            .recv_timeout(left)
            .unwrap_or_else(|_| panic!("no log containing {needle:?}"));
        if entry.message.contains(needle) {
            return entry;
        }
    }
}

#[test]
fn test_background_open_notifies_listener() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    let listened = listener();
    player.set_listener(listened.listener.clone());

    assert!(player.open_sheet("/songs/two.sheet"));
    let names = listened.tracks.recv_timeout(WAIT).unwrap();
    assert_eq!(names, ["Bass", "Drums"]);
    assert_eq!(player.track_names(), ["Bass", "Drums"]);

    let version = wait_for_log(&listened.logs, "stub 1.0");
    assert_eq!(version.level, LogLevel::Info);
}

#[test]
fn test_compile_error_reaches_listener() {
    let compiler = StubCompiler::new(Vec::new());
    compiler.respond(Response::Failure("missing bar line".into()));
    let player = test_player(compiler);
    let listened = listener();
    player.set_listener(listened.listener.clone());

    player.open_sheet("/songs/broken.sheet");
    let entry = wait_for_log(&listened.logs, "missing bar line");
    assert_eq!(entry.level, LogLevel::Error);
    assert!(entry.message.contains("/songs/broken.sheet"));
    assert!(player.current().is_none());
}

#[test]
fn test_logs_before_listener_are_replayed() {
    let compiler = StubCompiler::new(two_track_sheet());
    let player = test_player(compiler.clone());
    player.open_sheet_blocking("/songs/two.sheet").unwrap();

    let listened = listener();
    player.set_listener(listened.listener.clone());
    wait_for_log(&listened.logs, "Compiled /songs/two.sheet");
    assert_eq!(
        listened.tracks.recv_timeout(WAIT).unwrap(),
        ["Bass", "Drums"]
    );
}

#[test]
fn test_reload_without_sheet_is_refused() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    assert!(!player.reload());
}

#[test]
fn test_change_to_included_file_recompiles() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = dir.path().join("song.sheet");
    let include = dir.path().join("pop.chords");
    std::fs::write(&sheet, "using \"pop.chords\";").unwrap();
    std::fs::write(&include, "C: 1 3 5").unwrap();

    let compiler = StubCompiler::new(Vec::new());
    compiler.respond(Response::Sheet {
        midi: two_track_sheet(),
        sources: vec![Source {
            source_id: "1".into(),
            path: "pop.chords".into(),
        }],
        events: Vec::new(),
    });

    let listened = listener();
    let player = SheetPlayer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .compiler(compiler.clone())
        .listener(listened.listener.clone())
        .broadcast(false)
        .watch(true)
        .watch_interval(Duration::from_millis(20))
        .build()
        .unwrap();

    player.open_sheet(&sheet);
    listened.tracks.recv_timeout(WAIT).unwrap();

    // Give the poller a baseline before touching the file.
    std::thread::sleep(Duration::from_millis(200));
    std::fs::write(&include, "C: 1 3 5 7 -- maj7").unwrap();

    listened.tracks.recv_timeout(WAIT).unwrap();
    assert!(compiler.calls() >= 2);
}

#[test]
fn test_shutdown_stops_pipeline() {
    let player = test_player(StubCompiler::new(two_track_sheet()));
    assert!(player.shutdown());
    assert!(!player.open_sheet("/songs/two.sheet"));
    // Idempotent.
    assert!(player.shutdown());
}
