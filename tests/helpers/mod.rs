//! Test helpers and fixtures for sheetplay integration tests
//!
//! A scriptable in-process compiler stands in for `sheetc`, and SMF bytes
//! are written with midly so every test controls the exact note times.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crossbeam_channel::{unbounded, Receiver, Sender};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use parking_lot::Mutex;
use sheetplay::prelude::*;
use sheetplay::{CompilerOutput, EventInfo, Error, Result, Source};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Exact in binary floating point, so sample offsets are integral.
pub const TEST_SAMPLE_RATE: f64 = 8192.0;

pub const TEST_BLOCK_SIZE: usize = 1024;

pub const TICKS_PER_QUARTER: u16 = 480;

/// 120 BPM.
pub const TEMPO_US: u32 = 500_000;

pub const WAIT: Duration = Duration::from_secs(5);

/// One note: start and length in quarters, key.
#[derive(Debug, Clone, Copy)]
pub struct Note {
    pub start: f64,
    pub length: f64,
    pub key: u8,
}

pub fn note(start: f64, length: f64, key: u8) -> Note {
    Note { start, length, key }
}

/// A named track on one channel.
pub struct TrackSpec<'a> {
    pub name: &'a str,
    pub channel: u8,
    pub notes: Vec<Note>,
}

pub fn track<'a>(name: &'a str, channel: u8, notes: Vec<Note>) -> TrackSpec<'a> {
    TrackSpec {
        name,
        channel,
        notes,
    }
}

fn ticks(quarters: f64) -> u32 {
    (quarters * f64::from(TICKS_PER_QUARTER)).round() as u32
}

/// Write a parallel SMF at 120 BPM. The tempo lives in the first track.
pub fn smf(tracks: &[TrackSpec<'_>]) -> Vec<u8> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    for (i, track) in tracks.iter().enumerate() {
        let mut timed: Vec<(u32, TrackEventKind<'_>)> = Vec::new();
        timed.push((0, TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes()))));
        if i == 0 {
            timed.push((0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(TEMPO_US)))));
        }
        for n in &track.notes {
            let channel = u4::new(track.channel);
            timed.push((
                ticks(n.start),
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: u7::new(n.key),
                        vel: u7::new(100),
                    },
                },
            ));
            timed.push((
                ticks(n.start + n.length),
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key: u7::new(n.key),
                        vel: u7::new(0),
                    },
                },
            ));
        }
        timed.sort_by_key(|(tick, _)| *tick);

        let mut last = 0;
        let mut events: Vec<TrackEvent<'_>> = timed
            .into_iter()
            .map(|(tick, kind)| {
                let delta = tick - last;
                last = tick;
                TrackEvent {
                    delta: u28::new(delta),
                    kind,
                }
            })
            .collect();
        events.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(events);
    }

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    bytes
}

/// What the stub returns on its next compile.
#[derive(Clone)]
pub enum Response {
    Sheet {
        midi: Vec<u8>,
        sources: Vec<Source>,
        events: Vec<EventInfo>,
    },
    Failure(String),
}

/// Scriptable compiler. Clones share state, so tests keep one to steer a
/// compiler that was moved into the player.
#[derive(Clone)]
pub struct StubCompiler {
    response: Arc<Mutex<Response>>,
    calls: Arc<AtomicUsize>,
}

impl StubCompiler {
    pub fn new(midi: Vec<u8>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Response::Sheet {
                midi,
                sources: Vec::new(),
                events: Vec::new(),
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn respond(&self, response: Response) {
        *self.response.lock() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SheetCompiler for StubCompiler {
    fn compile(&self, sheet: &Path) -> Result<CompilerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.response.lock().clone() {
            Response::Sheet {
                midi,
                sources,
                events,
            } => Ok(CompilerOutput {
                midi_data: STANDARD.encode(midi),
                sources,
                event_infos: events,
            }),
            Response::Failure(message) => Err(Error::CompilationFailure {
                message,
                source_file: Some(sheet.to_string_lossy().into_owned()),
                position: Some(0),
            }),
        }
    }

    fn version(&self) -> Result<String> {
        Ok("stub 1.0".into())
    }
}

/// Forwards listener callbacks into channels.
pub struct ChannelListener {
    logs: Sender<LogEntry>,
    tracks: Sender<Vec<String>>,
}

impl PlayerListener for ChannelListener {
    fn on_log(&self, entry: &LogEntry) {
        let _ = self.logs.send(entry.clone());
    }

    fn on_tracks_changed(&self, names: &[String]) {
        let _ = self.tracks.send(names.to_vec());
    }
}

pub struct Listened {
    pub listener: Arc<ChannelListener>,
    pub logs: Receiver<LogEntry>,
    pub tracks: Receiver<Vec<String>>,
}

pub fn listener() -> Listened {
    let (log_tx, logs) = unbounded();
    let (track_tx, tracks) = unbounded();
    Listened {
        listener: Arc::new(ChannelListener {
            logs: log_tx,
            tracks: track_tx,
        }),
        logs,
        tracks,
    }
}

/// Two tracks: Bass (channel 1) and Drums (channel 10), both sounding at
/// quarter 0.5 (0.25 s) for a quarter.
pub fn two_track_sheet() -> Vec<u8> {
    smf(&[
        track("Bass", 0, vec![note(0.5, 1.0, 36)]),
        track("Drums", 9, vec![note(0.5, 1.0, 38)]),
    ])
}

/// Player with no broadcaster and no file watching.
pub fn test_player(compiler: StubCompiler) -> SheetPlayer {
    SheetPlayer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .max_block_size(TEST_BLOCK_SIZE)
        .compiler(compiler)
        .broadcast(false)
        .watch(false)
        .build()
        .expect("Failed to create test player")
}

/// Run one block at `seconds` and return what was emitted.
pub fn cycle(scheduler: &mut BlockScheduler, seconds: f64, playing: bool) -> Vec<MidiEvent> {
    let mut out = scheduler.output_buffer();
    scheduler.process(
        Some(TransportPosition {
            time_seconds: seconds,
            is_playing: playing,
        }),
        TEST_BLOCK_SIZE,
        &mut out,
    );
    out.iter().copied().collect()
}
