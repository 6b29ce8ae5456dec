//! Standard MIDI File decoding.
//!
//! Converts the compiler's SMF bytes into per-track event lists with absolute
//! times in seconds. Every tempo event in the file (on any track) feeds a
//! piecewise tempo map, so the seconds are exact even for files that change
//! tempo. Each note-on records the index of the note-off that ends it.

use crate::error::{Error, Result};
use crate::event::MidiEvent;
use midi_msg::{Channel, ChannelVoiceMsg, ControlChange};
use midly::{MetaMessage, MidiMessage as SmfMessage, Smf, Timing, TrackEventKind};
use sheetplay_core::DEFAULT_SECONDS_PER_QUARTER;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

/// One channel event with an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackEvent {
    /// Seconds from the start of the piece.
    pub time: f64,
    /// `frame_offset` is unused here; the scheduler fills it in.
    pub event: MidiEvent,
    /// Index of the paired note-off within the same track, for note-ons.
    pub note_off: Option<usize>,
}

impl TrackEvent {
    #[inline]
    pub fn is_note_off(&self) -> bool {
        self.event.is_note_off()
    }
}

/// Time-sorted channel events of one SMF track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: String,
    pub events: Vec<TrackEvent>,
}

impl Track {
    pub fn new(name: impl Into<String>, events: Vec<TrackEvent>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the final event, if any.
    #[inline]
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    /// Index of the first event at or after `time` (`len()` if none).
    #[inline]
    pub fn first_at_or_after(&self, time: f64) -> usize {
        self.events.partition_point(|e| e.time < time)
    }
}

/// Result of decoding one SMF.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSheet {
    /// One entry per SMF track, in file order.
    pub tracks: Vec<Track>,
    /// From the first tempo event, or 0.5 (120 BPM) when there is none.
    pub seconds_per_quarter: f64,
    /// `None` for SMPTE timecode files.
    pub ticks_per_beat: Option<u16>,
}

impl DecodedSheet {
    pub fn track_names(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.name.clone()).collect()
    }

    /// Resolve a track name to its index.
    pub fn track_index(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.name == name)
    }
}

/// Tempo segment: from `tick` onward, each quarter lasts `seconds_per_quarter`.
#[derive(Debug, Clone, Copy)]
struct TempoPoint {
    tick: u64,
    seconds: f64,
    seconds_per_quarter: f64,
}

enum Clock {
    Metrical {
        ticks_per_beat: f64,
        tempo: Vec<TempoPoint>,
    },
    Timecode {
        ticks_per_second: f64,
    },
}

impl Clock {
    fn seconds_at(&self, tick: u64) -> f64 {
        match self {
            Clock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
            Clock::Metrical {
                ticks_per_beat,
                tempo,
            } => {
                let idx = tempo.partition_point(|p| p.tick <= tick);
                match idx.checked_sub(1).map(|i| tempo[i]) {
                    Some(p) => {
                        p.seconds
                            + (tick - p.tick) as f64 / ticks_per_beat * p.seconds_per_quarter
                    }
                    None => tick as f64 / ticks_per_beat * DEFAULT_SECONDS_PER_QUARTER,
                }
            }
        }
    }
}

/// Tempo changes across all tracks, ordered by tick. Later tracks win ties.
fn collect_tempo_changes(smf: &Smf) -> Vec<(u64, f64)> {
    let mut changes = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            if let TrackEventKind::Meta(MetaMessage::Tempo(us)) = event.kind {
                changes.push((tick, f64::from(us.as_int()) / 1_000_000.0));
            }
        }
    }
    changes.sort_by_key(|&(tick, _)| tick);
    changes
}

/// Tempo set by the earliest change. Ties go to the later track, as in
/// [`build_tempo_map`].
fn initial_seconds_per_quarter(changes: &[(u64, f64)]) -> f64 {
    let Some(&(first, _)) = changes.first() else {
        return DEFAULT_SECONDS_PER_QUARTER;
    };
    changes
        .iter()
        .take_while(|&&(tick, _)| tick == first)
        .last()
        .map(|&(_, spq)| spq)
        .filter(|&spq| spq > 0.0)
        .unwrap_or(DEFAULT_SECONDS_PER_QUARTER)
}

fn build_tempo_map(changes: &[(u64, f64)], ticks_per_beat: f64) -> Vec<TempoPoint> {
    let mut map: Vec<TempoPoint> = Vec::with_capacity(changes.len() + 1);
    map.push(TempoPoint {
        tick: 0,
        seconds: 0.0,
        seconds_per_quarter: DEFAULT_SECONDS_PER_QUARTER,
    });
    for &(tick, spq) in changes {
        let Some(last) = map.last_mut() else { break };
        if last.tick == tick {
            last.seconds_per_quarter = spq;
            continue;
        }
        let seconds =
            last.seconds + (tick - last.tick) as f64 / ticks_per_beat * last.seconds_per_quarter;
        map.push(TempoPoint {
            tick,
            seconds,
            seconds_per_quarter: spq,
        });
    }
    map
}

fn convert_message(message: SmfMessage) -> ChannelVoiceMsg {
    match message {
        SmfMessage::NoteOn { key, vel } if vel.as_int() == 0 => ChannelVoiceMsg::NoteOff {
            note: key.as_int(),
            velocity: 0,
        },
        SmfMessage::NoteOn { key, vel } => ChannelVoiceMsg::NoteOn {
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        SmfMessage::NoteOff { key, vel } => ChannelVoiceMsg::NoteOff {
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        SmfMessage::Aftertouch { key, vel } => ChannelVoiceMsg::PolyPressure {
            note: key.as_int(),
            pressure: vel.as_int(),
        },
        SmfMessage::Controller { controller, value } => ChannelVoiceMsg::ControlChange {
            control: ControlChange::CC {
                control: controller.as_int(),
                value: value.as_int(),
            },
        },
        SmfMessage::ProgramChange { program } => ChannelVoiceMsg::ProgramChange {
            program: program.as_int(),
        },
        SmfMessage::ChannelAftertouch { vel } => ChannelVoiceMsg::ChannelPressure {
            pressure: vel.as_int(),
        },
        SmfMessage::PitchBend { bend } => ChannelVoiceMsg::PitchBend {
            bend: bend.0.as_int(),
        },
    }
}

fn decode_track(index: usize, track: &[midly::TrackEvent<'_>], clock: &Clock) -> Track {
    let mut name: Option<String> = None;
    let mut events: Vec<TrackEvent> = Vec::new();
    let mut pending: HashMap<(u8, u8), VecDeque<usize>> = HashMap::new();
    let mut tick = 0u64;

    for event in track {
        tick += u64::from(event.delta.as_int());
        match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) if name.is_none() => {
                name = Some(String::from_utf8_lossy(bytes).into_owned());
            }
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                let msg = convert_message(message);
                let idx = events.len();
                match msg {
                    ChannelVoiceMsg::NoteOn { note, .. } => {
                        pending.entry((channel, note)).or_default().push_back(idx);
                    }
                    ChannelVoiceMsg::NoteOff { note, .. } => {
                        if let Some(on) = pending
                            .get_mut(&(channel, note))
                            .and_then(VecDeque::pop_front)
                        {
                            events[on].note_off = Some(idx);
                        } else {
                            trace!(channel, note, "note-off without matching note-on");
                        }
                    }
                    _ => {}
                }
                events.push(TrackEvent {
                    time: clock.seconds_at(tick),
                    event: MidiEvent::new(0, Channel::from_u8(channel), msg),
                    note_off: None,
                });
            }
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Track {}", index + 1));
    Track { name, events }
}

/// Decode SMF bytes into tracks with absolute times in seconds.
pub fn decode(bytes: &[u8]) -> Result<DecodedSheet> {
    let smf = Smf::parse(bytes)?;
    let changes = collect_tempo_changes(&smf);
    let seconds_per_quarter = initial_seconds_per_quarter(&changes);

    let (clock, ticks_per_beat) = match smf.header.timing {
        Timing::Metrical(tpb) => {
            let tpb = tpb.as_int();
            if tpb == 0 {
                return Err(Error::UnsupportedTiming(
                    "zero ticks per beat".to_string(),
                ));
            }
            let clock = Clock::Metrical {
                ticks_per_beat: f64::from(tpb),
                tempo: build_tempo_map(&changes, f64::from(tpb)),
            };
            (clock, Some(tpb))
        }
        Timing::Timecode(fps, subframe) => {
            let ticks_per_second = f64::from(fps.as_f32()) * f64::from(subframe);
            if ticks_per_second <= 0.0 {
                return Err(Error::UnsupportedTiming(format!(
                    "timecode {fps:?} with {subframe} subframes"
                )));
            }
            (Clock::Timecode { ticks_per_second }, None)
        }
    };

    let tracks: Vec<Track> = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(i, track)| decode_track(i, track, &clock))
        .collect();

    debug!(
        "Decoded MIDI: {} tracks, {} events, {:.3} s/quarter",
        tracks.len(),
        tracks.iter().map(Track::len).sum::<usize>(),
        seconds_per_quarter
    );

    Ok(DecodedSheet {
        tracks,
        seconds_per_quarter,
        ticks_per_beat,
    })
}
