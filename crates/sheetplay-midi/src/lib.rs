//! MIDI side of sheetplay: decoding, scheduling and deferral.
//!
//! # Example
//!
//! ```ignore
//! use sheetplay_midi::{BlockScheduler, SharedPlayback, PlaybackSet};
//!
//! let shared = Arc::new(SharedPlayback::new());
//! shared.publish(PlaybackSet::new(sheet, sheetplay_midi::decode(&bytes)?));
//!
//! let mut scheduler = BlockScheduler::new(shared.clone(), &config);
//! let mut out = scheduler.output_buffer();
//! scheduler.process(Some(TransportPosition::playing(0.0)), 512, &mut out);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod event;
pub use event::{MidiEvent, MidiMessage};

pub mod buffer;
pub use buffer::MidiBuffer;

pub mod file;
pub use file::{decode, DecodedSheet, Track, TrackEvent};

pub mod note_off;
pub use note_off::{NoteOffQueue, PendingNoteOff};

pub mod mute;
pub use mute::MuteSet;

pub mod playback;
pub use playback::{PlaybackSet, SharedPlayback};

pub mod scheduler;
pub use scheduler::{BlockScheduler, CycleStatus, MIDI_CHANNELS};

// Re-export for downstream matching on message payloads
pub use midi_msg::{Channel, ChannelVoiceMsg};
