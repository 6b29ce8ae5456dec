//! # sheetplay - compiled sheet playback
//!
//! Plays the MIDI rendering of a sheet-music document in lock-step with a
//! host transport, and tells an external editor where playback is.
//!
//! ## Architecture
//!
//! sheetplay is an umbrella crate that coordinates:
//! - **sheetplay-core** - Event timeline, compiled sheet, transport reference, config
//! - **sheetplay-midi** - SMF decoding, note-off deferral, the real-time block scheduler
//! - **sheetplay-broadcast** - UDP position broadcaster with a cross-process lease
//!
//! and adds the control side: the external compiler, the compilation
//! pipeline thread, file watching, listener notifications, preferences and
//! persisted state.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sheetplay::prelude::*;
//!
//! let player = SheetPlayer::builder()
//!     .sample_rate(48000.0)
//!     .build()?;
//! player.open_sheet("/songs/blues.sheet");
//!
//! // In the audio callback
//! let mut scheduler = player.scheduler();
//! let mut out = scheduler.output_buffer();
//! scheduler.process(Some(TransportPosition::playing(seconds)), frames, &mut out);
//! for event in &out {
//!     send_to_host(event.frame_offset, event.to_bytes());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `broadcast` and `watch`
//! - `broadcast` - UDP position broadcasting
//! - `watch` - Recompile when a source file changes

/// Re-export of sheetplay-core for direct access
pub use sheetplay_core as core;

pub use sheetplay_core::{
    CompiledSheet, EventInfo, EventSet, EventTimeline, PlayerConfig, Source, TransportPosition,
};

/// Re-export of sheetplay-midi for direct access
pub use sheetplay_midi as midi;

pub use sheetplay_midi::{
    BlockScheduler, CycleStatus, MidiBuffer, MidiEvent, MidiMessage, PlaybackSet, SharedPlayback,
};

#[cfg(feature = "broadcast")]
pub use sheetplay_broadcast as broadcast;

#[cfg(feature = "broadcast")]
pub use sheetplay_broadcast::{PositionBroadcast, PositionBroadcaster};

mod error;
pub use error::{Error, Result};

pub mod compiler;
pub mod events;
pub mod pipeline;
pub mod preferences;
pub mod state;

#[cfg(feature = "watch")]
pub mod watcher;

mod builder;
mod player;

pub use builder::SheetPlayerBuilder;
pub use compiler::{CompilerOutput, ExternalCompiler, SheetCompiler};
pub use events::{EventHub, LogEntry, LogLevel, PlayerListener};
pub use pipeline::{Pipeline, PipelineRequest, PipelineThread};
pub use player::SheetPlayer;
pub use preferences::Preferences;
pub use state::PlaybackState;

/// Convenience prelude for common imports
pub mod prelude {
    // Main player
    pub use crate::{SheetPlayer, SheetPlayerBuilder};

    // Audio thread
    pub use crate::midi::{BlockScheduler, CycleStatus, MidiBuffer, MidiEvent};
    pub use crate::core::TransportPosition;

    // Control side
    pub use crate::{LogEntry, LogLevel, PlayerListener, Preferences, SheetCompiler};
}
