//! Integration test modules for sheetplay
//!
//! - player: compile-and-play through a scheduler, mutes
//! - pipeline: background thread, failures, watching, listener
//! - state: save/restore across player instances

pub mod pipeline;
pub mod player;
pub mod state;
