//! Integration tests for the sheetplay player
//!
//! Test categories:
//! - Player: compile, publish, schedule, mute by name
//! - Pipeline: background compiles, failures, file watching
//! - State: persisted blob and preferences
//!
//! Run with:
//! ```bash
//! cargo test -p sheetplay --test integration_tests
//! ```

mod helpers;
mod integration;
