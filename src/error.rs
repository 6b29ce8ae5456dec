//! Centralized error type for the sheetplay umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The compiler ran and reported a problem in the sheet.
    #[error("{}", format_failure(.message, .source_file, .position))]
    CompilationFailure {
        message: String,
        source_file: Option<String>,
        position: Option<i64>,
    },

    #[error("Compiler executable not found (looked for {})", .0.display())]
    ToolNotFound(PathBuf),

    #[error("Invalid compiler response: {0}")]
    InvalidResponse(String),

    #[error("Invalid MIDI payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Core(#[from] sheetplay_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] sheetplay_midi::Error),

    #[cfg(feature = "broadcast")]
    #[error("Broadcast: {0}")]
    Broadcast(#[from] sheetplay_broadcast::Error),

    #[error("Preferences: {0}")]
    Preferences(String),

    #[cfg(feature = "watch")]
    #[error("Watch: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_failure(message: &str, source_file: &Option<String>, position: &Option<i64>) -> String {
    match (source_file, position) {
        (Some(file), Some(pos)) => format!("in file \"{file}\": position {pos}\n{message}"),
        (Some(file), None) => format!("in file \"{file}\"\n{message}"),
        _ => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
