//! Error types for MIDI decoding.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI decode error: {0}")]
    Decode(String),

    #[error("Unsupported MIDI timing format: {0}")]
    UnsupportedTiming(String),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
