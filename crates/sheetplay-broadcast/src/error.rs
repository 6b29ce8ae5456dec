//! Error types for the position broadcaster.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Broadcast lease error: {0}")]
    Lease(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to spawn broadcaster thread: {0}")]
    Spawn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
