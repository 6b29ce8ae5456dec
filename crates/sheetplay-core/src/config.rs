//! Player configuration.

use crate::{Error, Result};
use std::time::Duration;

/// Default UDP port the position broadcaster sends to.
pub const DEFAULT_BROADCAST_PORT: u16 = 7935;

/// Configuration shared by the scheduler, pipeline and broadcaster.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub sample_rate: f64,
    /// Largest block the host will ask for. Used to size RT buffers up front.
    pub max_block_size: usize,
    /// Capacity of the deferred note-off queue.
    pub note_off_capacity: usize,
    pub broadcast_port: u16,
    /// Identifier sent in the `host` field of every broadcast.
    pub broadcast_host: String,
    pub broadcast_interval: Duration,
    /// How often a broadcaster without the lease retries acquiring it.
    pub lease_retry_interval: Duration,
    pub watch_interval: Duration,
    /// Upper bound for joining background threads on shutdown.
    pub shutdown_timeout: Duration,
    /// Log entries kept while no listener is registered.
    pub log_buffer_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            max_block_size: 512,
            note_off_capacity: 1024,
            broadcast_port: DEFAULT_BROADCAST_PORT,
            broadcast_host: "sheetplay".to_string(),
            broadcast_interval: Duration::from_millis(50),
            lease_retry_interval: Duration::from_millis(500),
            watch_interval: Duration::from_millis(50),
            shutdown_timeout: Duration::from_secs(1),
            log_buffer_capacity: 256,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(Error::InvalidConfig("max_block_size must be > 0".into()));
        }
        if self.note_off_capacity == 0 {
            return Err(Error::InvalidConfig(
                "note_off_capacity must be > 0".into(),
            ));
        }
        if self.broadcast_port == 0 {
            return Err(Error::InvalidConfig("broadcast_port must be > 0".into()));
        }
        if self.broadcast_interval.is_zero() || self.watch_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "polling intervals must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
