//! Core types shared by every sheetplay subsystem.
//!
//! # Primary API
//!
//! - [`EventTimeline`] / [`EventInfo`]: performance time → source positions
//! - [`CompiledSheet`]: the immutable result of one compilation
//! - [`TransportPosition`] / [`SharedTransport`]: host play-head and the
//!   lock-free copy the broadcaster polls
//! - [`PlayerConfig`]: tunables for scheduler, pipeline and broadcaster

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{PlayerConfig, DEFAULT_BROADCAST_PORT};

pub mod timeline;
pub use timeline::{EventInfo, EventSet, EventTimeline, Segment, Ticks};

pub mod sheet;
pub use sheet::{CompiledSheet, Source};

pub mod transport;
pub use transport::{
    seconds_to_quarters, CycleWindow, SharedTransport, TransportPosition,
    DEFAULT_SECONDS_PER_QUARTER,
};
