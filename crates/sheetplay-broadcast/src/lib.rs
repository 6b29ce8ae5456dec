//! Position broadcaster for sheetplay.
//!
//! A background thread polls the shared transport at a coarse interval,
//! converts the position to quarter notes, looks it up in the sheet's event
//! timeline and sends a JSON snapshot to `localhost:<port>` over UDP.
//! Across processes, only the holder of a [`BroadcastLease`] for the sheet
//! sends.

pub mod error;
pub use error::{Error, Result};

pub mod message;
pub use message::{PositionBroadcast, MESSAGE_TYPE};

pub mod lease;
pub use lease::{BroadcastLease, LeaseKey};

pub mod broadcaster;
pub use broadcaster::{BroadcastConfig, PositionBroadcaster, PositionSnapshot, PositionSource};
