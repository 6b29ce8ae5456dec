//! Wire format of one position broadcast.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sheetplay_core::{seconds_to_quarters, CompiledSheet, EventInfo};
use std::time::{SystemTime, UNIX_EPOCH};

/// Value of the `type` field.
pub const MESSAGE_TYPE: &str = "position-broadcast";

/// Snapshot of where playback currently is in the source documents.
///
/// Each message stands alone; consumers never diff consecutive ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBroadcast {
    #[serde(rename = "type")]
    pub kind: String,
    pub sheet_path: String,
    /// Position in quarter notes.
    pub sheet_time: f64,
    /// Seconds since the Unix epoch.
    pub last_update_timestamp: u64,
    pub host: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sheet_event_infos: Vec<EventInfo>,
}

impl PositionBroadcast {
    /// Build the message for `seconds` of elapsed transport time.
    pub fn at(
        sheet: &CompiledSheet,
        seconds: f64,
        seconds_per_quarter: f64,
        host: &str,
    ) -> Self {
        let sheet_time = seconds_to_quarters(seconds, seconds_per_quarter);
        Self {
            kind: MESSAGE_TYPE.to_string(),
            sheet_path: sheet.sheet_path.to_string_lossy().into_owned(),
            sheet_time,
            last_update_timestamp: unix_now(),
            host: host.to_string(),
            sheet_event_infos: sheet.timeline.query_at(sheet_time).iter().copied().collect(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
