//! Host-persisted player state.
//!
//! Hosts save an opaque blob with their session and hand it back on load.
//! The blob is JSON tagged with a magic code; anything else reads as "no
//! prior state".

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

const MAGIC_CODE: &str = "fe56b86b-753a-413f-8917-f98c706901b5";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub sheet_path: Option<PathBuf>,
    pub muted_tracks: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateBlob {
    magic_code: String,
    #[serde(default)]
    sheet_path: String,
    #[serde(default)]
    muted_tracks: Vec<String>,
}

impl PlaybackState {
    pub fn to_bytes(&self) -> Vec<u8> {
        let blob = StateBlob {
            magic_code: MAGIC_CODE.to_string(),
            sheet_path: self
                .sheet_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            muted_tracks: self.muted_tracks.iter().cloned().collect(),
        };
        // Plain strings only; serializing cannot fail.
        serde_json::to_vec(&blob).unwrap_or_default()
    }

    /// `None` for foreign, corrupt or empty data.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let blob: StateBlob = match serde_json::from_slice(bytes) {
            Ok(blob) => blob,
            Err(e) => {
                debug!("Ignoring unreadable state blob: {e}");
                return None;
            }
        };
        if blob.magic_code != MAGIC_CODE {
            debug!("Ignoring state blob with foreign magic code");
            return None;
        }
        Some(Self {
            sheet_path: Some(blob.sheet_path)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            muted_tracks: blob.muted_tracks.into_iter().collect(),
        })
    }
}
