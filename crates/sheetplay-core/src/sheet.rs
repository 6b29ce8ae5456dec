//! The unit produced by one compilation.

use crate::timeline::EventTimeline;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One physical input document contributing to a compiled piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub source_id: String,
    pub path: String,
}

/// MIDI bytes, source list and event timeline from one successful compile.
///
/// Published behind an `Arc` and never mutated afterwards; the next compile
/// replaces it wholesale.
#[derive(Debug, Clone)]
pub struct CompiledSheet {
    /// The document the compiler was invoked on.
    pub sheet_path: PathBuf,
    pub sources: Vec<Source>,
    pub midi_bytes: Vec<u8>,
    pub timeline: EventTimeline,
}

impl CompiledSheet {
    pub fn new(
        sheet_path: impl Into<PathBuf>,
        sources: Vec<Source>,
        midi_bytes: Vec<u8>,
        timeline: EventTimeline,
    ) -> Self {
        Self {
            sheet_path: sheet_path.into(),
            sources,
            midi_bytes,
            timeline,
        }
    }

    /// Paths of every document the piece was built from, for file watching.
    ///
    /// Relative source paths are resolved against the sheet's directory. The
    /// sheet itself is always included.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let base = self.sheet_path.parent().map(PathBuf::from).unwrap_or_default();
        let mut paths = vec![self.sheet_path.clone()];
        for source in &self.sources {
            let path = PathBuf::from(&source.path);
            let path = if path.is_relative() {
                base.join(path)
            } else {
                path
            };
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}
