//! Interface to the external sheet compiler.
//!
//! The compiler is a separate executable (`sheetc`) invoked as
//! `sheetc <sheet> --mode=json`. It prints one JSON document on stdout:
//!
//! ```text
//! { "midiData": "<base64 SMF>",
//!   "sources": [{ "sourceId": 0, "path": "/songs/a.sheet" }],
//!   "eventInfos": [{ "sheetEventInfos": [{ "sourceId": 0, "beginPosition": 12,
//!                    "endPosition": 15, "beginTime": 0.0, "endTime": 1.0 }] }] }
//! ```
//!
//! or, when the sheet has errors, `{ "errorMessage", "sourceFile", "positionBegin" }`.
//! Older compilers nest `midiData` and `sources` under a `midi` object; both
//! shapes are accepted.

use crate::error::{Error, Result};
use serde::Deserialize;
use sheetplay_core::{EventInfo, Source};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "sheetc.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "sheetc";

/// Where the compiler is looked for when neither preferences nor `PATH` name it.
pub const FALLBACK_EXECUTABLE: &str = "/usr/local/bin/sheetc";

/// Everything a successful compile returns, before MIDI decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOutput {
    /// Standard MIDI file, still base64 encoded.
    pub midi_data: String,
    pub sources: Vec<Source>,
    pub event_infos: Vec<EventInfo>,
}

impl CompilerOutput {
    /// Parse the compiler's JSON document.
    ///
    /// A document carrying `errorMessage` becomes [`Error::CompilationFailure`].
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawResponse = serde_json::from_str(json)
            .map_err(|e| Error::InvalidResponse(format!("{e}")))?;

        if let Some(message) = raw.error_message {
            return Err(Error::CompilationFailure {
                message,
                source_file: raw.source_file,
                position: raw.position_begin,
            });
        }

        let (midi_data, sources) = match (raw.midi_data, raw.midi) {
            (Some(data), _) => (data, raw.sources),
            (None, Some(nested)) => (nested.midi_data, nested.sources),
            (None, None) => {
                return Err(Error::InvalidResponse("missing midiData".into()));
            }
        };

        let sources = sources.into_iter().map(RawSource::into_source).collect();
        let event_infos = raw
            .event_infos
            .into_iter()
            .flat_map(|group| group.sheet_event_infos)
            .map(RawEventInfo::into_info)
            .collect();

        Ok(Self {
            midi_data,
            sources,
            event_infos,
        })
    }
}

/// Something that turns a sheet file into [`CompilerOutput`].
pub trait SheetCompiler: Send + Sync {
    fn compile(&self, sheet: &Path) -> Result<CompilerOutput>;

    /// Human readable version string.
    fn version(&self) -> Result<String>;
}

/// Runs the compiler executable as a child process.
#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    executable: PathBuf,
}

impl ExternalCompiler {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Find the executable.
    ///
    /// Order: `bin_dir` from preferences, then `PATH`, then
    /// [`FALLBACK_EXECUTABLE`].
    pub fn locate(bin_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = bin_dir.filter(|d| !d.as_os_str().is_empty()) {
            let candidate = dir.join(EXECUTABLE_NAME);
            if candidate.is_file() {
                return Ok(Self::new(candidate));
            }
            return Err(Error::ToolNotFound(candidate));
        }

        if let Some(found) = search_path(EXECUTABLE_NAME) {
            return Ok(Self::new(found));
        }

        let fallback = PathBuf::from(FALLBACK_EXECUTABLE);
        if fallback.is_file() {
            Ok(Self::new(fallback))
        } else {
            Err(Error::ToolNotFound(fallback))
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ToolNotFound(self.executable.clone()),
                _ => Error::Io(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::InvalidResponse(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl SheetCompiler for ExternalCompiler {
    fn compile(&self, sheet: &Path) -> Result<CompilerOutput> {
        debug!("Compiling {}", sheet.display());
        let stdout = self.run([sheet.as_os_str(), OsStr::new("--mode=json")])?;
        trace!("Compiler returned {} bytes", stdout.len());
        CompilerOutput::from_json(&stdout)
    }

    fn version(&self) -> Result<String> {
        let stdout = self.run(["--version"])?;
        Ok(stdout.trim_end().to_string())
    }
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    error_message: Option<String>,
    source_file: Option<String>,
    position_begin: Option<i64>,
    midi_data: Option<String>,
    #[serde(default)]
    sources: Vec<RawSource>,
    midi: Option<RawMidi>,
    #[serde(default)]
    event_infos: Vec<RawEventGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMidi {
    midi_data: String,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    /// Numeric in current compilers, a string in some older ones.
    source_id: serde_json::Value,
    path: String,
}

impl RawSource {
    fn into_source(self) -> Source {
        let source_id = match self.source_id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Source {
            source_id,
            path: self.path,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEventGroup {
    #[serde(default)]
    sheet_event_infos: Vec<RawEventInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEventInfo {
    source_id: u32,
    begin_position: i32,
    end_position: Option<i32>,
    begin_time: f64,
    end_time: Option<f64>,
}

impl RawEventInfo {
    fn into_info(self) -> EventInfo {
        EventInfo::new(
            self.source_id,
            self.begin_position,
            self.end_position.unwrap_or(self.begin_position),
            self.begin_time,
            self.end_time.unwrap_or(EventInfo::OPEN_END),
        )
    }
}
