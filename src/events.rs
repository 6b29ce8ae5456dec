//! Observer hub for log messages and track list changes.
//!
//! A host UI registers one [`PlayerListener`]. Until it does, log entries are
//! kept in a bounded backlog and replayed on registration, so compile errors
//! raised before the editor opens are not lost. Every entry is also emitted
//! through `tracing`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Receives player notifications. Called from background threads.
pub trait PlayerListener: Send + Sync {
    fn on_log(&self, entry: &LogEntry);

    /// The published sheet changed; `names` is the new track list.
    fn on_tracks_changed(&self, names: &[String]) {
        let _ = names;
    }
}

struct HubState {
    listener: Option<Arc<dyn PlayerListener>>,
    backlog: VecDeque<LogEntry>,
    tracks: Option<Vec<String>>,
}

/// Fan-out point between the pipeline and at most one listener.
pub struct EventHub {
    state: Mutex<HubState>,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HubState {
                listener: None,
                backlog: VecDeque::with_capacity(capacity),
                tracks: None,
            }),
            capacity,
        }
    }

    /// Register `listener`, replacing any previous one.
    ///
    /// The backlog and the latest track list are delivered before returning.
    pub fn set_listener(&self, listener: Arc<dyn PlayerListener>) {
        let (backlog, tracks) = {
            let mut state = self.state.lock();
            state.listener = Some(Arc::clone(&listener));
            (std::mem::take(&mut state.backlog), state.tracks.clone())
        };
        for entry in &backlog {
            listener.on_log(entry);
        }
        if let Some(names) = tracks {
            listener.on_tracks_changed(&names);
        }
    }

    pub fn clear_listener(&self) {
        self.state.lock().listener = None;
    }

    pub fn has_listener(&self) -> bool {
        self.state.lock().listener.is_some()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            level,
            message: message.into(),
        };
        match level {
            LogLevel::Debug => debug!("{}", entry.message),
            LogLevel::Info => info!("{}", entry.message),
            LogLevel::Warn => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }

        let listener = {
            let mut state = self.state.lock();
            match &state.listener {
                Some(listener) => Arc::clone(listener),
                None => {
                    if self.capacity > 0 {
                        if state.backlog.len() == self.capacity {
                            state.backlog.pop_front();
                        }
                        state.backlog.push_back(entry);
                    }
                    return;
                }
            }
        };
        listener.on_log(&entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn tracks_changed(&self, names: Vec<String>) {
        let listener = {
            let mut state = self.state.lock();
            state.tracks = Some(names.clone());
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_tracks_changed(&names);
        }
    }

    /// Entries waiting for a listener.
    pub fn backlog_len(&self) -> usize {
        self.state.lock().backlog.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventHub")
            .field("has_listener", &state.listener.is_some())
            .field("backlog", &state.backlog.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
