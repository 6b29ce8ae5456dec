//! Polls the sheet and every document it includes for modifications.
//!
//! notify's poller compares modification times in whole seconds, so file
//! contents are hashed as well. A save within the same second as the
//! previous one is still reported.

use crate::error::Result;
use notify::{Config, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Polling watcher over a replaceable set of files.
///
/// `on_change` runs on notify's polling thread with the path that changed.
pub struct SheetWatcher {
    watcher: PollWatcher,
    watched: Vec<PathBuf>,
}

impl SheetWatcher {
    pub fn new<F>(interval: Duration, on_change: F) -> Result<Self>
    where
        F: Fn(&Path) + Send + 'static,
    {
        let config = Config::default()
            .with_poll_interval(interval)
            .with_compare_contents(true);
        let watcher = PollWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if is_change(&event.kind) {
                        if let Some(path) = event.paths.first() {
                            debug!("{} changed", path.display());
                            on_change(path);
                        }
                    }
                }
                Err(e) => warn!("File watch error: {e}"),
            },
            config,
        )?;
        Ok(Self {
            watcher,
            watched: Vec::new(),
        })
    }

    /// Replace the watched set with `paths`. Files that cannot be watched
    /// are skipped with a warning.
    pub fn watch_paths(&mut self, paths: &[PathBuf]) {
        for old in self.watched.drain(..) {
            let _ = self.watcher.unwatch(&old);
        }
        for path in paths {
            if !path.exists() {
                warn!("Cannot watch {}: file not found", path.display());
                continue;
            }
            match self.watcher.watch(path, RecursiveMode::NonRecursive) {
                Ok(()) => self.watched.push(path.clone()),
                Err(e) => warn!("Cannot watch {}: {e}", path.display()),
            }
        }
        debug!("Watching {} file(s)", self.watched.len());
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

fn is_change(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_reports_modification() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.sheet");
        std::fs::write(&file, "tempo: 120;").unwrap();

        let (tx, rx) = unbounded();
        let mut watcher = SheetWatcher::new(Duration::from_millis(20), move |path| {
            let _ = tx.send(path.to_path_buf());
        })
        .unwrap();
        watcher.watch_paths(&[file.clone()]);
        assert_eq!(watcher.watched(), [file.clone()]);

        // Let the first poll record the baseline, then change the contents
        // well within the same second.
        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(&file, "tempo: 140; -- longer content").unwrap();

        let changed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(changed.file_name(), file.file_name());
    }

    #[test]
    fn test_reports_rapid_successive_saves() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pop.chords");
        std::fs::write(&file, "C: 1 3 5").unwrap();

        let (tx, rx) = unbounded();
        let mut watcher = SheetWatcher::new(Duration::from_millis(20), move |path| {
            let _ = tx.send(path.to_path_buf());
        })
        .unwrap();
        watcher.watch_paths(&[file.clone()]);

        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(&file, "C: 1 3 5 7").unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        while rx.recv_timeout(Duration::from_millis(100)).is_ok() {}

        std::fs::write(&file, "C: 1 3 5 7 9").unwrap();
        let changed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(changed.file_name(), file.file_name());
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = SheetWatcher::new(Duration::from_millis(20), |_| {}).unwrap();
        watcher.watch_paths(&[dir.path().join("missing.sheet")]);
        assert!(watcher.watched().is_empty());
    }
}
