//! The host-facing player.
//!
//! [`SheetPlayer`] owns the control side: the pipeline thread, the optional
//! broadcaster, mute names and persisted state. The audio side is a
//! [`BlockScheduler`] obtained from [`SheetPlayer::scheduler`] and driven by
//! the host's processing callback.

use crate::error::Result;
use crate::events::{EventHub, PlayerListener};
use crate::pipeline::{MutedTracks, Pipeline, PipelineRequest, PipelineThread};
use crate::state::PlaybackState;
use crate::SheetPlayerBuilder;
use parking_lot::Mutex;
use sheetplay_core::PlayerConfig;
use sheetplay_midi::{BlockScheduler, PlaybackSet, SharedPlayback};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "broadcast")]
use sheetplay_broadcast::PositionBroadcaster;

pub struct SheetPlayer {
    config: PlayerConfig,
    playback: Arc<SharedPlayback>,
    events: Arc<EventHub>,
    muted: MutedTracks,
    sheet_path: Mutex<Option<PathBuf>>,
    pipeline: Pipeline,
    pipeline_thread: Mutex<PipelineThread>,
    #[cfg(feature = "broadcast")]
    broadcaster: Mutex<Option<PositionBroadcaster>>,
}

impl SheetPlayer {
    pub fn builder() -> SheetPlayerBuilder {
        SheetPlayerBuilder::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        config: PlayerConfig,
        playback: Arc<SharedPlayback>,
        events: Arc<EventHub>,
        muted: MutedTracks,
        pipeline: Pipeline,
        pipeline_thread: PipelineThread,
        #[cfg(feature = "broadcast")] broadcaster: Option<PositionBroadcaster>,
    ) -> Self {
        Self {
            config,
            playback,
            events,
            muted,
            sheet_path: Mutex::new(None),
            pipeline,
            pipeline_thread: Mutex::new(pipeline_thread),
            #[cfg(feature = "broadcast")]
            broadcaster: Mutex::new(broadcaster),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// A scheduler bound to this player's playback state.
    ///
    /// Move it into the audio callback. Several schedulers may exist, but
    /// they share cursors, so only one should be driven at a time.
    pub fn scheduler(&self) -> BlockScheduler {
        BlockScheduler::new(Arc::clone(&self.playback), &self.config)
    }

    pub fn playback(&self) -> &Arc<SharedPlayback> {
        &self.playback
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn set_listener(&self, listener: Arc<dyn PlayerListener>) {
        self.events.set_listener(listener);
    }

    pub fn clear_listener(&self) {
        self.events.clear_listener();
    }

    /// Make `path` the current sheet and compile it in the background.
    ///
    /// Returns `false` if the pipeline thread has already stopped.
    pub fn open_sheet(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        info!("Opening {}", path.display());
        *self.sheet_path.lock() = Some(path.clone());
        self.pipeline_thread
            .lock()
            .request(PipelineRequest::Compile(path))
    }

    /// Compile `path` on the calling thread and make it the current sheet.
    ///
    /// The background pipeline is not notified, so file watching follows
    /// only sheets opened with [`open_sheet`](Self::open_sheet).
    pub fn open_sheet_blocking(&self, path: impl AsRef<Path>) -> Result<Arc<PlaybackSet>> {
        let path = path.as_ref();
        let set = self.pipeline.compile(path)?;
        *self.sheet_path.lock() = Some(path.to_path_buf());
        Ok(set)
    }

    /// Compile the current sheet again in the background.
    pub fn reload(&self) -> bool {
        if self.sheet_path.lock().is_none() {
            return false;
        }
        self.pipeline_thread
            .lock()
            .request(PipelineRequest::Recompile)
    }

    pub fn sheet_path(&self) -> Option<PathBuf> {
        self.sheet_path.lock().clone()
    }

    /// The currently published set, if any compile succeeded.
    pub fn current(&self) -> Option<Arc<PlaybackSet>> {
        self.playback.current()
    }

    pub fn track_names(&self) -> Vec<String> {
        self.playback
            .current()
            .map(|set| set.track_names())
            .unwrap_or_default()
    }

    /// Mute or unmute a track by name. Takes effect on the next audio cycle.
    ///
    /// Names that are not in the current sheet are remembered and apply once
    /// a sheet with that track is compiled.
    pub fn set_track_muted(&self, name: &str, muted: bool) {
        let mut names = self.muted.lock();
        let changed = if muted {
            names.insert(name.to_string())
        } else {
            names.remove(name)
        };
        if !changed {
            return;
        }
        debug!("Track {name:?} muted: {muted}");
        if let Some(set) = self.playback.current() {
            self.playback
                .set_mutes(set.resolve_mutes(names.iter().map(String::as_str)));
        }
    }

    pub fn mute_track(&self, name: &str) {
        self.set_track_muted(name, true);
    }

    pub fn unmute_track(&self, name: &str) {
        self.set_track_muted(name, false);
    }

    pub fn is_track_muted(&self, name: &str) -> bool {
        self.muted.lock().contains(name)
    }

    pub fn muted_tracks(&self) -> Vec<String> {
        self.muted.lock().iter().cloned().collect()
    }

    /// Snapshot for the host to persist with its session.
    pub fn save_state(&self) -> Vec<u8> {
        PlaybackState {
            sheet_path: self.sheet_path(),
            muted_tracks: self.muted.lock().clone(),
        }
        .to_bytes()
    }

    /// Restore a blob from [`save_state`](Self::save_state).
    ///
    /// Foreign or corrupt data is ignored and `false` returned. Otherwise
    /// the mutes are replaced and the saved sheet, if any, is reopened.
    pub fn restore_state(&self, bytes: &[u8]) -> bool {
        let Some(state) = PlaybackState::from_bytes(bytes) else {
            return false;
        };
        {
            let mut names = self.muted.lock();
            *names = state.muted_tracks;
            if let Some(set) = self.playback.current() {
                self.playback
                    .set_mutes(set.resolve_mutes(names.iter().map(String::as_str)));
            }
        }
        if let Some(path) = state.sheet_path {
            self.open_sheet(path);
        }
        true
    }

    #[cfg(feature = "broadcast")]
    pub fn is_broadcasting(&self) -> bool {
        self.broadcaster
            .lock()
            .as_ref()
            .is_some_and(PositionBroadcaster::is_running)
    }

    /// Stop background threads. Idempotent; also runs on drop.
    ///
    /// Returns `false` if a thread had to be detached after the timeout.
    pub fn shutdown(&self) -> bool {
        let mut clean = true;
        #[cfg(feature = "broadcast")]
        if let Some(mut broadcaster) = self.broadcaster.lock().take() {
            clean &= broadcaster.stop();
        }
        clean &= self.pipeline_thread.lock().stop();
        clean
    }
}

impl Drop for SheetPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SheetPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetPlayer")
            .field("sheet_path", &self.sheet_path())
            .field("muted", &self.muted_tracks())
            .finish_non_exhaustive()
    }
}
