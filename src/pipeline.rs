//! Compilation pipeline: sheet file in, published [`PlaybackSet`] out.
//!
//! ```text
//! compile ─► base64 ─► SMF decode ─► timeline ─► PlaybackSet ─► publish
//! ```
//!
//! Every stage runs off the audio thread. A failure anywhere is logged and
//! leaves the previously published set playing.

use crate::compiler::SheetCompiler;
use crate::error::Result;
use crate::events::EventHub;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use sheetplay_core::{CompiledSheet, EventTimeline};
use sheetplay_midi::{decode, PlaybackSet, SharedPlayback};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Track names the user muted. Kept by name so they survive recompiles.
pub type MutedTracks = Arc<Mutex<BTreeSet<String>>>;

/// The synchronous compile-and-publish path.
#[derive(Clone)]
pub struct Pipeline {
    compiler: Arc<dyn SheetCompiler>,
    playback: Arc<SharedPlayback>,
    events: Arc<EventHub>,
    muted: MutedTracks,
}

impl Pipeline {
    pub fn new(
        compiler: Arc<dyn SheetCompiler>,
        playback: Arc<SharedPlayback>,
        events: Arc<EventHub>,
        muted: MutedTracks,
    ) -> Self {
        Self {
            compiler,
            playback,
            events,
            muted,
        }
    }

    pub fn compiler(&self) -> &Arc<dyn SheetCompiler> {
        &self.compiler
    }

    /// Compile `path` and publish the result.
    ///
    /// Errors are returned and also reported through the event hub.
    pub fn compile(&self, path: &Path) -> Result<Arc<PlaybackSet>> {
        match self.build(path) {
            Ok(set) => {
                let names = set.track_names();
                self.events
                    .info(format!("Compiled {} ({} tracks)", path.display(), names.len()));
                self.events.tracks_changed(names);
                Ok(set)
            }
            Err(e) => {
                self.events.error(e.to_string());
                Err(e)
            }
        }
    }

    fn build(&self, path: &Path) -> Result<Arc<PlaybackSet>> {
        let output = self.compiler.compile(path)?;

        let encoded: String = output
            .midi_data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let midi_bytes = STANDARD.decode(encoded)?;
        let decoded = decode(&midi_bytes)?;

        let timeline = EventTimeline::build(output.event_infos);
        debug!(
            "{}: {} bytes MIDI, {} timeline segments",
            path.display(),
            midi_bytes.len(),
            timeline.len()
        );
        let sheet = Arc::new(CompiledSheet::new(
            path,
            output.sources,
            midi_bytes,
            timeline,
        ));

        let set = PlaybackSet::new(sheet, decoded);
        let muted = self.muted.lock();
        let mutes = set.resolve_mutes(muted.iter().map(String::as_str));
        Ok(self.playback.publish_with_mutes(set, mutes))
    }
}

/// Work for the pipeline thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineRequest {
    /// Make `path` the current sheet and compile it.
    Compile(PathBuf),
    /// Compile the current sheet again.
    Recompile,
    Shutdown,
}

/// Background thread serialising compile requests.
pub struct PipelineThread {
    request_tx: Sender<PipelineRequest>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl PipelineThread {
    /// Spawn the thread. With `watch_interval` set, every file of the current
    /// sheet is polled and a change queues a recompile.
    pub fn spawn(
        pipeline: Pipeline,
        watch_interval: Option<Duration>,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let (request_tx, request_rx) = unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let loopback = request_tx.clone();

        let handle = thread::Builder::new()
            .name("sheetplay-pipeline".into())
            .spawn(move || {
                pipeline_loop(&pipeline, &request_rx, loopback, watch_interval);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            request_tx,
            done_rx,
            handle: Some(handle),
            shutdown_timeout,
        })
    }

    /// Queue `request`. Returns `false` once the thread is gone.
    pub fn request(&self, request: PipelineRequest) -> bool {
        self.handle.is_some() && self.request_tx.send(request).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the thread to exit and wait at most `shutdown_timeout`.
    ///
    /// A compile already in progress is not interrupted; if it outlasts the
    /// timeout the thread is detached and `false` returned.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let _ = self.request_tx.send(PipelineRequest::Shutdown);

        match self.done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                debug!("Pipeline thread stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Pipeline thread did not stop within {:?}, detaching",
                    self.shutdown_timeout
                );
                false
            }
        }
    }
}

impl Drop for PipelineThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pipeline_loop(
    pipeline: &Pipeline,
    requests: &Receiver<PipelineRequest>,
    loopback: Sender<PipelineRequest>,
    watch_interval: Option<Duration>,
) {
    match pipeline.compiler().version() {
        Ok(version) => pipeline.events.info(format!("Compiler: {version}")),
        Err(e) => pipeline.events.warn(format!("Compiler version unavailable: {e}")),
    }

    #[cfg(feature = "watch")]
    let mut watcher = watch_interval.and_then(|interval| {
        crate::watcher::SheetWatcher::new(interval, move |_| {
            let _ = loopback.send(PipelineRequest::Recompile);
        })
        .map_err(|e| pipeline.events.warn(format!("File watching disabled: {e}")))
        .ok()
    });
    #[cfg(not(feature = "watch"))]
    let _ = (loopback, watch_interval);

    let mut current: Option<PathBuf> = None;

    while let Ok(first) = requests.recv() {
        // Coalesce a burst (one save touches several files) into one compile.
        let mut compile = false;
        for request in std::iter::once(first).chain(requests.try_iter()) {
            match request {
                PipelineRequest::Compile(path) => {
                    current = Some(path);
                    compile = true;
                }
                PipelineRequest::Recompile => compile = true,
                PipelineRequest::Shutdown => return,
            }
        }

        let Some(path) = current.as_deref().filter(|_| compile) else {
            continue;
        };
        let compiled = pipeline.compile(path);

        #[cfg(feature = "watch")]
        if let (Ok(set), Some(watcher)) = (&compiled, watcher.as_mut()) {
            watcher.watch_paths(&set.sheet().watched_paths());
        }
        #[cfg(not(feature = "watch"))]
        let _ = compiled;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

