//! Builder for configuring and constructing a `SheetPlayer`.

use crate::compiler::{ExternalCompiler, SheetCompiler};
use crate::events::{EventHub, PlayerListener};
use crate::pipeline::{MutedTracks, Pipeline, PipelineThread};
use crate::preferences::Preferences;
use crate::{Result, SheetPlayer};
use sheetplay_core::PlayerConfig;
use sheetplay_midi::SharedPlayback;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "broadcast")]
use sheetplay_broadcast::{BroadcastConfig, PositionBroadcaster};

/// Without an explicit compiler, `build()` locates the `sheetc` executable
/// using the preferences' `bin_path`, then `PATH`.
///
/// # Example
///
/// ```ignore
/// use sheetplay::prelude::*;
///
/// let player = SheetPlayer::builder()
///     .sample_rate(48000.0)
///     .preferences(Preferences::load()?)
///     .build()?;
///
/// player.open_sheet("/songs/blues.sheet");
/// let mut scheduler = player.scheduler();
/// ```
pub struct SheetPlayerBuilder {
    config: PlayerConfig,
    compiler: Option<Arc<dyn SheetCompiler>>,
    bin_path: Option<PathBuf>,
    listener: Option<Arc<dyn PlayerListener>>,
    watch: bool,

    #[cfg(feature = "broadcast")]
    broadcast: bool,

    #[cfg(feature = "broadcast")]
    lease_dir: Option<PathBuf>,
}

impl Default for SheetPlayerBuilder {
    fn default() -> Self {
        Self {
            config: PlayerConfig::default(),
            compiler: None,
            bin_path: None,
            listener: None,
            watch: cfg!(feature = "watch"),

            #[cfg(feature = "broadcast")]
            broadcast: true,

            #[cfg(feature = "broadcast")]
            lease_dir: None,
        }
    }
}

impl SheetPlayerBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100.0
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 512
    pub fn max_block_size(mut self, frames: usize) -> Self {
        self.config.max_block_size = frames;
        self
    }

    /// Apply persisted preferences: compiler directory and broadcast port.
    pub fn preferences(mut self, prefs: Preferences) -> Self {
        self.bin_path = prefs.bin_path;
        self.config.broadcast_port = prefs.broadcast_port;
        self
    }

    /// Use `compiler` instead of locating `sheetc`.
    pub fn compiler(mut self, compiler: impl SheetCompiler + 'static) -> Self {
        self.compiler = Some(Arc::new(compiler));
        self
    }

    pub fn listener(mut self, listener: Arc<dyn PlayerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Recompile when a source file changes. Default: on with the `watch` feature.
    pub fn watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Default: 50 ms
    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.config.watch_interval = interval;
        self
    }

    /// Default: true
    #[cfg(feature = "broadcast")]
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// Default: 7935
    pub fn broadcast_port(mut self, port: u16) -> Self {
        self.config.broadcast_port = port;
        self
    }

    /// Default: 50 ms
    pub fn broadcast_interval(mut self, interval: Duration) -> Self {
        self.config.broadcast_interval = interval;
        self
    }

    /// Directory for broadcast lease files. Default: the system temp dir.
    #[cfg(feature = "broadcast")]
    pub fn lease_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lease_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<SheetPlayer> {
        self.config.validate()?;

        let compiler: Arc<dyn SheetCompiler> = match self.compiler {
            Some(compiler) => compiler,
            None => Arc::new(ExternalCompiler::locate(self.bin_path.as_deref())?),
        };

        let playback = Arc::new(SharedPlayback::new());
        let events = Arc::new(EventHub::new(self.config.log_buffer_capacity));
        if let Some(listener) = self.listener {
            events.set_listener(listener);
        }
        let muted = MutedTracks::default();

        let pipeline = Pipeline::new(
            compiler,
            Arc::clone(&playback),
            Arc::clone(&events),
            Arc::clone(&muted),
        );
        let watch_interval = self.watch.then_some(self.config.watch_interval);
        let pipeline_thread = PipelineThread::spawn(
            pipeline.clone(),
            watch_interval,
            self.config.shutdown_timeout,
        )?;

        #[cfg(feature = "broadcast")]
        let broadcaster = if self.broadcast {
            let mut config = BroadcastConfig::from(&self.config);
            config.lease_dir = self.lease_dir;
            Some(PositionBroadcaster::start(Arc::clone(&playback), config)?)
        } else {
            None
        };

        Ok(SheetPlayer::from_parts(
            self.config,
            playback,
            events,
            muted,
            pipeline,
            pipeline_thread,
            #[cfg(feature = "broadcast")]
            broadcaster,
        ))
    }
}
