//! Published playback state shared between the pipeline and the audio thread.
//!
//! ```text
//! ┌──────────────┐  publish()   ┌──────────────────────────┐  load()  ┌────────────────┐
//! │ pipeline     │─────────────▶│ ArcSwapOption<PlaybackSet>│◀─────────│ BlockScheduler │
//! │ (decode)     │              │ ArcSwap<MuteSet>          │          │ (audio thread) │
//! └──────────────┘              └──────────────────────────┘          └────────────────┘
//! ```
//!
//! A [`PlaybackSet`] owns its tracks *and* their cursors, so replacing the
//! set resets every cursor without touching the audio thread.

use crate::file::{DecodedSheet, Track};
use crate::mute::MuteSet;
use arc_swap::{ArcSwap, ArcSwapOption, Guard};
use sheetplay_core::{CompiledSheet, SharedTransport};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Everything the scheduler and broadcaster need from one compilation.
#[derive(Debug)]
pub struct PlaybackSet {
    sheet: Arc<CompiledSheet>,
    tracks: Vec<Track>,
    /// Next-to-emit index per track.
    cursors: Box<[AtomicUsize]>,
    seconds_per_quarter: f64,
    generation: u64,
}

impl PlaybackSet {
    pub fn new(sheet: Arc<CompiledSheet>, decoded: DecodedSheet) -> Self {
        let cursors = decoded.tracks.iter().map(|_| AtomicUsize::new(0)).collect();
        Self {
            sheet,
            tracks: decoded.tracks,
            cursors,
            seconds_per_quarter: decoded.seconds_per_quarter,
            generation: 0,
        }
    }

    #[inline]
    pub fn sheet(&self) -> &Arc<CompiledSheet> {
        &self.sheet
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[inline]
    pub fn cursor(&self, track: usize) -> Option<&AtomicUsize> {
        self.cursors.get(track)
    }

    #[inline]
    pub fn seconds_per_quarter(&self) -> f64 {
        self.seconds_per_quarter
    }

    /// Monotonic publish counter; 0 until published.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn track_names(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.name.clone()).collect()
    }

    pub fn track_index(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.name == name)
    }

    /// Resolve muted track names against this set. Unknown names are ignored.
    pub fn resolve_mutes<'a, I>(&self, names: I) -> MuteSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.track_index(name))
            .collect::<MuteSet>()
            .with_generation(self.generation)
    }
}

/// Lock-free handle to the current playback set, mutes and transport.
#[derive(Debug)]
pub struct SharedPlayback {
    set: ArcSwapOption<PlaybackSet>,
    mutes: ArcSwap<MuteSet>,
    transport: SharedTransport,
    generation: AtomicU64,
}

impl SharedPlayback {
    pub fn new() -> Self {
        Self {
            set: ArcSwapOption::empty(),
            mutes: ArcSwap::from_pointee(MuteSet::new()),
            transport: SharedTransport::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Replace the current set with every track audible. The audio thread
    /// sees it on its next load.
    pub fn publish(&self, set: PlaybackSet) -> Arc<PlaybackSet> {
        self.publish_with_mutes(set, MuteSet::new())
    }

    /// Install mutes resolved against `set`, then publish it.
    ///
    /// Both carry the new generation. Mutes are stored first, so a scheduler
    /// that sees the new set never pairs it with the old mutes.
    pub fn publish_with_mutes(&self, mut set: PlaybackSet, mutes: MuteSet) -> Arc<PlaybackSet> {
        set.generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.mutes
            .store(Arc::new(mutes.with_generation(set.generation)));
        let set = Arc::new(set);
        debug!(
            "Publishing playback set #{}: {} tracks",
            set.generation,
            set.tracks.len()
        );
        self.set.store(Some(Arc::clone(&set)));
        set
    }

    /// Drop the current set; the scheduler goes idle.
    pub fn clear(&self) {
        self.set.store(None);
    }

    /// RT-safe borrow of the current set.
    #[inline]
    pub fn load(&self) -> Guard<Option<Arc<PlaybackSet>>> {
        self.set.load()
    }

    /// Owned reference for off-thread consumers.
    pub fn current(&self) -> Option<Arc<PlaybackSet>> {
        self.set.load_full()
    }

    /// Replace the mutes of the current set. Callers serialize this with
    /// publishing so the indices match the set they are tagged with.
    pub fn set_mutes(&self, mutes: MuteSet) {
        let generation = self.set.load_full().map_or(0, |set| set.generation);
        self.mutes.store(Arc::new(mutes.with_generation(generation)));
    }

    #[inline]
    pub fn mutes(&self) -> Guard<Arc<MuteSet>> {
        self.mutes.load()
    }

    #[inline]
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }
}

impl Default for SharedPlayback {
    fn default() -> Self {
        Self::new()
    }
}
