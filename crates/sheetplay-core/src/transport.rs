//! Host transport position and the lock-free reference the broadcaster reads.

use atomic_float::AtomicF64;
use std::sync::atomic::{AtomicBool, Ordering};

/// Seconds per quarter note when the piece carries no tempo event (120 BPM).
pub const DEFAULT_SECONDS_PER_QUARTER: f64 = 0.5;

/// What the host play-head reports at the start of a processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportPosition {
    /// Transport time at the first sample of the cycle.
    pub time_seconds: f64,
    pub is_playing: bool,
}

impl TransportPosition {
    #[inline]
    pub const fn playing(time_seconds: f64) -> Self {
        Self {
            time_seconds,
            is_playing: true,
        }
    }

    #[inline]
    pub const fn stopped(time_seconds: f64) -> Self {
        Self {
            time_seconds,
            is_playing: false,
        }
    }

    /// The closed window `[begin, end]` covered by a cycle of `num_samples`.
    #[inline]
    pub fn window(&self, num_samples: usize, sample_rate: f64) -> CycleWindow {
        CycleWindow {
            begin: self.time_seconds,
            end: self.time_seconds + num_samples as f64 / sample_rate,
        }
    }
}

/// Time window of one processing cycle, in seconds. Both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleWindow {
    pub begin: f64,
    pub end: f64,
}

impl CycleWindow {
    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        self.begin <= time && time <= self.end
    }
}

/// Convert elapsed seconds to quarter notes at a fixed tempo.
#[inline]
pub fn seconds_to_quarters(seconds: f64, seconds_per_quarter: f64) -> f64 {
    if seconds_per_quarter > 0.0 {
        seconds / seconds_per_quarter
    } else {
        seconds / DEFAULT_SECONDS_PER_QUARTER
    }
}

/// Latest transport state, written by the audio thread every cycle and read
/// by off-thread consumers.
#[derive(Debug)]
#[repr(align(64))]
pub struct SharedTransport {
    seconds: AtomicF64,
    playing: AtomicBool,
}

impl SharedTransport {
    pub fn new() -> Self {
        Self {
            seconds: AtomicF64::new(0.0),
            playing: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn store(&self, position: TransportPosition) {
        self.seconds.store(position.time_seconds, Ordering::Release);
        self.playing.store(position.is_playing, Ordering::Release);
    }

    #[inline]
    pub fn load(&self) -> TransportPosition {
        TransportPosition {
            time_seconds: self.seconds.load(Ordering::Acquire),
            is_playing: self.playing.load(Ordering::Acquire),
        }
    }

    #[inline]
    pub fn seconds(&self) -> f64 {
        self.seconds.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

impl Default for SharedTransport {
    fn default() -> Self {
        Self::new()
    }
}
