//! Real-time block scheduler.
//!
//! Translates the host transport window of each processing cycle into
//! sample-offset MIDI events. Runs on the audio thread: it only loads the
//! published [`PlaybackSet`](crate::playback::PlaybackSet) through
//! `arc_swap`, touches atomics and pushes into pre-sized buffers.
//!
//! Per cycle:
//!
//! 1. Flush deferred note-offs that fall due.
//! 2. Without a transport, do nothing else.
//! 3. Mirror the transport into [`SharedTransport`](sheetplay_core::SharedTransport).
//! 4. On a play-to-stop edge send All-Notes-Off on all 16 channels and drop
//!    the deferred note-offs.
//! 5. On the play-start edge, or when `begin` is earlier than the previous
//!    cycle's, move every cursor to the first event at or after `begin`.
//! 6. While playing, walk every unmuted track over the closed window
//!    `[begin, begin + num_samples / sample_rate]`.

use crate::buffer::MidiBuffer;
use crate::event::MidiEvent;
use crate::file::Track;
use crate::note_off::NoteOffQueue;
use crate::playback::SharedPlayback;
use sheetplay_core::{CycleWindow, PlayerConfig, TransportPosition};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// MIDI channels covered by the stop-edge All-Notes-Off.
pub const MIDI_CHANNELS: u8 = 16;

/// What one call to [`BlockScheduler::process`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// The host reported no play-head; only due note-offs were flushed.
    TransportUnavailable,
    /// Transport not playing. `all_notes_off` is set on the stop edge.
    Stopped { all_notes_off: bool },
    /// Playing, but nothing has been published yet.
    Idle,
    /// Playing; `emitted` counts every event written this cycle.
    Playing { emitted: usize },
}

/// Per-track walk outcome, for the cursor store.
enum Walk {
    Skip,
    Done(usize),
}

/// Audio-thread half of the player.
#[derive(Debug)]
pub struct BlockScheduler {
    shared: Arc<SharedPlayback>,
    note_offs: NoteOffQueue,
    sample_rate: f64,
    max_block_size: usize,
    was_playing: bool,
    last_begin: Option<f64>,
    /// Cursors must be moved to the current position before the next walk.
    resync: bool,
}

impl BlockScheduler {
    pub fn new(shared: Arc<SharedPlayback>, config: &PlayerConfig) -> Self {
        Self {
            shared,
            note_offs: NoteOffQueue::with_capacity(config.note_off_capacity),
            sample_rate: config.sample_rate,
            max_block_size: config.max_block_size,
            was_playing: false,
            last_begin: None,
            resync: false,
        }
    }

    /// Host is (re)starting processing. Not real-time safe.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        debug!("Preparing scheduler: {sample_rate} Hz, max block {max_block_size}");
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.note_offs.clear();
        self.was_playing = false;
        self.last_begin = None;
        self.resync = false;
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    #[inline]
    pub fn shared(&self) -> &Arc<SharedPlayback> {
        &self.shared
    }

    /// Note-offs still waiting for a later cycle.
    #[inline]
    pub fn pending_note_offs(&self) -> usize {
        self.note_offs.len()
    }

    /// A buffer large enough that one cycle never reallocates it.
    pub fn output_buffer(&self) -> MidiBuffer {
        MidiBuffer::with_capacity(self.note_offs.capacity() + self.max_block_size * 2)
    }

    /// Run one cycle, appending to `out`.
    pub fn process(
        &mut self,
        transport: Option<TransportPosition>,
        num_samples: usize,
        out: &mut MidiBuffer,
    ) -> CycleStatus {
        let flushed = self.note_offs.tick(num_samples, out);

        let Some(position) = transport else {
            return CycleStatus::TransportUnavailable;
        };
        self.shared.transport().store(position);

        if !position.is_playing {
            if !self.was_playing {
                return CycleStatus::Stopped {
                    all_notes_off: false,
                };
            }
            self.was_playing = false;
            for channel in 0..MIDI_CHANNELS {
                out.push(MidiEvent::all_notes_off(0, channel));
            }
            self.note_offs.clear();
            return CycleStatus::Stopped {
                all_notes_off: true,
            };
        }
        let window = position.window(num_samples, self.sample_rate);
        let moved_back = self.last_begin.is_some_and(|prev| window.begin < prev);
        self.resync |= !self.was_playing || moved_back;
        self.was_playing = true;
        self.last_begin = Some(window.begin);

        let guard = self.shared.load();
        let Some(set) = &*guard else {
            return CycleStatus::Idle;
        };
        if set.tracks().is_empty() || num_samples == 0 {
            return CycleStatus::Idle;
        }

        let mutes = self.shared.mutes();
        if mutes.generation() > set.generation() {
            // A newer set is being published; its mutes are already in.
            return CycleStatus::Idle;
        }
        let apply_mutes = mutes.generation() == set.generation();
        let resync = std::mem::take(&mut self.resync);
        let mut emitted = flushed;

        for (idx, track) in set.tracks().iter().enumerate() {
            let Some(cursor) = set.cursor(idx) else {
                continue;
            };
            if resync {
                cursor.store(track.first_at_or_after(window.begin), Ordering::Relaxed);
            }
            if track.is_empty() || (apply_mutes && mutes.is_muted(idx)) {
                continue;
            }
            let start = cursor.load(Ordering::Relaxed);
            match self.walk(track, start, window, num_samples, out, &mut emitted) {
                Walk::Done(next) => cursor.store(next, Ordering::Relaxed),
                Walk::Skip => {}
            }
        }

        CycleStatus::Playing { emitted }
    }

    /// Emit the events of one track that fall in `window`.
    fn walk(
        &mut self,
        track: &Track,
        cursor: usize,
        window: CycleWindow,
        num_samples: usize,
        out: &mut MidiBuffer,
        emitted: &mut usize,
    ) -> Walk {
        let events = &track.events;
        if cursor > events.len() {
            // Corrupt cursor: skip this cycle, clamp for the next.
            return Walk::Done(events.len());
        }

        // Window starts before the last passed event: the transport moved
        // back, so restart at the first event at or after `begin`. A cursor
        // at the end that did not move back means the track is finished.
        let mut pos = match cursor.checked_sub(1).map(|i| events[i].time) {
            Some(passed) if window.begin < passed => track.first_at_or_after(window.begin),
            _ if cursor == events.len() => return Walk::Skip,
            _ => cursor,
        };

        // Forward jump past pending events.
        if events.get(pos).is_some_and(|e| e.time < window.begin) {
            pos += events[pos..].partition_point(|e| e.time < window.begin);
        }

        let last_sample = num_samples - 1;
        while let Some(entry) = events.get(pos) {
            if entry.time > window.end {
                break;
            }
            pos += 1;
            if entry.is_note_off() {
                continue;
            }

            let offset = self.offset_of(entry.time, window.begin).min(last_sample);
            out.push(entry.event.with_offset(offset));
            *emitted += 1;

            let Some(off) = entry.note_off.and_then(|i| events.get(i)) else {
                continue;
            };
            let remaining = ((off.time - window.begin) * self.sample_rate).max(0.0) as i64;
            if remaining < num_samples as i64 {
                out.push(off.event.with_offset(remaining as usize));
                *emitted += 1;
            } else if let Err(event) = self.note_offs.try_defer(off.event, remaining) {
                out.push(event.with_offset(last_sample));
                *emitted += 1;
            }
        }

        Walk::Done(pos)
    }

    #[inline]
    fn offset_of(&self, time: f64, begin: f64) -> usize {
        ((time - begin) * self.sample_rate).max(0.0) as usize
    }
}
