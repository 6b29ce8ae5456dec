//! Note-offs due beyond the current cycle.
//!
//! A note-off whose sample offset lands past the end of the cycle that
//! triggered its note-on is parked here with the remaining sample count,
//! measured from the start of that cycle. Each [`NoteOffQueue::tick`] first
//! subtracts the length of the cycle that just elapsed, then flushes every
//! entry that now falls inside the new cycle.

use crate::buffer::MidiBuffer;
use crate::event::MidiEvent;
use std::mem;

/// A parked note-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingNoteOff {
    pub event: MidiEvent,
    /// Samples from the start of the most recently ticked cycle.
    pub remaining: i64,
}

/// Fixed-capacity deferral queue, owned by the audio thread.
#[derive(Debug)]
pub struct NoteOffQueue {
    entries: Vec<PendingNoteOff>,
    capacity: usize,
    /// Length passed to the previous `tick`, i.e. the cycle now ending.
    last_cycle_len: usize,
}

impl NoteOffQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            last_cycle_len: 0,
        }
    }

    /// Park `event` for `remaining` samples from the start of the current cycle.
    ///
    /// Returns the event back if the queue is full.
    #[inline]
    pub fn try_defer(&mut self, event: MidiEvent, remaining: i64) -> Result<(), MidiEvent> {
        if self.entries.len() >= self.capacity {
            return Err(event);
        }
        self.entries.push(PendingNoteOff { event, remaining });
        Ok(())
    }

    /// Advance by the elapsed cycle and flush everything due in this one.
    ///
    /// Returns the number of note-offs written to `out`.
    pub fn tick(&mut self, cycle_len: usize, out: &mut MidiBuffer) -> usize {
        let elapsed = mem::replace(&mut self.last_cycle_len, cycle_len) as i64;
        if self.entries.is_empty() {
            return 0;
        }

        let last_sample = cycle_len.saturating_sub(1) as i64;
        let mut flushed = 0;
        self.entries.retain_mut(|entry| {
            entry.remaining -= elapsed;
            if entry.remaining <= cycle_len as i64 {
                let offset = entry.remaining.clamp(0, last_sample) as usize;
                out.push(entry.event.with_offset(offset));
                flushed += 1;
                false
            } else {
                true
            }
        });
        flushed
    }

    /// Drop every parked note-off.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingNoteOff> + '_ {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off(note: u8) -> MidiEvent {
        MidiEvent::note_off(0, 0, note, 0)
    }

    #[test]
    fn test_flushes_in_due_cycle() {
        let mut queue = NoteOffQueue::with_capacity(4);
        let mut out = MidiBuffer::with_capacity(8);

        // Cycle 0: note-off 1300 samples out.
        queue.tick(512, &mut out);
        queue.try_defer(off(60), 1300).unwrap();

        // Cycle 1: 788 remaining, not yet due.
        assert_eq!(queue.tick(512, &mut out), 0);
        assert_eq!(queue.pending().next().unwrap().remaining, 788);

        // Cycle 2: 276 remaining, due.
        assert_eq!(queue.tick(512, &mut out), 1);
        assert_eq!(out.as_slice()[0].frame_offset, 276);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_variable_cycle_lengths() {
        let mut queue = NoteOffQueue::with_capacity(4);
        let mut out = MidiBuffer::new();

        queue.tick(256, &mut out);
        queue.try_defer(off(60), 600).unwrap();
        // 600 - 256 = 344, beyond a 128 cycle.
        assert_eq!(queue.tick(128, &mut out), 0);
        // 344 - 128 = 216, inside a 1024 cycle.
        assert_eq!(queue.tick(1024, &mut out), 1);
        assert_eq!(out.as_slice()[0].frame_offset, 216);
    }

    #[test]
    fn test_remaining_equal_to_cycle_is_clamped() {
        let mut queue = NoteOffQueue::with_capacity(1);
        let mut out = MidiBuffer::new();

        queue.tick(64, &mut out);
        queue.try_defer(off(60), 128).unwrap();
        assert_eq!(queue.tick(64, &mut out), 1);
        assert_eq!(out.as_slice()[0].frame_offset, 63);
    }

    #[test]
    fn test_full_queue_returns_event() {
        let mut queue = NoteOffQueue::with_capacity(1);
        queue.try_defer(off(60), 1000).unwrap();
        let rejected = queue.try_defer(off(61), 1000).unwrap_err();
        assert_eq!(rejected.note(), Some(61));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut queue = NoteOffQueue::with_capacity(2);
        let mut out = MidiBuffer::new();
        queue.tick(64, &mut out);
        queue.try_defer(off(60), 100).unwrap();
        queue.clear();
        assert_eq!(queue.tick(64, &mut out), 0);
        assert!(out.is_empty());
    }
}
