//! Per-cycle output buffer handed to the host.

use crate::event::MidiEvent;

/// Offset-ordered MIDI events for one processing cycle.
///
/// Insertion keeps the buffer sorted by `frame_offset`; events sharing an
/// offset stay in the order they were pushed. Capacity is reserved up front
/// by [`MidiBuffer::with_capacity`] so steady-state pushes do not allocate.
#[derive(Debug, Clone, Default)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

impl MidiBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    /// Insert after every event with an offset `<=` the new one.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) {
        let at = self
            .events
            .partition_point(|e| e.frame_offset <= event.frame_offset);
        self.events.insert(at, event);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.events.reserve(additional);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MidiEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }
}

impl<'a> IntoIterator for &'a MidiBuffer {
    type Item = &'a MidiEvent;
    type IntoIter = std::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_insert_is_stable() {
        let mut buffer = MidiBuffer::with_capacity(8);
        buffer.push(MidiEvent::note_on(10, 0, 60, 100));
        buffer.push(MidiEvent::note_on(0, 0, 62, 100));
        buffer.push(MidiEvent::note_off(10, 0, 64, 0));
        buffer.push(MidiEvent::note_on(5, 0, 65, 100));

        let notes: Vec<(usize, u8)> = buffer
            .iter()
            .map(|e| (e.frame_offset, e.note().unwrap()))
            .collect();
        assert_eq!(notes, vec![(0, 62), (5, 65), (10, 60), (10, 64)]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = MidiBuffer::with_capacity(16);
        buffer.push(MidiEvent::note_on(0, 0, 60, 100));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 16);
    }
}
