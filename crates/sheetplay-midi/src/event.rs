//! RT-safe MIDI event types with sample-accurate timing.

use midi_msg::{Channel, ChannelModeMsg, ChannelVoiceMsg, MidiMsg};

/// Message payload the scheduler can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    Voice(ChannelVoiceMsg),
    /// Channel mode message 123, sent on transport stop.
    AllNotesOff,
}

/// MIDI event with a frame offset inside the current cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset within the current buffer (0 = first sample).
    pub frame_offset: usize,
    pub channel: Channel,
    pub msg: MidiMessage,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame_offset: usize, channel: Channel, msg: ChannelVoiceMsg) -> Self {
        Self {
            frame_offset,
            channel,
            msg: MidiMessage::Voice(msg),
        }
    }

    #[inline]
    pub fn note_on(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(
            frame_offset,
            Channel::from_u8(channel),
            ChannelVoiceMsg::NoteOn { note, velocity },
        )
    }

    #[inline]
    pub fn note_off(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(
            frame_offset,
            Channel::from_u8(channel),
            ChannelVoiceMsg::NoteOff { note, velocity },
        )
    }

    #[inline]
    pub fn all_notes_off(frame_offset: usize, channel: u8) -> Self {
        Self {
            frame_offset,
            channel: Channel::from_u8(channel),
            msg: MidiMessage::AllNotesOff,
        }
    }

    #[inline]
    pub fn with_offset(mut self, frame_offset: usize) -> Self {
        self.frame_offset = frame_offset;
        self
    }

    #[inline]
    pub fn channel_num(&self) -> u8 {
        self.channel as u8
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(
            self.msg,
            MidiMessage::Voice(ChannelVoiceMsg::NoteOn { velocity, .. }) if velocity > 0
        )
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.msg,
            MidiMessage::Voice(
                ChannelVoiceMsg::NoteOff { .. } | ChannelVoiceMsg::NoteOn { velocity: 0, .. }
            )
        )
    }

    #[inline]
    pub fn is_all_notes_off(&self) -> bool {
        matches!(self.msg, MidiMessage::AllNotesOff)
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.msg {
            MidiMessage::Voice(
                ChannelVoiceMsg::NoteOn { note, .. }
                | ChannelVoiceMsg::NoteOff { note, .. }
                | ChannelVoiceMsg::PolyPressure { note, .. },
            ) => Some(note),
            _ => None,
        }
    }

    #[inline]
    pub fn to_midi_msg(&self) -> MidiMsg {
        match self.msg {
            MidiMessage::Voice(msg) => MidiMsg::ChannelVoice {
                channel: self.channel,
                msg,
            },
            MidiMessage::AllNotesOff => MidiMsg::ChannelMode {
                channel: self.channel,
                msg: ChannelModeMsg::AllNotesOff,
            },
        }
    }

    /// Wire bytes. Allocates; not for the audio thread.
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_midi_msg().to_midi()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = MidiEvent::note_on(100, 0, 60, 100);
        assert!(event.is_note_on());
        assert!(!event.is_note_off());
        assert_eq!(event.note(), Some(60));
        assert_eq!(event.channel_num(), 0);
        assert_eq!(event.frame_offset, 100);
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let event = MidiEvent::note_on(0, 0, 60, 0);
        assert!(event.is_note_off());
        assert!(!event.is_note_on());
    }

    #[test]
    fn test_all_notes_off_bytes() {
        let event = MidiEvent::all_notes_off(0, 9);
        assert!(event.is_all_notes_off());
        assert_eq!(event.note(), None);
        assert_eq!(event.to_bytes(), vec![0xB9, 123, 0]);
    }

    #[test]
    fn test_note_off_bytes() {
        let event = MidiEvent::note_off(0, 2, 64, 0);
        assert_eq!(event.to_bytes(), vec![0x82, 64, 0]);
    }

    #[test]
    fn test_with_offset() {
        let event = MidiEvent::note_on(0, 0, 60, 90).with_offset(480);
        assert_eq!(event.frame_offset, 480);
    }
}
