use serde::{Deserialize, Serialize};

use crate::{
    engine::VisualUpdate,
    midi::{ControlId, MessageKind, MidiMessage},
};

/// Outbound side of the controller connection. Calls must be delivered in
/// submission order; no acknowledgement is expected.
pub trait Surface {
    /// Relays a translated message to the downstream instrument.
    fn send_midi(&mut self, message: MidiMessage);
    /// Sets the LED colour of an illuminated control.
    fn set_color(&mut self, control: ControlId, color: u8);
    /// Moves the LED bar of a touch strip to `position`.
    fn set_strip(&mut self, control: ControlId, position: u8);
}

/// Inclusive range of note or CC numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub first: u8,
    pub last: u8,
}

impl IndexRange {
    pub const fn new(first: u8, last: u8) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, index: u8) -> bool {
        (self.first..=self.last).contains(&index)
    }
}

/// How raw device messages map onto controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceLayout {
    /// MIDI channel the controller talks on. Input on other channels is
    /// ignored and feedback is sent on this channel.
    pub channel: u8,
    pub pads: IndexRange,
    pub cc_buttons: IndexRange,
    pub strips: IndexRange,
}

impl Default for SurfaceLayout {
    /// Maschine Jam in MIDI mode: 8x8 pad grid, 16 transport buttons and
    /// 8 touch strips.
    fn default() -> Self {
        Self {
            channel: 0,
            pads: IndexRange::new(0, 63),
            cc_buttons: IndexRange::new(0, 15),
            strips: IndexRange::new(48, 55),
        }
    }
}

impl SurfaceLayout {
    /// Control and value carried by a raw input message, if it belongs to
    /// the surface.
    pub fn decode(&self, message: &MidiMessage) -> Option<(ControlId, u8)> {
        if message.channel != self.channel {
            return None;
        }
        match message.kind {
            MessageKind::NoteOn if self.pads.contains(message.data1) => {
                Some((ControlId::Pad(message.data1), message.data2))
            }
            MessageKind::NoteOff if self.pads.contains(message.data1) => {
                Some((ControlId::Pad(message.data1), 0))
            }
            MessageKind::ControlChange if self.cc_buttons.contains(message.data1) => {
                Some((ControlId::Cc(message.data1), message.data2))
            }
            MessageKind::ControlChange if self.strips.contains(message.data1) => {
                Some((ControlId::Strip(message.data1), message.data2))
            }
            _ => None,
        }
    }

    /// Message that sets `color` on `control`. Strips have no LED colour.
    pub fn color_message(&self, control: ControlId, color: u8) -> Option<MidiMessage> {
        match control {
            ControlId::Pad(note) => Some(MidiMessage::note_on(self.channel, note, color)),
            ControlId::Cc(number) => Some(MidiMessage::control_change(self.channel, number, color)),
            ControlId::Strip(_) => None,
        }
    }

    /// Message that lights a touch strip up to `position`.
    pub fn strip_message(&self, control: ControlId, position: u8) -> Option<MidiMessage> {
        match control {
            ControlId::Strip(number) => {
                Some(MidiMessage::control_change(self.channel, number, position))
            }
            ControlId::Pad(_) | ControlId::Cc(_) => None,
        }
    }
}

/// Something submitted to a [`RecordingSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Midi(MidiMessage),
    Color(VisualUpdate),
    Strip(ControlId, u8),
}

/// In-memory surface that keeps everything it was sent, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    events: Vec<SurfaceEvent>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SurfaceEvent] {
        &self.events
    }

    /// Drains the recorded events.
    pub fn take(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn midi(&self) -> Vec<MidiMessage> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SurfaceEvent::Midi(message) => Some(*message),
                _ => None,
            })
            .collect()
    }

    pub fn colors(&self) -> Vec<VisualUpdate> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SurfaceEvent::Color(update) => Some(*update),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn send_midi(&mut self, message: MidiMessage) {
        self.events.push(SurfaceEvent::Midi(message));
    }

    fn set_color(&mut self, control: ControlId, color: u8) {
        self.events.push(SurfaceEvent::Color(VisualUpdate { control, color }));
    }

    fn set_strip(&mut self, control: ControlId, position: u8) {
        self.events.push(SurfaceEvent::Strip(control, position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_default_layout() {
        let layout = SurfaceLayout::default();

        let press = MidiMessage::from_bytes(&[0x90, 12, 127]).unwrap();
        assert_eq!(layout.decode(&press), Some((ControlId::Pad(12), 127)));

        let release = MidiMessage::from_bytes(&[0x80, 12, 64]).unwrap();
        assert_eq!(layout.decode(&release), Some((ControlId::Pad(12), 0)));

        let button = MidiMessage::control_change(0, 9, 127);
        assert_eq!(layout.decode(&button), Some((ControlId::Cc(9), 127)));

        let strip = MidiMessage::control_change(0, 50, 90);
        assert_eq!(layout.decode(&strip), Some((ControlId::Strip(50), 90)));

        assert_eq!(layout.decode(&MidiMessage::control_change(0, 100, 1)), None);
        assert_eq!(layout.decode(&MidiMessage::note_on(0, 90, 1)), None);
    }

    #[test]
    fn colour_messages_use_the_control_family() {
        let layout = SurfaceLayout::default();
        assert_eq!(
            layout.color_message(ControlId::Pad(3), 10),
            Some(MidiMessage::note_on(0, 3, 10))
        );
        assert_eq!(
            layout.color_message(ControlId::Cc(8), 34),
            Some(MidiMessage::control_change(0, 8, 34))
        );
        assert_eq!(layout.color_message(ControlId::Strip(48), 1), None);
    }

    #[test]
    fn strip_feedback_is_a_control_change() {
        let layout = SurfaceLayout::default();
        assert_eq!(
            layout.strip_message(ControlId::Strip(50), 90),
            Some(MidiMessage::control_change(0, 50, 90))
        );
        assert_eq!(layout.strip_message(ControlId::Pad(50), 90), None);
    }

    #[test]
    fn only_listens_on_its_channel() {
        let layout = SurfaceLayout {
            channel: 3,
            ..SurfaceLayout::default()
        };
        assert_eq!(layout.decode(&MidiMessage::note_on(0, 12, 127)), None);
        assert_eq!(
            layout.decode(&MidiMessage::note_on(3, 12, 127)),
            Some((ControlId::Pad(12), 127))
        );
        assert_eq!(
            layout.color_message(ControlId::Cc(8), 34),
            Some(MidiMessage::control_change(3, 8, 34))
        );
    }

    #[test]
    fn layout_reads_partial_json() {
        let layout: SurfaceLayout =
            serde_json::from_str(r#"{ "strips": { "first": 48, "last": 111 } }"#).unwrap();
        assert!(layout.strips.contains(111));
        assert_eq!(layout.pads, IndexRange::new(0, 63));
        assert_eq!(layout.channel, 0);
    }

    #[test]
    fn recording_surface_keeps_submission_order() {
        let mut surface = RecordingSurface::new();
        surface.set_color(ControlId::Pad(1), 10);
        surface.send_midi(MidiMessage::note_on(0, 1, 127));

        assert_eq!(surface.events().len(), 2);
        assert!(matches!(surface.events()[0], SurfaceEvent::Color(_)));
        assert_eq!(surface.midi(), vec![MidiMessage::note_on(0, 1, 127)]);
        assert_eq!(surface.take().len(), 2);
        assert!(surface.events().is_empty());
    }
}
