use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, TrafficJamError};

/// Highest value a MIDI data byte can carry.
pub const MAX_DATA: u8 = 127;
/// Highest MIDI channel number (zero based).
pub const MAX_CHANNEL: u8 = 15;

/// Identifies one physical element on the controller surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ControlId {
    /// Grid pad addressed by note number.
    Pad(u8),
    /// Illuminated button addressed by CC number.
    Cc(u8),
    /// Touch strip addressed by CC number. Strips carry no colour.
    Strip(u8),
}

impl ControlId {
    /// Note or CC number the control is addressed by.
    pub fn index(self) -> u8 {
        match self {
            ControlId::Pad(index) | ControlId::Cc(index) | ControlId::Strip(index) => index,
        }
    }

    /// Whether the control has an LED that takes a colour.
    pub fn is_illuminated(self) -> bool {
        !matches!(self, ControlId::Strip(_))
    }

    /// Message kind the control natively speaks.
    pub fn native_kind(self) -> OutputKind {
        match self {
            ControlId::Pad(_) => OutputKind::Note,
            ControlId::Cc(_) | ControlId::Strip(_) => OutputKind::Cc,
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlId::Pad(index) => write!(f, "pad{index}"),
            ControlId::Cc(index) => write!(f, "cc{index}"),
            ControlId::Strip(index) => write!(f, "strip{index}"),
        }
    }
}

impl FromStr for ControlId {
    type Err = TrafficJamError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        let (ctor, digits): (fn(u8) -> ControlId, &str) =
            if let Some(rest) = key.strip_prefix("strip") {
                (ControlId::Strip, rest)
            } else if let Some(rest) = key.strip_prefix("pad") {
                (ControlId::Pad, rest)
            } else if let Some(rest) = key.strip_prefix("cc") {
                (ControlId::Cc, rest)
            } else {
                (ControlId::Pad, key.as_str())
            };

        let index: u8 = digits
            .parse()
            .map_err(|_| TrafficJamError::config(format!("control `{s}`"), "not a control key"))?;
        if index > MAX_DATA {
            return Err(TrafficJamError::config(
                format!("control `{s}`"),
                format!("index {index} is outside 0..=127"),
            ));
        }
        Ok(ctor(index))
    }
}

impl TryFrom<String> for ControlId {
    type Error = TrafficJamError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ControlId> for String {
    fn from(value: ControlId) -> Self {
        value.to_string()
    }
}

/// Family of outgoing message a mapping produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Note,
    Cc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NoteOn,
    NoteOff,
    ControlChange,
}

impl MessageKind {
    fn status_nibble(self) -> u8 {
        match self {
            MessageKind::NoteOff => 0x80,
            MessageKind::NoteOn => 0x90,
            MessageKind::ControlChange => 0xB0,
        }
    }
}

/// A single channel voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    pub kind: MessageKind,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(MessageKind::NoteOn, channel, note, velocity)
    }

    pub fn control_change(channel: u8, control: u8, value: u8) -> Self {
        Self::new(MessageKind::ControlChange, channel, control, value)
    }

    /// Builds a message, masking every field into its legal range.
    pub fn new(kind: MessageKind, channel: u8, data1: u8, data2: u8) -> Self {
        Self {
            kind,
            channel: channel & 0x0F,
            data1: data1 & 0x7F,
            data2: data2 & 0x7F,
        }
    }

    /// Wire representation.
    pub fn to_bytes(&self) -> [u8; 3] {
        [
            self.kind.status_nibble() | self.channel,
            self.data1,
            self.data2,
        ]
    }

    /// Decodes a raw channel voice message. Anything other than note on/off
    /// and control change yields `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, rest) = bytes.split_first()?;
        let channel = status & 0x0F;
        let kind = match status & 0xF0 {
            0x80 => MessageKind::NoteOff,
            0x90 => MessageKind::NoteOn,
            0xB0 => MessageKind::ControlChange,
            _ => return None,
        };
        let data1 = *rest.first()?;
        let data2 = *rest.get(1)?;
        if data1 > MAX_DATA || data2 > MAX_DATA {
            return None;
        }

        // Running devices commonly send note-on with velocity 0 as a release.
        let kind = match kind {
            MessageKind::NoteOn if data2 == 0 => MessageKind::NoteOff,
            other => other,
        };
        Some(Self {
            kind,
            channel,
            data1,
            data2,
        })
    }
}

/// Checks an authored data value, reporting `context` on failure.
pub fn checked_data(value: i64, context: &str) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|value| *value <= MAX_DATA)
        .ok_or_else(|| {
            TrafficJamError::config(context, format!("value {value} is outside 0..=127"))
        })
}

/// Checks an authored channel number, reporting `context` on failure.
pub fn checked_channel(value: i64, context: &str) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|value| *value <= MAX_CHANNEL)
        .ok_or_else(|| {
            TrafficJamError::config(context, format!("channel {value} is outside 0..=15"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_keys() {
        assert_eq!("12".parse::<ControlId>().unwrap(), ControlId::Pad(12));
        assert_eq!("pad63".parse::<ControlId>().unwrap(), ControlId::Pad(63));
        assert_eq!("CC8".parse::<ControlId>().unwrap(), ControlId::Cc(8));
        assert_eq!("strip2".parse::<ControlId>().unwrap(), ControlId::Strip(2));
        assert!("knob1".parse::<ControlId>().is_err());
        assert!("cc200".parse::<ControlId>().unwrap_err().is_configuration());
    }

    #[test]
    fn control_ids_round_trip_through_json() {
        let json = serde_json::to_string(&ControlId::Cc(9)).unwrap();
        assert_eq!(json, "\"cc9\"");
        let parsed: ControlId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ControlId::Cc(9));
    }

    #[test]
    fn encodes_status_with_channel() {
        let message = MidiMessage::note_on(3, 60, 100);
        assert_eq!(message.to_bytes(), [0x93, 60, 100]);
        let cc = MidiMessage::control_change(0, 8, 127);
        assert_eq!(cc.to_bytes(), [0xB0, 8, 127]);
    }

    #[test]
    fn decodes_zero_velocity_note_on_as_release() {
        let message = MidiMessage::from_bytes(&[0x90, 12, 0]).unwrap();
        assert_eq!(message.kind, MessageKind::NoteOff);
        assert_eq!(message.data1, 12);

        let press = MidiMessage::from_bytes(&[0x91, 12, 127]).unwrap();
        assert_eq!(press.kind, MessageKind::NoteOn);
        assert_eq!(press.channel, 1);
    }

    #[test]
    fn ignores_unsupported_or_truncated_messages() {
        assert!(MidiMessage::from_bytes(&[0xE0, 0, 64]).is_none());
        assert!(MidiMessage::from_bytes(&[0xB0, 1]).is_none());
        assert!(MidiMessage::from_bytes(&[]).is_none());
    }

    #[test]
    fn rejects_out_of_range_authored_values() {
        assert_eq!(checked_data(127, "x").unwrap(), 127);
        assert!(checked_data(128, "x").is_err());
        assert!(checked_data(-1, "x").is_err());
        assert!(checked_channel(16, "x").is_err());
    }
}
