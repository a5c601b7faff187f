use serde::{Deserialize, Serialize};

use crate::{
    clock::TransportCommand,
    midi::{ControlId, MidiMessage, OutputKind},
};

/// Logical activation of a control, driven by press and release events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonState {
    Active,
    #[default]
    Inactive,
}

impl ButtonState {
    /// State implied by an input value. Any non-zero value is a press.
    pub fn from_value(value: u8) -> Self {
        if value == 0 {
            ButtonState::Inactive
        } else {
            ButtonState::Active
        }
    }
}

/// Device colour value per [`ButtonState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedColors {
    pub active: u8,
    pub inactive: u8,
}

impl LedColors {
    pub fn for_state(&self, state: ButtonState) -> u8 {
        match state {
            ButtonState::Active => self.active,
            ButtonState::Inactive => self.inactive,
        }
    }
}

/// How the input value becomes the outgoing data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueRule {
    /// The input value is sent unchanged.
    #[default]
    Forward,
    /// Press sends `on`, release sends `off`.
    Gate { on: u8, off: u8 },
}

impl ValueRule {
    pub fn apply(&self, value: u8) -> u8 {
        match *self {
            ValueRule::Forward => value,
            ValueRule::Gate { on, off } => match ButtonState::from_value(value) {
                ButtonState::Active => on,
                ButtonState::Inactive => off,
            },
        }
    }
}

/// Side effect attached to a control, fired when it becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Print(String),
    Transport(TransportCommand),
}

/// Translation rule and colour association for one control within a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub control: ControlId,
    pub channel: u8,
    pub kind: OutputKind,
    /// Note or CC numbers emitted, in order, for every input event.
    pub targets: Vec<u8>,
    pub value: ValueRule,
    pub colors: Option<LedColors>,
    pub action: Option<Action>,
}

impl Mapping {
    /// A mapping that relays the control to the same note/CC number on
    /// channel 0.
    pub fn passthrough(control: ControlId) -> Self {
        Self {
            control,
            channel: 0,
            kind: control.native_kind(),
            targets: vec![control.index()],
            value: ValueRule::Forward,
            colors: None,
            action: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Outgoing messages for one input value, one per target in authoring
    /// order. Depends on nothing but `value` and the mapping itself.
    pub fn translate(&self, value: u8) -> Vec<MidiMessage> {
        let data = self.value.apply(value);
        self.targets
            .iter()
            .map(|&target| match self.kind {
                OutputKind::Note => MidiMessage::note_on(self.channel, target, data),
                OutputKind::Cc => MidiMessage::control_change(self.channel, target, data),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_in_authoring_order() {
        let mapping = Mapping {
            control: ControlId::Pad(17),
            channel: 2,
            kind: OutputKind::Note,
            targets: vec![43, 45, 46],
            value: ValueRule::Forward,
            colors: None,
            action: None,
        };

        let notes: Vec<u8> = mapping.translate(100).iter().map(|m| m.data1).collect();
        assert_eq!(notes, vec![43, 45, 46]);
        let messages = mapping.translate(100);
        assert!(messages.iter().all(|m| m.channel == 2 && m.data2 == 100));
    }

    #[test]
    fn gate_rule_maps_press_and_release() {
        let rule = ValueRule::Gate { on: 127, off: 0 };
        assert_eq!(rule.apply(1), 127);
        assert_eq!(rule.apply(0), 0);
        assert_eq!(ValueRule::Forward.apply(42), 42);
    }

    #[test]
    fn passthrough_uses_native_message_kind() {
        let strip = Mapping::passthrough(ControlId::Strip(50)).translate(64);
        assert_eq!(strip, vec![MidiMessage::control_change(0, 50, 64)]);

        let pad = Mapping::passthrough(ControlId::Pad(3)).translate(127);
        assert_eq!(pad, vec![MidiMessage::note_on(0, 3, 127)]);
    }

    #[test]
    fn empty_target_list_emits_nothing() {
        let mut mapping = Mapping::passthrough(ControlId::Cc(4));
        mapping.targets.clear();
        assert!(mapping.translate(127).is_empty());
    }
}
