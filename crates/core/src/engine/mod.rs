use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    clock::TransportCommand,
    mapping::{Action, ButtonState, Mapping},
    midi::{ControlId, MidiMessage},
    scene::Scene,
};

/// What happens to input on a control the active scene does not map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedPolicy {
    /// Relay the event unchanged on the surface channel.
    #[default]
    Passthrough,
    Drop,
}

/// Colour to show on one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualUpdate {
    pub control: ControlId,
    pub color: u8,
}

/// Everything one input event produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlResponse {
    /// Messages to relay, in emission order.
    pub midi: Vec<MidiMessage>,
    pub visual: Option<VisualUpdate>,
    pub transport: Option<TransportCommand>,
}

/// Translates input against the active scene and tracks the logical state
/// of every illuminated control.
#[derive(Debug, Default)]
pub struct RemapEngine {
    policy: UnmappedPolicy,
    passthrough_channel: u8,
    fallback: HashMap<ControlId, Mapping>,
    states: HashMap<ControlId, ButtonState>,
}

impl RemapEngine {
    pub fn new(policy: UnmappedPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Session-wide mappings used when the active scene does not map a
    /// control. Scene mappings always take precedence.
    pub fn with_fallback(mut self, mappings: impl IntoIterator<Item = Mapping>) -> Self {
        self.fallback = mappings
            .into_iter()
            .map(|mapping| (mapping.control, mapping))
            .collect();
        self
    }

    /// Channel unmapped input is relayed on; the channel the surface
    /// sends on.
    pub fn with_passthrough_channel(mut self, channel: u8) -> Self {
        self.passthrough_channel = channel;
        self
    }

    pub fn policy(&self) -> UnmappedPolicy {
        self.policy
    }

    /// Last observed state of `control`; inactive if never pressed.
    pub fn state(&self, control: ControlId) -> ButtonState {
        self.states.get(&control).copied().unwrap_or_default()
    }

    pub fn on_control_event(
        &mut self,
        scene: &Scene,
        control: ControlId,
        value: u8,
    ) -> ControlResponse {
        let state = ButtonState::from_value(value);
        if control.is_illuminated() {
            self.states.insert(control, state);
        }

        let fallback = self.fallback.get(&control);
        let Some(mapping) = scene.mapping(control).or(fallback) else {
            return self.unmapped(scene, control, value);
        };

        let mut response = ControlResponse {
            midi: mapping.translate(value),
            ..ControlResponse::default()
        };

        if control.is_illuminated() {
            response.visual = mapping.colors.map(|colors| VisualUpdate {
                control,
                color: colors.for_state(state),
            });
        }

        if state == ButtonState::Active {
            match &mapping.action {
                Some(Action::Print(message)) => {
                    tracing::info!(scene = scene.name(), %control, "{message}");
                }
                Some(Action::Transport(command)) => response.transport = Some(*command),
                None => {}
            }
        }

        response
    }

    fn unmapped(&self, scene: &Scene, control: ControlId, value: u8) -> ControlResponse {
        match self.policy {
            UnmappedPolicy::Passthrough => {
                tracing::trace!(
                    scene = scene.name(),
                    %control,
                    value,
                    "relaying unmapped control"
                );
                let mapping = Mapping {
                    channel: self.passthrough_channel,
                    ..Mapping::passthrough(control)
                };
                ControlResponse {
                    midi: mapping.translate(value),
                    ..ControlResponse::default()
                }
            }
            UnmappedPolicy::Drop => {
                tracing::trace!(
                    scene = scene.name(),
                    %control,
                    value,
                    "dropping unmapped control"
                );
                ControlResponse::default()
            }
        }
    }

    /// Colour for every illuminated control of `scene`, whether or not it
    /// changed from the previous scene.
    pub fn on_scene_change(&self, scene: &Scene) -> Vec<VisualUpdate> {
        scene
            .illuminated()
            .map(|(control, colors)| VisualUpdate {
                control,
                color: colors.for_state(self.state(control)),
            })
            .collect()
    }
}
