use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    clock::{TransportCommand, DEFAULT_PPQ},
    engine::UnmappedPolicy,
    mapping::{Action, LedColors, Mapping},
    midi::{checked_channel, ControlId},
    palette::Palette,
    surface::SurfaceLayout,
    Result, TrafficJamError,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub clock: ClockConfig,
    pub engine: EngineConfig,
    pub surface: SurfaceConfig,
    pub transport: TransportBindings,
    /// `null` disables the indicator.
    pub beat_indicator: Option<BeatIndicatorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            engine: EngineConfig::default(),
            surface: SurfaceConfig::default(),
            transport: TransportBindings::default(),
            beat_indicator: Some(BeatIndicatorConfig::default()),
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.clock.bpm.is_finite() && self.clock.bpm > 0.0) {
            return Err(TrafficJamError::config(
                "clock",
                format!("invalid tempo {}", self.clock.bpm),
            ));
        }
        if self.clock.ppq == 0 {
            return Err(TrafficJamError::config("clock", "ppq must be at least 1"));
        }
        checked_channel(i64::from(self.surface.layout.channel), "surface")?;
        Ok(())
    }
}

/// Configuration of the internal transport clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub bpm: f64,
    pub ppq: u32,
    /// Start paused; the operator starts the transport from the surface.
    pub start_locked: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ppq: DEFAULT_PPQ,
            start_locked: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unmapped: UnmappedPolicy,
}

/// Device ports and control layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Substring matched against port names to find the controller.
    pub device: String,
    /// Name of the port translated messages are relayed on.
    pub relay: String,
    pub layout: SurfaceLayout,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            device: "Maschine Jam".to_string(),
            relay: "Traffic Jam".to_string(),
            layout: SurfaceLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBinding {
    pub control: ControlId,
    pub ticks: u64,
}

/// Transport controls available in every scene unless a scene maps the
/// same control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportBindings {
    pub toggle: Option<ControlId>,
    pub reset: Option<ControlId>,
    pub rewind: Option<StepBinding>,
    pub forward: Option<StepBinding>,
}

impl Default for TransportBindings {
    fn default() -> Self {
        Self {
            toggle: Some(ControlId::Cc(8)),
            reset: Some(ControlId::Cc(9)),
            rewind: Some(StepBinding {
                control: ControlId::Cc(10),
                ticks: 50,
            }),
            forward: Some(StepBinding {
                control: ControlId::Cc(11),
                ticks: 50,
            }),
        }
    }
}

impl TransportBindings {
    /// Relaying mappings carrying the transport actions.
    pub fn mappings(&self) -> Vec<Mapping> {
        let bindings = [
            self.toggle
                .map(|control| (control, TransportCommand::Toggle)),
            self.reset.map(|control| (control, TransportCommand::Reset)),
            self.rewind
                .map(|step| (step.control, TransportCommand::Rewind(step.ticks.max(1)))),
            self.forward
                .map(|step| (step.control, TransportCommand::Forward(step.ticks.max(1)))),
        ];
        bindings
            .into_iter()
            .flatten()
            .map(|(control, command)| {
                Mapping::passthrough(control).with_action(Action::Transport(command))
            })
            .collect()
    }
}

/// Control that blinks on every other beat while the transport runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatIndicatorConfig {
    pub control: ControlId,
    pub color: String,
}

impl Default for BeatIndicatorConfig {
    fn default() -> Self {
        Self {
            control: ControlId::Pad(63),
            color: "mint".to_string(),
        }
    }
}

impl BeatIndicatorConfig {
    pub fn colors(&self, palette: &Palette) -> Result<LedColors> {
        let context = format!("beat indicator {}", self.control);
        Ok(LedColors {
            active: palette.resolve(&self.color, "bright", &context)?,
            inactive: palette.resolve(&self.color, "dim", &context)?,
        })
    }
}
