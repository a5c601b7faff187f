//! Loading of scene definitions into a validated [`Timeline`].
//!
//! A scene file is JSON:
//!
//! ```json
//! {
//!   "default_scene": "intro",
//!   "scenes": [
//!     { "name": "intro", "tick": 0, "mappings": [
//!       { "control": "17", "output": "G2 A2 A#2", "value": { "gate": { "on": 127, "off": 0 } } },
//!       { "control": "cc8", "action": "clock toggle" }
//!     ] },
//!     { "name": "drop", "time": "1m30s", "mappings": [] }
//!   ]
//! }
//! ```
//!
//! Loading either yields a complete timeline or fails on the first invalid
//! element.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    clock::TransportCommand,
    mapping::{Action, LedColors, Mapping, ValueRule},
    midi::{checked_channel, checked_data, ControlId, OutputKind},
    notes::parse_note_list,
    palette::Palette,
    scene::{Anchor, Scene},
    timeline::Timeline,
    Result, TrafficJamError,
};

const DEFAULT_COLOR: &str = "orange";
const DEFAULT_ACTIVE_STATE: &str = "bright";
const DEFAULT_INACTIVE_STATE: &str = "dim";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSpec {
    #[serde(default)]
    pub default_scene: Option<String>,
    pub scenes: Vec<SceneSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSpec {
    pub name: String,
    #[serde(default)]
    pub tick: Option<i64>,
    /// Offset such as `"90s"`, `"1m30s"` or `"250ms"`.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub mappings: Vec<MappingSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSpec {
    pub control: String,
    #[serde(default)]
    pub channel: Option<i64>,
    #[serde(default)]
    pub output: Option<OutputSpec>,
    #[serde(default)]
    pub kind: Option<OutputKind>,
    #[serde(default)]
    pub value: ValueSpec,
    #[serde(default)]
    pub led: Option<LedSpec>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Target note/CC numbers: a single number, a list, or note names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    Number(i64),
    List(Vec<i64>),
    Notes(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSpec {
    #[default]
    Forward,
    Gate { on: i64, off: i64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedSpec {
    #[serde(default)]
    pub active: Option<LedStateSpec>,
    #[serde(default)]
    pub inactive: Option<LedStateSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedStateSpec {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Builds a timeline from its parsed description.
pub fn build_timeline(spec: &TimelineSpec, palette: &Palette, ppq: u32) -> Result<Timeline> {
    let scenes = spec
        .scenes
        .iter()
        .map(|scene| build_scene(scene, palette, ppq))
        .collect::<Result<Vec<_>>>()?;
    let timeline = Timeline::new(scenes, spec.default_scene.as_deref(), ppq)?;
    tracing::info!(
        scenes = timeline.len(),
        default_scene = timeline.default_scene().name(),
        "timeline loaded"
    );
    Ok(timeline)
}

pub fn timeline_from_json(json: &str, palette: &Palette, ppq: u32) -> Result<Timeline> {
    let spec: TimelineSpec = serde_json::from_str(json)?;
    build_timeline(&spec, palette, ppq)
}

pub fn load_timeline(path: &Path, palette: &Palette, ppq: u32) -> Result<Timeline> {
    timeline_from_json(&fs::read_to_string(path)?, palette, ppq)
}

fn build_scene(spec: &SceneSpec, palette: &Palette, ppq: u32) -> Result<Scene> {
    let context = format!("scene `{}`", spec.name);
    let anchor = match (spec.tick, spec.time.as_deref()) {
        (Some(tick), None) => {
            let tick = u64::try_from(tick).map_err(|_| {
                TrafficJamError::config(&context, format!("negative tick anchor {tick}"))
            })?;
            Anchor::Tick(tick)
        }
        (None, Some(time)) => Anchor::Time(parse_duration(time, &context)?),
        (Some(_), Some(_)) => {
            return Err(TrafficJamError::config(&context, "anchor sets both `tick` and `time`"));
        }
        (None, None) => {
            return Err(TrafficJamError::config(&context, "anchor needs either `tick` or `time`"));
        }
    };

    let mappings = spec
        .mappings
        .iter()
        .map(|mapping| build_mapping(mapping, &spec.name, palette, ppq))
        .collect::<Result<Vec<_>>>()?;
    Scene::new(&spec.name, anchor, mappings)
}

fn build_mapping(spec: &MappingSpec, scene: &str, palette: &Palette, ppq: u32) -> Result<Mapping> {
    let control: ControlId = spec.control.parse().map_err(|_| {
        TrafficJamError::config(
            format!("scene `{scene}`"),
            format!("bad control `{}`", spec.control),
        )
    })?;
    let context = format!("scene `{scene}` mapping {control}");

    let channel = match spec.channel {
        Some(channel) => checked_channel(channel, &context)?,
        None => 0,
    };

    let targets = match &spec.output {
        None => vec![control.index()],
        Some(OutputSpec::Number(target)) => vec![checked_data(*target, &context)?],
        Some(OutputSpec::List(targets)) => targets
            .iter()
            .map(|target| checked_data(*target, &context))
            .collect::<Result<Vec<_>>>()?,
        Some(OutputSpec::Notes(names)) => parse_note_list(names, &context)?,
    };

    let value = match spec.value {
        ValueSpec::Forward => ValueRule::Forward,
        ValueSpec::Gate { on, off } => ValueRule::Gate {
            on: checked_data(on, &context)?,
            off: checked_data(off, &context)?,
        },
    };

    let colors = match (&spec.led, control.is_illuminated()) {
        (_, false) => None,
        (None, true) => Some(resolve_led(&LedSpec::default(), palette, &context)?),
        (Some(led), true) => Some(resolve_led(led, palette, &context)?),
    };

    let action = spec
        .action
        .as_deref()
        .map(|action| parse_action(action, ppq, &context))
        .transpose()?;

    Ok(Mapping {
        control,
        channel,
        kind: spec.kind.unwrap_or_else(|| control.native_kind()),
        targets,
        value,
        colors,
        action,
    })
}

fn resolve_led(spec: &LedSpec, palette: &Palette, context: &str) -> Result<LedColors> {
    let pick = |state: &Option<LedStateSpec>, default_state: &str| {
        let color = state
            .as_ref()
            .and_then(|s| s.color.as_deref())
            .unwrap_or(DEFAULT_COLOR);
        let brightness = state
            .as_ref()
            .and_then(|s| s.state.as_deref())
            .unwrap_or(default_state);
        palette.resolve(color, brightness, context)
    };

    Ok(LedColors {
        active: pick(&spec.active, DEFAULT_ACTIVE_STATE)?,
        inactive: pick(&spec.inactive, DEFAULT_INACTIVE_STATE)?,
    })
}

/// Parses `print <text>` and `clock toggle|reset|forward <n>|rewind <n>`.
/// A whole `n` counts ticks, a fractional `n` counts beats.
pub fn parse_action(spec: &str, ppq: u32, context: &str) -> Result<Action> {
    let mut tokens = spec.split_whitespace();
    let invalid = || TrafficJamError::config(context, format!("unknown action `{spec}`"));

    match tokens.next() {
        Some("print") => Ok(Action::Print(tokens.collect::<Vec<_>>().join(" "))),
        Some("clock") => {
            let command = match tokens.next() {
                Some("toggle") => TransportCommand::Toggle,
                Some("reset") => TransportCommand::Reset,
                Some("forward") => {
                    TransportCommand::Forward(parse_step(tokens.next(), ppq).ok_or_else(invalid)?)
                }
                Some("rewind") => {
                    TransportCommand::Rewind(parse_step(tokens.next(), ppq).ok_or_else(invalid)?)
                }
                _ => return Err(invalid()),
            };
            Ok(Action::Transport(command))
        }
        _ => Err(invalid()),
    }
}

fn parse_step(token: Option<&str>, ppq: u32) -> Option<u64> {
    let token = token?;
    if token.contains('.') {
        let beats: f64 = token
            .parse()
            .ok()
            .filter(|beats: &f64| beats.is_finite() && *beats >= 0.0)?;
        Some(((beats * f64::from(ppq)) as u64).max(1))
    } else {
        Some(token.parse::<u64>().ok()?.max(1))
    }
}

/// Parses durations such as `"90s"`, `"1m30s"`, `"1.5s"`, `"250ms"` or
/// `"2h"`. A bare number counts seconds.
pub fn parse_duration(spec: &str, context: &str) -> Result<Duration> {
    let invalid = || TrafficJamError::config(context, format!("bad time anchor `{spec}`"));
    let text = spec.trim().to_ascii_lowercase();
    if text.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = text.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).map_err(|_| invalid());
    }

    let mut total = 0.0;
    let mut rest = text.as_str();
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let amount: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match rest[..unit_len].trim() {
            "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
            "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "ms" => 0.001,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += amount * scale;
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}
