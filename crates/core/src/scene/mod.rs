use std::{collections::HashMap, fmt, time::Duration};

use crate::{
    clock::{ms_to_ticks, ClockPosition},
    mapping::{LedColors, Mapping},
    midi::ControlId,
    Result, TrafficJamError,
};

/// Timeline position at which a scene becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Tick(u64),
    Time(Duration),
}

impl Anchor {
    /// Anchor expressed in ticks at the given tempo. Tick anchors are exact.
    pub fn to_ticks(&self, bpm: f64, ppq: u32) -> f64 {
        match *self {
            Anchor::Tick(ticks) => ticks as f64,
            Anchor::Time(offset) => ms_to_ticks(offset.as_secs_f64() * 1000.0, bpm, ppq),
        }
    }

    /// Whether the transport has reached this anchor.
    ///
    /// Time anchors are converted with the tempo carried by `position`; when
    /// no usable tempo is reported they are compared against the elapsed
    /// wall-clock time instead.
    pub fn reached(&self, position: &ClockPosition, ppq: u32) -> bool {
        match *self {
            Anchor::Tick(ticks) => ticks <= position.ticks,
            Anchor::Time(_) if position.has_tempo() => {
                self.to_ticks(position.bpm, ppq) <= position.ticks as f64
            }
            Anchor::Time(offset) => offset.as_secs_f64() * 1000.0 <= position.elapsed_ms,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Tick(ticks) => write!(f, "tick {ticks}"),
            Anchor::Time(offset) => write!(f, "{:.3}s", offset.as_secs_f64()),
        }
    }
}

/// Named set of mappings that is active over one timeline interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    name: String,
    anchor: Anchor,
    mappings: Vec<Mapping>,
    by_control: HashMap<ControlId, usize>,
}

impl Scene {
    /// Builds a scene, rejecting a control that is mapped twice.
    pub fn new(name: impl Into<String>, anchor: Anchor, mappings: Vec<Mapping>) -> Result<Self> {
        let name = name.into();
        let mut by_control = HashMap::with_capacity(mappings.len());
        for (index, mapping) in mappings.iter().enumerate() {
            if by_control.insert(mapping.control, index).is_some() {
                return Err(TrafficJamError::config(
                    format!("scene `{name}`"),
                    format!("control {} is mapped more than once", mapping.control),
                ));
            }
        }

        Ok(Self {
            name,
            anchor,
            mappings,
            by_control,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn mapping(&self, control: ControlId) -> Option<&Mapping> {
        self.by_control
            .get(&control)
            .map(|&index| &self.mappings[index])
    }

    /// Mappings that carry a colour, in authoring order.
    pub fn illuminated(&self) -> impl Iterator<Item = (ControlId, LedColors)> + '_ {
        self.mappings
            .iter()
            .filter_map(|mapping| mapping.colors.map(|colors| (mapping.control, colors)))
    }
}
