use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{midi::MAX_DATA, Result, TrafficJamError};

/// On-disk palette description. Every colour occupies a block of device
/// values starting at its base index; a brightness state is an offset into
/// that block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteSpec {
    pub colors: BTreeMap<String, i64>,
    pub states: BTreeMap<String, i64>,
}

/// Resolved colour table used when scenes are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    values: BTreeMap<(String, String), u8>,
}

impl Palette {
    pub fn from_spec(spec: &PaletteSpec) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (color, start) in &spec.colors {
            for (state, offset) in &spec.states {
                let value = start
                    .checked_add(*offset)
                    .and_then(|value| u8::try_from(value).ok())
                    .filter(|value| *value <= MAX_DATA)
                    .ok_or_else(|| {
                        TrafficJamError::config(
                            format!("palette colour `{color}` state `{state}`"),
                            format!("value {start} + {offset} is outside 0..=127"),
                        )
                    })?;
                values.insert(
                    (color.to_ascii_lowercase(), state.to_ascii_lowercase()),
                    value,
                );
            }
        }
        Ok(Self { values })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let spec: PaletteSpec = serde_json::from_str(json)?;
        Self::from_spec(&spec)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Device value for a colour in a brightness state.
    pub fn value(&self, color: &str, state: &str) -> Option<u8> {
        self.values
            .get(&(color.to_ascii_lowercase(), state.to_ascii_lowercase()))
            .copied()
    }

    /// Like [`Palette::value`] but fails with a configuration error naming
    /// `context`.
    pub fn resolve(&self, color: &str, state: &str, context: &str) -> Result<u8> {
        self.value(color, state).ok_or_else(|| {
            TrafficJamError::config(
                context,
                format!("unknown colour `{color}` / state `{state}`"),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Palette {
    /// Colour layout of the Maschine Jam pad LEDs.
    fn default() -> Self {
        let colors = [
            ("black", 0),
            ("red", 4),
            ("orange", 8),
            ("light_orange", 12),
            ("warm_yellow", 16),
            ("yellow", 20),
            ("lime", 24),
            ("green", 28),
            ("mint", 32),
            ("cyan", 36),
            ("turquoise", 40),
            ("blue", 44),
            ("plum", 48),
            ("violet", 52),
            ("purple", 56),
            ("magenta", 60),
            ("fuchsia", 64),
            ("white", 68),
        ];
        let states = [
            ("dim", 0),
            ("dim_flash", 1),
            ("bright", 2),
            ("bright_flash", 3),
        ];

        let mut values = BTreeMap::new();
        for (color, start) in colors {
            for (state, offset) in states {
                let key = (color.to_string(), state.to_string());
                values.insert(key, start + offset);
            }
        }
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_colour_base_with_state_offset() {
        let palette = Palette::from_json(
            r#"{ "colors": { "orange": 8, "mint": 32 }, "states": { "dim": 0, "bright": 2 } }"#,
        )
        .unwrap();

        assert_eq!(palette.len(), 4);
        assert_eq!(palette.value("orange", "bright"), Some(10));
        assert_eq!(palette.value("Mint", "DIM"), Some(32));
        assert_eq!(palette.value("pink", "dim"), None);
    }

    #[test]
    fn rejects_values_outside_midi_range() {
        let err = Palette::from_json(r#"{ "colors": { "white": 126 }, "states": { "bright": 2 } }"#)
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("white"));
    }

    #[test]
    fn rejects_overflowing_and_negative_values() {
        let err = Palette::from_json(
            r#"{ "colors": { "x": 9223372036854775807 }, "states": { "s": 1 } }"#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("`x`"));

        let err = Palette::from_json(r#"{ "colors": { "x": 2 }, "states": { "s": -3 } }"#)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn resolve_reports_the_requesting_context() {
        let palette = Palette::default();
        assert_eq!(palette.resolve("black", "dim", "pad1").unwrap(), 0);
        let err = palette
            .resolve("gold", "bright", "scene `a` pad1")
            .unwrap_err();
        assert!(err.to_string().contains("scene `a` pad1"));
    }
}
