//! Colormaps for slice heatmaps.
//!
//! A colormap is a list of color stops over normalized positions `0..=1`.
//! Built-in maps mirror the usual scientific defaults; custom maps load
//! from JSON:
//!
//! ```json
//! {"name": "fire", "stops": [{"value": 0.0, "color": "#000000"},
//!                            {"value": 1.0, "color": "#ff4000"}]}
//! ```

use crate::gradient::{interpolate_color, Color};
use serde::{Deserialize, Serialize};
use slice_common::{SliceError, SliceResult};
use std::path::Path;

/// Number of entries in a precomputed lookup table.
pub const LUT_SIZE: usize = 256;

/// Names accepted by [`Colormap::builtin`].
pub const BUILTIN_COLORMAPS: &[&str] = &["viridis", "magma", "gray", "coolwarm"];

const VIRIDIS: &[(f32, &str)] = &[
    (0.0, "#440154"),
    (0.1, "#482475"),
    (0.2, "#414487"),
    (0.3, "#355f8d"),
    (0.4, "#2a788e"),
    (0.5, "#21918c"),
    (0.6, "#22a884"),
    (0.7, "#44bf70"),
    (0.8, "#7ad151"),
    (0.9, "#bddf26"),
    (1.0, "#fde725"),
];

const MAGMA: &[(f32, &str)] = &[
    (0.0, "#000004"),
    (0.1, "#140e36"),
    (0.2, "#3b0f70"),
    (0.3, "#641a80"),
    (0.4, "#8c2981"),
    (0.5, "#b73779"),
    (0.6, "#de4968"),
    (0.7, "#f7705c"),
    (0.8, "#fe9f6d"),
    (0.9, "#fecf92"),
    (1.0, "#fcfdbf"),
];

const GRAY: &[(f32, &str)] = &[(0.0, "#000000"), (1.0, "#ffffff")];

const COOLWARM: &[(f32, &str)] = &[
    (0.0, "#3b4cc0"),
    (0.25, "#7b9ff9"),
    (0.5, "#dddddd"),
    (0.75, "#f49a7b"),
    (1.0, "#b40426"),
];

/// Color stop for gradient
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColorStop {
    /// Normalized position in `0..=1`.
    pub value: f32,
    /// `#rrggbb` hex color.
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Colormap {
    pub name: String,
    pub stops: Vec<ColorStop>,
}

impl Colormap {
    /// Look up a built-in colormap by name (case-insensitive).
    pub fn builtin(name: &str) -> Option<Self> {
        let stops = match name.to_lowercase().as_str() {
            "viridis" => VIRIDIS,
            "magma" => MAGMA,
            "gray" | "grey" => GRAY,
            "coolwarm" => COOLWARM,
            _ => return None,
        };
        Some(Self {
            name: name.to_lowercase(),
            stops: stops
                .iter()
                .map(|(value, color)| ColorStop {
                    value: *value,
                    color: color.to_string(),
                })
                .collect(),
        })
    }

    /// Parse a colormap from a JSON string.
    pub fn from_json(json: &str) -> SliceResult<Self> {
        let colormap: Self = serde_json::from_str(json)?;
        colormap.validate()?;
        Ok(colormap)
    }

    /// Load a colormap from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> SliceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SliceError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Resolve a CLI/env argument: a built-in name, or a path to a JSON file.
    pub fn resolve(name_or_path: &str) -> SliceResult<Self> {
        if let Some(builtin) = Self::builtin(name_or_path) {
            return Ok(builtin);
        }
        let path = Path::new(name_or_path);
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            return Self::from_file(path);
        }
        Err(SliceError::invalid_input(format!(
            "unknown colormap '{}': expected one of {} or a .json file",
            name_or_path,
            BUILTIN_COLORMAPS.join(", ")
        )))
    }

    /// Check there are at least two stops, in ascending order, with valid colors.
    pub fn validate(&self) -> SliceResult<()> {
        if self.stops.len() < 2 {
            return Err(SliceError::invalid_input(format!(
                "colormap '{}' needs at least two stops",
                self.name
            )));
        }
        for pair in self.stops.windows(2) {
            if !(pair[0].value < pair[1].value) {
                return Err(SliceError::invalid_input(format!(
                    "colormap '{}' stops must be strictly ascending ({} then {})",
                    self.name, pair[0].value, pair[1].value
                )));
            }
        }
        if let Some(bad) = self.stops.iter().find(|s| hex_to_rgb(&s.color).is_none()) {
            return Err(SliceError::invalid_input(format!(
                "colormap '{}' has invalid color '{}'",
                self.name, bad.color
            )));
        }
        Ok(())
    }

    /// Color at normalized position `t` (clamped into the stop range).
    pub fn color_at(&self, t: f32) -> Color {
        let first = &self.stops[0];
        let last = &self.stops[self.stops.len() - 1];
        let t = t.clamp(first.value, last.value);

        let upper = self
            .stops
            .iter()
            .position(|s| s.value >= t)
            .unwrap_or(self.stops.len() - 1);
        if upper == 0 {
            return stop_color(first);
        }

        let low = &self.stops[upper - 1];
        let high = &self.stops[upper];
        let span = high.value - low.value;
        interpolate_color(stop_color(low), stop_color(high), (t - low.value) / span)
    }

    /// Precompute [`LUT_SIZE`] evenly spaced colors.
    pub fn lut(&self) -> Vec<Color> {
        let first = self.stops[0].value;
        let last = self.stops[self.stops.len() - 1].value;
        (0..LUT_SIZE)
            .map(|i| {
                let frac = i as f32 / (LUT_SIZE - 1) as f32;
                self.color_at(first + frac * (last - first))
            })
            .collect()
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Self::builtin("viridis").expect("viridis is built in")
    }
}

fn stop_color(stop: &ColorStop) -> Color {
    let (r, g, b) = hex_to_rgb(&stop.color).unwrap_or((200, 200, 200));
    Color::new(r, g, b, 255)
}

/// Parse hex color string to RGB
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}
