//! Heatmap rendering of 2D sample grids.

use serde::{Deserialize, Serialize};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.max(0.0).min(1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
        ((color1.a as f32 * t_inv) + (color2.a as f32 * t)).round() as u8,
    )
}

/// How slice samples are mapped onto plot pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Each pixel takes the nearest sample (blocky, like `imshow` on small arrays).
    #[default]
    Nearest,
    /// Bilinear blend of the four surrounding samples.
    Bilinear,
}

impl Interpolation {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nearest" => Some(Self::Nearest),
            "bilinear" => Some(Self::Bilinear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

/// Resample a grid to `dst_width x dst_height` with the given method.
pub fn resample(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    method: Interpolation,
) -> Vec<f32> {
    match method {
        Interpolation::Nearest => resample_nearest(data, src_width, src_height, dst_width, dst_height),
        Interpolation::Bilinear => resample_grid(data, src_width, src_height, dst_width, dst_height),
    }
}

/// Nearest-neighbour resampling; each source cell covers an equal pixel block.
pub fn resample_nearest(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if src_width == dst_width && src_height == dst_height {
        return data.to_vec();
    }

    let mut output = Vec::with_capacity(dst_width * dst_height);
    for y in 0..dst_height {
        let src_y = (y * src_height / dst_height).min(src_height - 1);
        for x in 0..dst_width {
            let src_x = (x * src_width / dst_width).min(src_width - 1);
            output.push(data.get(src_y * src_width + src_x).copied().unwrap_or(f32::NAN));
        }
    }
    output
}

/// Resample grid data to a different resolution using bilinear interpolation.
///
/// A NaN neighbour makes the interpolated pixel NaN, so gaps stay visible.
///
/// # Arguments
/// - `data`: Input grid data (row-major order)
/// - `src_width`: Source grid width
/// - `src_height`: Source grid height
/// - `dst_width`: Destination grid width
/// - `dst_height`: Destination grid height
pub fn resample_grid(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if src_width == dst_width && src_height == dst_height {
        return data.to_vec();
    }

    let mut output = vec![0.0f32; dst_width * dst_height];

    // Map pixel centers onto sample centers.
    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        let src_y = ((y as f32 + 0.5) * y_ratio - 0.5).clamp(0.0, (src_height - 1) as f32);
        let y1 = src_y.floor() as usize;
        let y2 = (y1 + 1).min(src_height - 1);
        let dy = src_y - y1 as f32;

        for x in 0..dst_width {
            let src_x = ((x as f32 + 0.5) * x_ratio - 0.5).clamp(0.0, (src_width - 1) as f32);
            let x1 = src_x.floor() as usize;
            let x2 = (x1 + 1).min(src_width - 1);
            let dx = src_x - x1 as f32;

            let v11 = data.get(y1 * src_width + x1).copied().unwrap_or(f32::NAN);
            let v21 = data.get(y1 * src_width + x2).copied().unwrap_or(f32::NAN);
            let v12 = data.get(y2 * src_width + x1).copied().unwrap_or(f32::NAN);
            let v22 = data.get(y2 * src_width + x2).copied().unwrap_or(f32::NAN);

            let v1 = v11 * (1.0 - dx) + v21 * dx;
            let v2 = v12 * (1.0 - dx) + v22 * dx;
            output[y * dst_width + x] = v1 * (1.0 - dy) + v2 * dy;
        }
    }

    output
}

/// Normalize `value` into `0..=1` against `[min_val, max_val]`.
///
/// A flat range maps everything to the middle of the colormap.
pub fn normalize(value: f32, min_val: f32, max_val: f32) -> f32 {
    let range = max_val - min_val;
    if range.abs() < f32::EPSILON {
        return 0.5;
    }
    ((value - min_val) / range).clamp(0.0, 1.0)
}

/// Render grid data as a gradient heatmap
///
/// # Arguments
/// - `data`: 2D grid of values (row-major order)
/// - `width`: Number of columns
/// - `height`: Number of rows
/// - `min_val`: Value mapped to the first LUT entry
/// - `max_val`: Value mapped to the last LUT entry
/// - `lut`: Precomputed colormap entries
/// - `bad`: Color for non-finite samples
///
/// # Returns
/// RGBA pixel data (4 bytes per pixel)
pub fn render_grid(
    data: &[f32],
    width: usize,
    height: usize,
    min_val: f32,
    max_val: f32,
    lut: &[Color],
    bad: Color,
) -> Vec<u8> {
    let mut pixels = vec![0u8; width * height * 4];
    let last = lut.len().saturating_sub(1);

    for (idx, pixel) in pixels.chunks_exact_mut(4).enumerate() {
        let color = match data.get(idx) {
            Some(&value) if value.is_finite() && !lut.is_empty() => {
                let normalized = normalize(value, min_val, max_val);
                lut[(normalized * last as f32).round() as usize]
            }
            _ => bad,
        };
        pixel.copy_from_slice(&color.to_array());
    }

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_color_midpoint() {
        let mid = interpolate_color(Color::BLACK, Color::WHITE, 0.5);
        assert_eq!(mid, Color::new(128, 128, 128, 255));
    }

    #[test]
    fn test_normalize_flat_range() {
        assert_eq!(normalize(3.0, 3.0, 3.0), 0.5);
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(-1.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn test_resample_nearest_blocks() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let out = resample_nearest(&data, 2, 2, 4, 4);
        assert_eq!(&out[0..4], &[1.0, 1.0, 2.0, 2.0]);
        assert_eq!(&out[12..16], &[3.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_render_grid_bad_color() {
        let lut = vec![Color::BLACK, Color::WHITE];
        let bad = Color::new(1, 2, 3, 4);
        let pixels = render_grid(&[0.0, f32::NAN], 2, 1, 0.0, 1.0, &lut, bad);
        assert_eq!(&pixels[0..4], &[0, 0, 0, 255]);
        assert_eq!(&pixels[4..8], &[1, 2, 3, 4]);
    }
}
