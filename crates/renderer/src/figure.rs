//! Figure composition: one titled heatmap per slice.
//!
//! Layout follows a default single-axes plot: white canvas, title centered
//! above the axes, the heatmap scaled to fit the axes with square cells,
//! a one pixel frame, and an optional colorbar on the right.

use crate::colormap::{hex_to_rgb, Colormap};
use crate::gradient::{render_grid, resample, Color, Interpolation};
use crate::label::{draw_text, text_width, Anchor};
use crate::save::save_png;
use serde::{Deserialize, Serialize};
use slice_common::{Slice, SliceError, SliceResult};
use std::path::Path;
use tiny_skia::{Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use tracing::debug;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
const MIN_SIZE: u32 = 32;
const MAX_SIZE: u32 = 8192;

const FRAME_COLOR: [u8; 4] = [0, 0, 0, 255];
const TEXT_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Anything that can turn a slice into an image and persist it.
///
/// The pipeline only talks to this trait, so alternative renderers can be
/// plugged in.
pub trait Render: Send + Sync {
    fn render(&self, slice: &Slice, title: &str) -> SliceResult<RenderedImage>;

    fn save(&self, image: &RenderedImage, path: &Path) -> SliceResult<()> {
        save_png(image, path)
    }
}

/// An RGBA figure held in memory (straight alpha, row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RenderedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> SliceResult<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(SliceError::render(format!(
                "{}x{} image needs {} bytes, got {}",
                width,
                height,
                width as usize * height as usize * 4,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }
}

/// Figure settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Figure width in pixels.
    pub width: u32,
    /// Figure height in pixels.
    pub height: u32,
    pub colormap: Colormap,
    /// Lower color limit; the slice's finite minimum when unset.
    pub vmin: Option<f32>,
    /// Upper color limit; the slice's finite maximum when unset.
    pub vmax: Option<f32>,
    pub interpolation: Interpolation,
    /// Draw a vertical colorbar right of the heatmap.
    pub colorbar: bool,
    /// `#rrggbb` used for NaN and infinite samples.
    pub bad_color: String,
    /// Title cap height in pixels (shrunk if the title would not fit).
    pub title_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            colormap: Colormap::default(),
            vmin: None,
            vmax: None,
            interpolation: Interpolation::default(),
            colorbar: false,
            bad_color: "#ffffff".to_string(),
            title_size: 14.0,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> SliceResult<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_SIZE..=MAX_SIZE).contains(&value) {
                return Err(SliceError::invalid_input(format!(
                    "figure {} must be between {} and {} pixels, got {}",
                    name, MIN_SIZE, MAX_SIZE, value
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.vmin, self.vmax) {
            if !(lo < hi) {
                return Err(SliceError::invalid_input(format!(
                    "vmin ({}) must be below vmax ({})",
                    lo, hi
                )));
            }
        }
        if hex_to_rgb(&self.bad_color).is_none() {
            return Err(SliceError::invalid_input(format!(
                "invalid bad color '{}'",
                self.bad_color
            )));
        }
        if !(self.title_size > 0.0) {
            return Err(SliceError::invalid_input("title size must be positive"));
        }
        self.colormap.validate()
    }
}

/// Parse a `WIDTHxHEIGHT` figure size such as `640x480`.
pub fn parse_size(s: &str) -> SliceResult<(u32, u32)> {
    let parsed = s
        .trim()
        .split_once(|c: char| c == 'x' || c == 'X')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
    parsed.ok_or_else(|| {
        SliceError::invalid_input(format!("invalid size '{}': expected WIDTHxHEIGHT", s))
    })
}

/// Pixel boxes of a composed figure.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    heat: PixelBox,
    colorbar: Option<PixelBox>,
    title_center: f32,
    title_top: f32,
    title_size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelBox {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

fn compute_layout(config: &RenderConfig, rows: usize, cols: usize, title: &str) -> Layout {
    let w = config.width as f32;
    let h = config.height as f32;

    let top = (config.title_size * 2.2).clamp(h * 0.08, h * 0.3);
    let bottom = h * 0.9;
    let left = w * 0.125;
    let right = if config.colorbar { w * 0.78 } else { w * 0.9 };

    let avail_w = (right - left).floor().max(1.0) as u64;
    let avail_h = (bottom - top).floor().max(1.0) as u64;
    let (rows, cols) = (rows as u64, cols as u64);
    // Square cells: whichever side is limiting fills its axis.
    let (heat_w, heat_h) = if avail_w * rows <= avail_h * cols {
        (avail_w, avail_w * rows / cols)
    } else {
        (avail_h * cols / rows, avail_h)
    };
    let (heat_w, heat_h) = (heat_w.max(1) as u32, heat_h.max(1) as u32);
    let heat = PixelBox {
        x: (left + (avail_w as f32 - heat_w as f32) / 2.0).max(0.0) as u32,
        y: (top + (avail_h as f32 - heat_h as f32) / 2.0).max(0.0) as u32,
        w: heat_w,
        h: heat_h,
    };

    let colorbar = config.colorbar.then(|| PixelBox {
        x: (w * 0.82) as u32,
        y: heat.y,
        w: ((w * 0.03) as u32).max(4),
        h: heat.h,
    });

    let mut title_size = config.title_size.min(top * 0.6);
    let natural = text_width(title, title_size);
    if natural > w * 0.9 {
        title_size *= w * 0.9 / natural;
    }

    Layout {
        heat,
        colorbar,
        title_center: heat.x as f32 + heat.w as f32 / 2.0,
        title_top: ((top - title_size) / 2.0).max(1.0),
        title_size,
    }
}

/// The default [`Render`] implementation.
#[derive(Debug, Clone)]
pub struct SliceRenderer {
    config: RenderConfig,
    lut: Vec<Color>,
    bad: Color,
}

impl SliceRenderer {
    pub fn new(config: RenderConfig) -> SliceResult<Self> {
        config.validate()?;
        let lut = config.colormap.lut();
        let (r, g, b) = hex_to_rgb(&config.bad_color).unwrap_or((255, 255, 255));
        Ok(Self {
            config,
            lut,
            bad: Color::new(r, g, b, 255),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn color_limits(&self, slice: &Slice) -> (f32, f32) {
        let (lo, hi) = slice.finite_range().unwrap_or((0.0, 1.0));
        (self.config.vmin.unwrap_or(lo), self.config.vmax.unwrap_or(hi))
    }

    fn draw_colorbar(&self, pixmap: &mut Pixmap, bar: PixelBox, vmin: f32, vmax: f32, size: f32) {
        let last = self.lut.len() - 1;
        let mut rgba = Vec::with_capacity(bar.w as usize * bar.h as usize * 4);
        for row in 0..bar.h {
            let t = if bar.h > 1 {
                1.0 - row as f32 / (bar.h - 1) as f32
            } else {
                1.0
            };
            let color = self.lut[(t * last as f32).round() as usize].to_array();
            for _ in 0..bar.w {
                rgba.extend_from_slice(&color);
            }
        }
        blit(pixmap, &rgba, bar);
        stroke_frame(pixmap, bar);

        let tick_size = (size * 0.7).max(5.0);
        let label_x = (bar.x + bar.w) as f32 + tick_size * 0.5;
        let ticks = [
            (vmax, bar.y as f32),
            ((vmin + vmax) / 2.0, bar.y as f32 + bar.h as f32 / 2.0 - tick_size / 2.0),
            (vmin, (bar.y + bar.h) as f32 - tick_size),
        ];
        for (value, top) in ticks {
            draw_text(pixmap, &format_tick(value), label_x, top, tick_size, Anchor::Start, TEXT_COLOR);
        }
    }
}

impl Default for SliceRenderer {
    fn default() -> Self {
        let config = RenderConfig::default();
        Self {
            lut: config.colormap.lut(),
            bad: Color::WHITE,
            config,
        }
    }
}

impl Render for SliceRenderer {
    fn render(&self, slice: &Slice, title: &str) -> SliceResult<RenderedImage> {
        let (rows, cols) = slice.dims_2d().ok_or_else(|| {
            SliceError::render(format!(
                "expected a non-empty 2-D slice, got shape {:?}",
                slice.shape()
            ))
        })?;

        let layout = compute_layout(&self.config, rows, cols, title);
        let mut pixmap = Pixmap::new(self.config.width, self.config.height).ok_or_else(|| {
            SliceError::render(format!(
                "cannot allocate {}x{} canvas",
                self.config.width, self.config.height
            ))
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let (vmin, vmax) = self.color_limits(slice);
        let heat = layout.heat;
        let samples = resample(
            slice.data(),
            cols,
            rows,
            heat.w as usize,
            heat.h as usize,
            self.config.interpolation,
        );
        let rgba = render_grid(&samples, heat.w as usize, heat.h as usize, vmin, vmax, &self.lut, self.bad);
        blit(&mut pixmap, &rgba, heat);
        stroke_frame(&mut pixmap, heat);

        if let Some(bar) = layout.colorbar {
            self.draw_colorbar(&mut pixmap, bar, vmin, vmax, layout.title_size);
        }

        draw_text(
            &mut pixmap,
            title,
            layout.title_center,
            layout.title_top,
            layout.title_size,
            Anchor::Middle,
            TEXT_COLOR,
        );

        debug!(title, rows, cols, vmin, vmax, "Rendered slice");

        let pixels = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RenderedImage::new(self.config.width, self.config.height, pixels)
    }
}

/// Copy straight-alpha opaque RGBA rows into the canvas at `dst`.
fn blit(pixmap: &mut Pixmap, rgba: &[u8], dst: PixelBox) {
    let canvas_w = pixmap.width();
    let canvas_h = pixmap.height();
    let stride = canvas_w as usize * 4;
    let copy_w = dst.w.min(canvas_w.saturating_sub(dst.x)) as usize;
    let copy_h = dst.h.min(canvas_h.saturating_sub(dst.y)) as usize;
    let data = pixmap.data_mut();

    for row in 0..copy_h {
        let dst_start = (dst.y as usize + row) * stride + dst.x as usize * 4;
        let src_start = row * dst.w as usize * 4;
        data[dst_start..dst_start + copy_w * 4]
            .copy_from_slice(&rgba[src_start..src_start + copy_w * 4]);
    }
}

fn stroke_frame(pixmap: &mut Pixmap, area: PixelBox) {
    let Some(rect) = Rect::from_xywh(
        area.x as f32 - 0.5,
        area.y as f32 - 0.5,
        area.w as f32 + 1.0,
        area.h as f32 + 1.0,
    ) else {
        return;
    };
    let path = PathBuilder::from_rect(rect);

    let mut paint = Paint::default();
    paint.set_color_rgba8(FRAME_COLOR[0], FRAME_COLOR[1], FRAME_COLOR[2], FRAME_COLOR[3]);
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

/// Short tick label: fixed point for moderate magnitudes, exponent otherwise.
fn format_tick(value: f32) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && (magnitude >= 1.0e4 || magnitude < 1.0e-2) {
        format!("{:.1e}", value)
    } else {
        format!("{:.2}", value)
    }
}
