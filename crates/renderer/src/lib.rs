//! Figure rendering for volume slices.
//!
//! - Colormaps (built-in and JSON-defined)
//! - Heatmap resampling and color mapping
//! - Stroke-font titles and colorbar ticks
//! - Figure composition and PNG encoding

pub mod colormap;
pub mod figure;
pub mod gradient;
pub mod label;
pub mod png;
pub mod save;

pub use colormap::{Colormap, ColorStop, BUILTIN_COLORMAPS};
pub use figure::{parse_size, Render, RenderConfig, RenderedImage, SliceRenderer};
pub use gradient::{Color, Interpolation};
pub use png::{encode_png, PngError};
pub use save::{remove_temp_files, save_png, write_atomic};
