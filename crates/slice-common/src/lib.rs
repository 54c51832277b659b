//! Common types and utilities shared across the slice-render crates.

pub mod error;
pub mod loader;
pub mod naming;
pub mod volume;

pub use error::{SliceError, SliceResult};
pub use loader::{load_volume, VolumeFormat};
pub use naming::TitlePattern;
pub use volume::{Slice, Volume};
