//! Shared test utilities for the slice-render workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Volume and slice generators
//! - Encoders for NPY/JSON input files
//! - Temp directory and output listing helpers
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, temp_test_dir};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that a directory holds exactly the given file names.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_dir_files;
///
/// assert_dir_files!(dir.path(), ["level_000.png", "level_001.png"]);
/// ```
#[macro_export]
macro_rules! assert_dir_files {
    ($dir:expr, [$($name:expr),* $(,)?]) => {{
        let actual = $crate::list_file_names($dir);
        let expected: std::collections::BTreeSet<String> =
            [$($name.to_string()),*].into_iter().collect();
        assert_eq!(actual, expected, "unexpected files in {:?}", $dir);
    }};
}
