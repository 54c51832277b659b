//! Common test fixtures for slice-render tests.
//!
//! Small volumes that represent the scenarios the pipeline has to handle.

use slice_common::{Slice, Volume};

/// The canonical two-slice 2x2 volume.
pub fn two_by_two_volume() -> Volume {
    crate::random_volume(2, 2, 2, 42)
}

/// A single 2x2 matrix.
pub fn single_matrix() -> Slice {
    Slice::matrix(2, 2, vec![0.1, 0.5, 0.7, 0.9]).expect("2x2 has four samples")
}

/// Three slices where the middle one is one-dimensional and cannot render.
pub fn volume_with_malformed_middle() -> Volume {
    Volume::from_slices(vec![
        crate::gradient_slice(4, 4),
        Slice::new(vec![16], vec![0.5; 16]).expect("shape matches data"),
        crate::gradient_slice(4, 4),
    ])
}

/// Two well-formed slices of different shapes.
pub fn mismatched_volume() -> Volume {
    Volume::from_slices(vec![crate::gradient_slice(2, 2), crate::gradient_slice(3, 2)])
}

/// A slice with NaN holes in its first row.
pub fn slice_with_gaps(rows: usize, cols: usize) -> Slice {
    let mut data = crate::gradient_slice(rows, cols).data().to_vec();
    for v in data.iter_mut().take(cols) {
        *v = f32::NAN;
    }
    Slice::matrix(rows, cols, data).expect("shape matches data")
}
