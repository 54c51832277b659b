//! Test data generators for volumes, slices and input files.
//!
//! These generators create predictable, verifiable data patterns that can be
//! used across the test suite.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slice_common::{Slice, Volume};

/// Creates a row-major grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// A rows x cols slice ramping from 0 (top-left) to 1 (bottom-right).
pub fn gradient_slice(rows: usize, cols: usize) -> Slice {
    let mut data = Vec::with_capacity(rows * cols);
    let span = (rows + cols).saturating_sub(2).max(1) as f32;
    for row in 0..rows {
        for col in 0..cols {
            data.push((row + col) as f32 / span);
        }
    }
    Slice::matrix(rows, cols, data).expect("gradient dimensions are consistent")
}

/// `depth` gradient slices, each offset by its index so they differ.
pub fn gradient_volume(depth: usize, rows: usize, cols: usize) -> Volume {
    let slices = (0..depth)
        .map(|i| {
            let base = gradient_slice(rows, cols);
            let data = base.data().iter().map(|v| v + i as f32).collect();
            Slice::matrix(rows, cols, data).expect("gradient dimensions are consistent")
        })
        .collect();
    Volume::from_slices(slices)
}

/// Uniform `[0, 1)` samples from a fixed seed, like `np.random.rand(d, r, c)`.
pub fn random_volume(depth: usize, rows: usize, cols: usize, seed: u64) -> Volume {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..depth * rows * cols).map(|_| rng.gen::<f32>()).collect();
    Volume::from_flat(depth, rows, cols, data).expect("random dimensions are consistent")
}

/// Encode a little-endian float32 C-order NPY file (format version 1.0).
pub fn encode_npy_f32(shape: &[usize], data: &[f32]) -> Vec<u8> {
    let dims = shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let shape_text = if shape.len() == 1 {
        format!("({},)", dims)
    } else {
        format!("({})", dims)
    };
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': {}, }}",
        shape_text
    );
    // Header block (magic + version + len + header) is padded to 64 bytes.
    let unpadded = 10 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + data.len() * 4);
    out.extend_from_slice(b"\x93NUMPY");
    out.push(1);
    out.push(0);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Encode a volume as the flat JSON layout accepted by the loader.
pub fn encode_volume_json(volume: &Volume) -> String {
    let (rows, cols) = volume
        .slices()
        .first()
        .and_then(|s| s.dims_2d())
        .unwrap_or((0, 0));
    let data: Vec<f32> = volume
        .slices()
        .iter()
        .flat_map(|s| s.data().iter().copied())
        .collect();
    serde_json::json!({
        "shape": [volume.len(), rows, cols],
        "data": data,
    })
    .to_string()
}
