//! Volumes and the 2D slices they are made of.

use crate::error::{SliceError, SliceResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One array cut from a volume along its first axis.
///
/// Only slices with exactly two non-zero dimensions can be rendered, but the
/// type itself accepts any shape so malformed input can travel to a worker
/// and fail there, isolated to its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSlice")]
pub struct Slice {
    shape: Vec<usize>,
    #[serde(with = "samples")]
    data: Vec<f32>,
}

/// Wire form of [`Slice`], checked by [`Slice::new`] on the way in.
#[derive(Deserialize)]
struct RawSlice {
    shape: Vec<usize>,
    #[serde(with = "samples")]
    data: Vec<f32>,
}

impl TryFrom<RawSlice> for Slice {
    type Error = SliceError;

    fn try_from(raw: RawSlice) -> SliceResult<Self> {
        Slice::new(raw.shape, raw.data)
    }
}

/// Number of elements in an array of `shape`, or `None` if it overflows.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// JSON has no NaN: non-finite samples travel as `null` and come back as NaN.
mod samples {
    use super::*;

    pub fn serialize<S: Serializer>(data: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(data.iter().map(|v| v.is_finite().then_some(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let raw: Vec<Option<f32>> = Vec::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}

impl Slice {
    /// Create a slice from its shape and row-major samples.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> SliceResult<Self> {
        let expected = element_count(&shape).ok_or_else(|| {
            SliceError::invalid_input(format!("shape {:?} is too large", shape))
        })?;
        if expected != data.len() {
            return Err(SliceError::invalid_input(format!(
                "shape {:?} needs {} samples, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Create a rows x cols matrix.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f32>) -> SliceResult<Self> {
        Self::new(vec![rows, cols], data)
    }

    /// Build a matrix from nested rows. Ragged rows are rejected.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> SliceResult<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(SliceError::invalid_input(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                cols
            )));
        }
        let height = rows.len();
        let data = rows.into_iter().flatten().collect();
        Self::matrix(height, cols, data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// `(rows, cols)` when this is a renderable 2D matrix.
    pub fn dims_2d(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] if rows > 0 && cols > 0 => Some((rows, cols)),
            _ => None,
        }
    }

    /// Minimum and maximum of the finite samples, if there are any.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// An ordered stack of slices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    slices: Vec<Slice>,
}

impl Volume {
    pub fn from_slices(slices: Vec<Slice>) -> Self {
        Self { slices }
    }

    /// Split a row-major `(depth, rows, cols)` buffer into slices.
    pub fn from_flat(depth: usize, rows: usize, cols: usize, data: Vec<f32>) -> SliceResult<Self> {
        let (per_slice, total) = element_count(&[rows, cols])
            .zip(element_count(&[depth, rows, cols]))
            .ok_or_else(|| {
                SliceError::invalid_input(format!(
                    "volume shape [{}, {}, {}] is too large",
                    depth, rows, cols
                ))
            })?;
        if total != data.len() {
            return Err(SliceError::invalid_input(format!(
                "volume shape [{}, {}, {}] needs {} samples, got {}",
                depth,
                rows,
                cols,
                total,
                data.len()
            )));
        }
        if per_slice == 0 {
            let slices = (0..depth)
                .map(|_| Slice::matrix(rows, cols, Vec::new()))
                .collect::<SliceResult<Vec<_>>>()?;
            return Ok(Self { slices });
        }
        let slices = data
            .chunks_exact(per_slice)
            .map(|chunk| Slice::matrix(rows, cols, chunk.to_vec()))
            .collect::<SliceResult<Vec<_>>>()?;
        Ok(Self { slices })
    }

    /// Uniform random samples in `[0, 1)`.
    pub fn random(depth: usize, rows: usize, cols: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let slices = (0..depth)
            .map(|_| Slice {
                shape: vec![rows, cols],
                data: (0..rows * cols).map(|_| rng.gen::<f32>()).collect(),
            })
            .collect();
        Self { slices }
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn into_slices(self) -> Vec<Slice> {
        self.slices
    }

    /// Check the volume can be fanned out: non-empty, and every well-formed
    /// 2D slice shares the same shape.
    ///
    /// Malformed slices are left for the renderer to reject per index.
    pub fn validate(&self) -> SliceResult<Option<(usize, usize)>> {
        if self.slices.is_empty() {
            return Err(SliceError::invalid_input("volume contains no slices"));
        }

        let mut expected: Option<(usize, usize, usize)> = None;
        for (index, slice) in self.slices.iter().enumerate() {
            let Some((rows, cols)) = slice.dims_2d() else {
                continue;
            };
            match expected {
                None => expected = Some((index, rows, cols)),
                Some((first, r, c)) if (r, c) != (rows, cols) => {
                    return Err(SliceError::invalid_input(format!(
                        "slice {} has shape [{}, {}] but slice {} has shape [{}, {}]",
                        index, rows, cols, first, r, c
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(expected.map(|(_, r, c)| (r, c)))
    }
}

impl From<Vec<Slice>> for Volume {
    fn from(slices: Vec<Slice>) -> Self {
        Self::from_slices(slices)
    }
}
