//! Loading volumes from data files.
//!
//! Two formats are understood:
//! - **JSON**: `{"shape": [d, r, c], "data": [...]}` with row-major samples
//!   (`null` reads as NaN), or `{"slices": [[[..], ..], ..]}` with nested rows.
//! - **NPY**: NumPy array files, format versions 1-3, little-endian
//!   `float32`/`float64`, C order.
//!
//! A 2D array in either format loads as a single-slice volume.

use crate::error::{SliceError, SliceResult};
use crate::volume::{element_count, Slice, Volume};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Json,
    Npy,
}

impl VolumeFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> SliceResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "npy" => Ok(Self::Npy),
            _ => Err(SliceError::invalid_input(format!(
                "unsupported data file '{}': expected .json or .npy",
                path.display()
            ))),
        }
    }
}

/// Load a volume from a `.json` or `.npy` file.
pub fn load_volume(path: impl AsRef<Path>) -> SliceResult<Volume> {
    let path = path.as_ref();
    let format = VolumeFormat::from_path(path)?;
    let bytes = std::fs::read(path)
        .map_err(|e| SliceError::Io(format!("failed to read {}: {}", path.display(), e)))?;

    let volume = match format {
        VolumeFormat::Json => parse_json_volume(&bytes)?,
        VolumeFormat::Npy => parse_npy_volume(&bytes)?,
    };

    debug!(path = %path.display(), ?format, slices = volume.len(), "Loaded volume");
    Ok(volume)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonVolume {
    Flat {
        shape: Vec<usize>,
        data: Vec<Option<f32>>,
    },
    Nested {
        slices: Vec<Vec<Vec<Option<f32>>>>,
    },
}

/// Parse the JSON volume layouts described in the module docs.
pub fn parse_json_volume(bytes: &[u8]) -> SliceResult<Volume> {
    let parsed: JsonVolume = serde_json::from_slice(bytes)?;
    match parsed {
        JsonVolume::Flat { shape, data } => {
            let data = data.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect();
            volume_from_shape(&shape, data)
        }
        JsonVolume::Nested { slices } => {
            let slices = slices
                .into_iter()
                .enumerate()
                .map(|(i, rows)| {
                    let rows = rows
                        .into_iter()
                        .map(|row| row.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
                        .collect();
                    Slice::from_rows(rows)
                        .map_err(|e| SliceError::invalid_input(format!("slice {}: {}", i, e)))
                })
                .collect::<SliceResult<Vec<_>>>()?;
            Ok(Volume::from_slices(slices))
        }
    }
}

fn volume_from_shape(shape: &[usize], data: Vec<f32>) -> SliceResult<Volume> {
    match *shape {
        [depth, rows, cols] => Volume::from_flat(depth, rows, cols, data),
        [rows, cols] => Ok(Volume::from_slices(vec![Slice::matrix(rows, cols, data)?])),
        _ => Err(SliceError::invalid_input(format!(
            "expected a 2D or 3D array, got shape {:?}",
            shape
        ))),
    }
}

/// Header fields of an NPY file that matter for loading.
#[derive(Debug, PartialEq)]
struct NpyHeader {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Parse an in-memory `.npy` file.
pub fn parse_npy_volume(bytes: &[u8]) -> SliceResult<Volume> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(SliceError::invalid_input("not an NPY file (bad magic)"));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(SliceError::invalid_input("truncated NPY header"));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => {
            return Err(SliceError::invalid_input(format!(
                "unsupported NPY format version {}",
                v
            )))
        }
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(SliceError::invalid_input("truncated NPY header"));
    }
    let header_text = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| SliceError::invalid_input("NPY header is not valid text"))?;
    let header = parse_npy_header(header_text)?;

    if header.fortran_order {
        return Err(SliceError::invalid_input("Fortran-ordered NPY arrays are not supported"));
    }

    let count = element_count(&header.shape).ok_or_else(|| {
        SliceError::invalid_input(format!("NPY shape {:?} is too large", header.shape))
    })?;
    let payload = &bytes[data_start..];
    let data = match header.descr.as_str() {
        "<f4" | "=f4" => decode_samples::<4>(payload, count, |b| f32::from_le_bytes(b))?,
        "<f8" | "=f8" => decode_samples::<8>(payload, count, |b| f64::from_le_bytes(b) as f32)?,
        other => {
            return Err(SliceError::invalid_input(format!(
                "unsupported NPY dtype '{}': expected <f4 or <f8",
                other
            )))
        }
    };

    volume_from_shape(&header.shape, data)
}

fn decode_samples<const N: usize>(
    payload: &[u8],
    count: usize,
    decode: impl Fn([u8; N]) -> f32,
) -> SliceResult<Vec<f32>> {
    let needed = count
        .checked_mul(N)
        .ok_or_else(|| SliceError::invalid_input("NPY shape is too large"))?;
    if payload.len() < needed {
        return Err(SliceError::invalid_input(format!(
            "NPY payload has {} bytes, expected {}",
            payload.len(),
            needed
        )));
    }
    Ok(payload[..needed]
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            decode(buf)
        })
        .collect())
}

/// Parse the Python dict literal NumPy writes as its header, e.g.
/// `{'descr': '<f4', 'fortran_order': False, 'shape': (2, 3, 4), }`.
fn parse_npy_header(text: &str) -> SliceResult<NpyHeader> {
    let descr = dict_value(text, "descr")?
        .trim_matches(|c: char| c == '\'' || c == '"')
        .to_string();

    let fortran_order = match dict_value(text, "fortran_order")? {
        "True" => true,
        "False" => false,
        other => {
            return Err(SliceError::invalid_input(format!(
                "bad fortran_order value '{}'",
                other
            )))
        }
    };

    let shape_text = dict_value(text, "shape")?;
    let inner = shape_text
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| SliceError::invalid_input(format!("bad shape '{}'", shape_text)))?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| SliceError::invalid_input(format!("bad shape dimension '{}'", s)))
        })
        .collect::<SliceResult<Vec<_>>>()?;

    Ok(NpyHeader {
        descr,
        fortran_order,
        shape,
    })
}

/// Raw text of the value stored under `key` in the header dict.
fn dict_value<'a>(text: &'a str, key: &str) -> SliceResult<&'a str> {
    let needle = format!("'{}':", key);
    let start = text
        .find(&needle)
        .map(|i| i + needle.len())
        .ok_or_else(|| SliceError::invalid_input(format!("NPY header is missing '{}'", key)))?;
    let rest = text[start..].trim_start();

    // Tuples contain commas, so they end at the closing paren.
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find(|c: char| c == ',' || c == '}')
    }
    .ok_or_else(|| SliceError::invalid_input(format!("unterminated value for '{}'", key)))?;

    Ok(rest[..end].trim())
}
