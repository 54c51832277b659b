//! Tests for loading volumes from JSON and NPY files on disk.

use slice_common::{load_volume, SliceError};
use std::path::PathBuf;

// ============================================================================
// Helper functions
// ============================================================================

fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("Failed to write test input");
    path
}

/// Minimal NPY v1.0 writer; the header is not padded, which NumPy tolerates
/// on read and so must we.
fn npy_bytes(descr: &str, shape: &str, payload: &[u8]) -> Vec<u8> {
    let header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}\n",
        descr, shape
    );
    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

// ============================================================================
// NPY
// ============================================================================

#[test]
fn test_load_npy_f4_volume() {
    let dir = tempfile::tempdir().unwrap();
    let payload: Vec<u8> = (0..8).flat_map(|i| (i as f32).to_le_bytes()).collect();
    let path = write_file(&dir, "vol.npy", &npy_bytes("<f4", "(2, 2, 2)", &payload));

    let volume = load_volume(&path).unwrap();
    assert_eq!(volume.len(), 2);
    assert_eq!(volume.slices()[1].data(), &[4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn test_load_npy_f8_matrix_as_single_slice() {
    let dir = tempfile::tempdir().unwrap();
    let payload: Vec<u8> = [0.25f64, 0.5, 0.75, 1.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let path = write_file(&dir, "m.npy", &npy_bytes("<f8", "(2, 2)", &payload));

    let volume = load_volume(&path).unwrap();
    assert_eq!(volume.len(), 1);
    assert_eq!(volume.slices()[0].shape(), &[2, 2]);
    assert_eq!(volume.slices()[0].data()[3], 1.0);
}

#[test]
fn test_load_npy_rejects_integer_dtype() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "i.npy", &npy_bytes("<i8", "(1, 1, 1)", &[0; 8]));

    let err = load_volume(&path).unwrap_err();
    assert!(matches!(err, SliceError::InvalidInput(_)));
    assert!(err.to_string().contains("<i8"));
}

#[test]
fn test_load_npy_rejects_short_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "short.npy", &npy_bytes("<f4", "(1, 2, 2)", &[0; 8]));
    assert!(load_volume(&path).is_err());
}

#[test]
fn test_load_npy_rejects_overflowing_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "huge.npy",
        &npy_bytes("<f4", "(4611686018427387904, 4, 4)", &[0; 16]),
    );

    let err = load_volume(&path).unwrap_err();
    assert!(matches!(err, SliceError::InvalidInput(_)));
    assert!(err.to_string().contains("too large"), "{}", err);
}

#[test]
fn test_load_npy_rejects_shape_overflowing_byte_count() {
    let dir = tempfile::tempdir().unwrap();
    // The element count fits in usize but times 8 bytes does not.
    let path = write_file(
        &dir,
        "wide.npy",
        &npy_bytes("<f8", "(1, 2305843009213693952)", &[0; 16]),
    );

    assert!(matches!(load_volume(&path), Err(SliceError::InvalidInput(_))));
}

#[test]
fn test_load_json_rejects_overflowing_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "huge.json",
        br#"{"shape": [4611686018427387904, 4, 4], "data": [0.0]}"#,
    );

    assert!(matches!(load_volume(&path), Err(SliceError::InvalidInput(_))));
}

#[test]
fn test_load_npy_rejects_bad_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "bad.npy", b"definitely not numpy");
    assert!(matches!(load_volume(&path), Err(SliceError::InvalidInput(_))));
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_load_json_flat() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "vol.json",
        br#"{"shape": [3, 1, 2], "data": [0, 1, 2, 3, 4, 5]}"#,
    );

    let volume = load_volume(&path).unwrap();
    assert_eq!(volume.len(), 3);
    assert_eq!(volume.slices()[2].data(), &[4.0, 5.0]);
}

#[test]
fn test_load_json_nested() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "nested.json",
        br#"{"slices": [[[0.1, 0.2], [0.3, 0.4]], [[1, 2], [3, 4]]]}"#,
    );

    let volume = load_volume(&path).unwrap();
    assert_eq!(volume.len(), 2);
    assert_eq!(volume.slices()[0].shape(), &[2, 2]);
}

#[test]
fn test_load_json_ragged_slice_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "ragged.json", br#"{"slices": [[[1, 2], [3]]]}"#);

    let err = load_volume(&path).unwrap_err();
    assert!(err.to_string().contains("slice 0"));
}

#[test]
fn test_load_missing_file_is_io_error() {
    let err = load_volume("/nonexistent/dir/vol.npy").unwrap_err();
    assert!(matches!(err, SliceError::Io(_)));
}
