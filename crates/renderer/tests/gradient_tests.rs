//! Tests for colormaps and grid resampling.

use renderer::colormap::{Colormap, LUT_SIZE};
use renderer::gradient::{render_grid, resample, resample_grid, Color, Interpolation};
use slice_common::SliceError;
use test_utils::{assert_approx_eq, create_test_grid};

// ============================================================================
// Colormaps
// ============================================================================

#[test]
fn test_colormap_from_json() {
    let json = r##"{"name": "fire", "stops": [
        {"value": 0.0, "color": "#000000"},
        {"value": 0.5, "color": "#ff0000"},
        {"value": 1.0, "color": "#ffff00"}
    ]}"##;
    let cmap = Colormap::from_json(json).unwrap();

    assert_eq!(cmap.name, "fire");
    let mid = cmap.color_at(0.5);
    assert_eq!((mid.r, mid.g, mid.b), (255, 0, 0));
    let quarter = cmap.color_at(0.25);
    assert_eq!((quarter.r, quarter.g), (128, 0));
}

#[test]
fn test_colormap_rejects_bad_definitions() {
    let one_stop = r##"{"name": "x", "stops": [{"value": 0.0, "color": "#000000"}]}"##;
    assert!(matches!(Colormap::from_json(one_stop), Err(SliceError::InvalidInput(_))));

    let descending = r##"{"name": "x", "stops": [
        {"value": 1.0, "color": "#000000"}, {"value": 0.0, "color": "#ffffff"}]}"##;
    assert!(Colormap::from_json(descending).is_err());

    let bad_hex = r##"{"name": "x", "stops": [
        {"value": 0.0, "color": "black"}, {"value": 1.0, "color": "#ffffff"}]}"##;
    let err = Colormap::from_json(bad_hex).unwrap_err();
    assert!(err.to_string().contains("black"));
}

#[test]
fn test_colormap_resolve_builtin_and_file() {
    assert_eq!(Colormap::resolve("Magma").unwrap().name, "magma");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mine.json");
    std::fs::write(
        &path,
        r##"{"name": "mine", "stops": [{"value": 0, "color": "#102030"}, {"value": 1, "color": "#405060"}]}"##,
    )
    .unwrap();
    assert_eq!(Colormap::resolve(path.to_str().unwrap()).unwrap().name, "mine");

    let err = Colormap::resolve("rainbow").unwrap_err();
    assert!(err.to_string().contains("viridis"));
}

#[test]
fn test_lut_endpoints_match_stops() {
    let lut = Colormap::builtin("viridis").unwrap().lut();
    assert_eq!(lut.len(), LUT_SIZE);
    assert_eq!(lut[0], Color::new(0x44, 0x01, 0x54, 255));
    assert_eq!(lut[LUT_SIZE - 1], Color::new(0xfd, 0xe7, 0x25, 255));
}

// ============================================================================
// Resampling and color mapping
// ============================================================================

#[test]
fn test_bilinear_preserves_constant_field() {
    let data = vec![3.5f32; 6];
    let out = resample_grid(&data, 3, 2, 17, 11);
    assert_eq!(out.len(), 17 * 11);
    for v in out {
        assert_approx_eq!(v, 3.5, 1e-5);
    }
}

#[test]
fn test_bilinear_stays_within_source_range() {
    let data = create_test_grid(4, 3);
    let (lo, hi) = (0.0, 3002.0);
    for v in resample_grid(&data, 4, 3, 9, 7) {
        assert!(v >= lo && v <= hi, "{} outside [{}, {}]", v, lo, hi);
    }
}

#[test]
fn test_nearest_upsampling_repeats_cells() {
    let data = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let out = resample(&data, 3, 2, 6, 4, Interpolation::Nearest);
    // Row 0 and 1 come from source row 0
    assert_eq!(&out[0..6], &[0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    assert_eq!(&out[6..12], &out[0..6]);
    assert_eq!(&out[18..24], &[3.0, 3.0, 4.0, 4.0, 5.0, 5.0]);
}

#[test]
fn test_interpolation_from_str() {
    assert_eq!(Interpolation::from_str("NEAREST"), Some(Interpolation::Nearest));
    assert_eq!(Interpolation::from_str("bilinear"), Some(Interpolation::Bilinear));
    assert_eq!(Interpolation::from_str("bicubic"), None);
}

#[test]
fn test_render_grid_clamps_out_of_range_values() {
    let lut = Colormap::builtin("gray").unwrap().lut();
    let pixels = render_grid(&[-10.0, 10.0], 2, 1, 0.0, 1.0, &lut, Color::WHITE);
    assert_eq!(&pixels[0..4], &[0, 0, 0, 255]);
    assert_eq!(&pixels[4..8], &[255, 255, 255, 255]);
}
