//! End-to-end runs of the slice-render binary.

use std::path::Path;
use std::process::{Command, Output};
use test_utils::{assert_dir_files, encode_npy_f32, encode_volume_json, gradient_volume, temp_test_dir};

fn slice_render(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_slice-render"))
        .args(args)
        .env_remove("SLICE_RENDER_WORKERS")
        .env_remove("SLICE_RENDER_MODE")
        .env_remove("SLICE_RENDER_COLORMAP")
        .env_remove("SLICE_RENDER_TIMEOUT_SECS")
        .env_remove("SLICE_RENDER_TITLE_PATTERN")
        .env_remove("SLICE_RENDER_WORKER_PROGRAM")
        .env("RUST_LOG", "warn")
        .output()
        .expect("slice-render should start")
}

fn write_json_volume(dir: &Path, depth: usize) -> String {
    let path = dir.join("volume.json");
    std::fs::write(&path, encode_volume_json(&gradient_volume(depth, 6, 5))).unwrap();
    path.display().to_string()
}

fn assert_png_size(path: &Path, width: u32, height: u32) {
    let img = image::open(path).unwrap_or_else(|e| panic!("{} should decode: {}", path.display(), e));
    assert_eq!((img.width(), img.height()), (width, height));
}

#[test]
fn test_render_inherit_mode() {
    let input = temp_test_dir();
    let out = temp_test_dir();
    let volume = write_json_volume(input.path(), 3);

    let output = slice_render(&[
        "render",
        "--input",
        &volume,
        "--output-dir",
        out.path().to_str().unwrap(),
        "--workers",
        "2",
        "--size",
        "120x90",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_dir_files!(out.path(), ["level_000.png", "level_001.png", "level_002.png"]);
    assert_png_size(&out.path().join("level_001.png"), 120, 90);
}

#[test]
fn test_render_fresh_mode_matches_inherit() {
    let input = temp_test_dir();
    let volume = write_json_volume(input.path(), 4);
    let inherit = temp_test_dir();
    let fresh = temp_test_dir();

    for (mode, dir) in [("inherit", &inherit), ("fresh", &fresh)] {
        let output = slice_render(&[
            "render",
            "--input",
            &volume,
            "--output-dir",
            dir.path().to_str().unwrap(),
            "--workers",
            "2",
            "--mode",
            mode,
            "--size",
            "96x72",
        ]);
        assert!(
            output.status.success(),
            "{} mode failed: {}",
            mode,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    assert_eq!(
        test_utils::list_file_names(inherit.path()),
        test_utils::list_file_names(fresh.path())
    );
    for name in test_utils::list_file_names(fresh.path()) {
        assert_eq!(
            std::fs::read(inherit.path().join(&name)).unwrap(),
            std::fs::read(fresh.path().join(&name)).unwrap(),
            "{} differs between modes",
            name
        );
    }
}

#[test]
fn test_render_npy_input_with_title_pattern() {
    let input = temp_test_dir();
    let out = temp_test_dir();
    let npy = input.path().join("volume.npy");
    let data: Vec<f32> = (0..2 * 3 * 3).map(|i| i as f32).collect();
    std::fs::write(&npy, encode_npy_f32(&[2, 3, 3], &data)).unwrap();

    let output = slice_render(&[
        "render",
        "--input",
        npy.to_str().unwrap(),
        "--output-dir",
        out.path().to_str().unwrap(),
        "--title-pattern",
        "depth_{index}",
        "--size",
        "64x48",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_dir_files!(out.path(), ["depth_0.png", "depth_1.png"]);
}

#[test]
fn test_partial_failure_exits_one_and_names_index() {
    let input = temp_test_dir();
    let out = temp_test_dir();
    let volume = write_json_volume(input.path(), 3);
    // A directory where slice 1's file belongs makes only that save fail.
    std::fs::create_dir(out.path().join("level_001.png")).unwrap();

    let output = slice_render(&[
        "render",
        "--input",
        &volume,
        "--output-dir",
        out.path().to_str().unwrap(),
        "--size",
        "64x48",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2/3 slices written"), "stderr: {}", stderr);
    assert!(stderr.contains("slice 1 (level_001)"), "stderr: {}", stderr);
    assert!(out.path().join("level_000.png").is_file());
    assert!(out.path().join("level_002.png").is_file());
}

#[test]
fn test_missing_input_exits_two() {
    let out = temp_test_dir();
    let output = slice_render(&[
        "render",
        "--input",
        "/nonexistent/volume.npy",
        "--output-dir",
        out.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load volume"));
}

#[test]
fn test_mismatched_shapes_exit_two_without_files() {
    let input = temp_test_dir();
    let out = temp_test_dir();
    let target = out.path().join("figs");
    let path = input.path().join("volume.json");
    std::fs::write(&path, r#"{"slices": [[[1, 2], [3, 4]], [[1, 2, 3]]]}"#).unwrap();

    let output = slice_render(&[
        "render",
        "--input",
        path.to_str().unwrap(),
        "--output-dir",
        target.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!target.exists());
}

#[test]
fn test_demo_writes_every_level() {
    let out = temp_test_dir();
    let output = slice_render(&[
        "demo",
        "--depth",
        "3",
        "--rows",
        "20",
        "--cols",
        "20",
        "--seed",
        "7",
        "--output-dir",
        out.path().to_str().unwrap(),
        "--size",
        "80x60",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("3/3 slices written"));
    assert_dir_files!(out.path(), ["level_000.png", "level_001.png", "level_002.png"]);
}

#[test]
fn test_report_json_lists_written_files() {
    let out = temp_test_dir();
    let report = out.path().join("report.json");
    let figs = out.path().join("figs");

    let output = slice_render(&[
        "demo",
        "--depth",
        "2",
        "--rows",
        "8",
        "--cols",
        "8",
        "--output-dir",
        figs.to_str().unwrap(),
        "--size",
        "64x48",
        "--report",
        report.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let parsed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report).unwrap()).unwrap();
    assert_eq!(parsed["total"], 2);
    assert_eq!(parsed["written"].as_array().unwrap().len(), 2);
}

#[test]
fn test_fresh_mode_deadline_fails_slices_without_leftovers() {
    let input = temp_test_dir();
    let out = temp_test_dir();
    let volume = write_json_volume(input.path(), 3);

    let output = slice_render(&[
        "render",
        "--input",
        &volume,
        "--output-dir",
        out.path().to_str().unwrap(),
        "--workers",
        "1",
        "--mode",
        "fresh",
        "--timeout-secs",
        "0.001",
        "--size",
        "2000x1500",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("0/3 slices written"), "stderr: {}", stderr);
    assert!(stderr.contains("timed out"), "stderr: {}", stderr);
    assert!(test_utils::list_file_names(out.path()).is_empty());
}
