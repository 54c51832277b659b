//! Persisting rendered figures.

use crate::figure::RenderedImage;
use crate::png::encode_png;
use slice_common::{SliceError, SliceResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Removes the temporary file unless it was renamed into place.
struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = fs::remove_file(path);
        }
    }
}

fn temp_prefix(file_name: &str, pid: u32) -> String {
    format!(".{}.tmp-{}-", file_name, pid)
}

/// Hidden sibling of `path`, unique per process and call.
fn temp_sibling(path: &Path) -> SliceResult<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SliceError::Io(format!("not a file path: {}", path.display())))?;
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!("{}{}", temp_prefix(file_name, std::process::id()), seq);
    Ok(path.with_file_name(temp_name))
}

/// Remove temporary siblings of `path` that process `pid` left behind,
/// e.g. when it was killed in the middle of [`write_atomic`]. Returns the
/// number of files removed.
pub fn remove_temp_files(path: &Path, pid: u32) -> usize {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return 0;
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let prefix = temp_prefix(file_name, pid);
    let removed = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .filter(|entry| fs::remove_file(entry.path()).is_ok())
        .count();

    if removed > 0 {
        debug!(path = %path.display(), pid, removed, "Removed leftover temporary files");
    }
    removed
}

/// Write `bytes` to `path` via a temporary sibling and a rename, so readers
/// never observe a half-written file. An existing file is replaced.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> SliceResult<()> {
    let temp_path = temp_sibling(path)?;
    let mut guard = TempFileGuard(Some(temp_path.clone()));

    let io_err = |action: &str, p: &Path, e: std::io::Error| {
        SliceError::Io(format!("failed to {} {}: {}", action, p.display(), e))
    };

    let mut file = fs::File::create(&temp_path).map_err(|e| io_err("create", &temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| io_err("write", &temp_path, e))?;
    file.sync_all().map_err(|e| io_err("sync", &temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| io_err("rename into", path, e))?;
    guard.0 = None;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}

/// PNG-encode `image` and write it atomically to `path`.
pub fn save_png(image: &RenderedImage, path: &Path) -> SliceResult<()> {
    let bytes = encode_png(image.pixels(), image.width() as usize, image.height() as usize)
        .map_err(|e| SliceError::render(e.to_string()))?;
    write_atomic(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("level_000.png");
        fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"new contents").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new contents");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_missing_directory_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("x.png");

        let err = write_atomic(&target, b"data").unwrap_err();
        assert!(matches!(err, SliceError::Io(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_temp_files_only_touches_that_process() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("level_003.png");
        fs::write(dir.path().join(".level_003.png.tmp-4242-0"), b"partial").unwrap();
        fs::write(dir.path().join(".level_003.png.tmp-4242-7"), b"partial").unwrap();
        fs::write(dir.path().join(".level_003.png.tmp-999-0"), b"other").unwrap();
        fs::write(dir.path().join(".level_004.png.tmp-4242-0"), b"other").unwrap();

        assert_eq!(remove_temp_files(&target, 4242), 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec![".level_003.png.tmp-999-0", ".level_004.png.tmp-4242-0"]);
    }

    #[test]
    fn test_temp_sibling_is_hidden_and_unique() {
        let a = temp_sibling(Path::new("/out/level_001.png")).unwrap();
        let b = temp_sibling(Path::new("/out/level_001.png")).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/out")));
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with(".level_001.png.tmp-"));
    }
}
