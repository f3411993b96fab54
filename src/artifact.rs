//! Artifact persistence
//!
//! This module handles:
//! - Clearing a previous artifact, detecting when it is still in use
//! - Writing rendered bytes so the target is never left truncated

use crate::error::ReportError;
use crate::lock::is_contended;
use fs2::FileExt;
use log::debug;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Remove the artifact at `path` if there is one.
///
/// Readers that want to keep the file stable hold a shared advisory lock on
/// it; such a lock, or any failure to delete, is a contention failure.
/// Returns whether a previous artifact was removed.
pub fn clear_existing(path: &Path, base_name: &str) -> Result<bool, ReportError> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(false);
    }

    debug!("removing previous artifact {:?}", path);

    // Probe for cooperating readers. The probe handle is closed before the
    // delete so our own lock never gets in the way.
    if let Ok(file) = File::open(path) {
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
            }
            Err(e) if is_contended(&e) => {
                return Err(ReportError::contention(base_name, format!("{} is locked by a reader", path.display())));
            }
            Err(e) => debug!("could not probe lock on {:?}: {}", path, e),
        }
    }

    fs::remove_file(path)
        .map_err(|e| ReportError::contention(base_name, format!("cannot delete {}: {}", path.display(), e)))?;
    Ok(true)
}

/// Write `bytes` to `path` via a temporary file in the same directory.
///
/// The rename is the commit point: on any error the temporary file is removed
/// and `path` is left untouched. Returns the number of bytes written.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<u64, ReportError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!(".{}.", path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default());

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    // Same mode a plain create gets (0666 less the umask), not tempfile's 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }

    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| ReportError::write(path, e))?;

    write_all_synced(tmp.as_file_mut(), bytes).map_err(|e| ReportError::write(path, e))?;

    tmp.persist(path).map_err(|e| ReportError::write(path, e.error))?;
    debug!("wrote {} bytes to {:?}", bytes.len(), path);

    Ok(bytes.len() as u64)
}

fn write_all_synced(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_is_byte_exact() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Invoice42.pdf");
        let bytes: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();

        let written = write_atomic(&target, &bytes).unwrap();
        assert_eq!(written, bytes.len() as u64);
        assert_eq!(fs::read(&target).unwrap(), bytes);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Invoice42.pdf");
        write_atomic(&target, b"%PDF-1.7").unwrap();

        let names: Vec<String> =
            fs::read_dir(temp_dir.path()).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["Invoice42.pdf".to_string()]);
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("missing/Invoice42.pdf");
        let err = write_atomic(&target, b"data").unwrap_err();
        assert_eq!(err.kind(), "write_failure");
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_uses_plain_create_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let plain = temp_dir.path().join("plain.pdf");
        let target = temp_dir.path().join("Invoice42.pdf");
        fs::write(&plain, b"x").unwrap();
        write_atomic(&target, b"x").unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target), mode(&plain));
    }

    #[test]
    fn test_clear_missing_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!clear_existing(&temp_dir.path().join("none.pdf"), "none").unwrap());
    }

    #[test]
    fn test_clear_removes_unlocked_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Invoice42.pdf");
        fs::write(&target, "old").unwrap();

        assert!(clear_existing(&target, "Invoice42").unwrap());
        assert!(!target.exists());
    }

    #[test]
    fn test_clear_reports_reader_lock_as_contention() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Invoice42.pdf");
        fs::write(&target, "old").unwrap();

        let reader = File::open(&target).unwrap();
        FileExt::lock_shared(&reader).unwrap();

        let err = clear_existing(&target, "Invoice42").unwrap_err();
        assert_eq!(err.kind(), "contention_failure");
        assert!(target.exists());

        FileExt::unlock(&reader).unwrap();
        assert!(clear_existing(&target, "Invoice42").unwrap());
    }

    #[test]
    fn test_clear_undeletable_target_is_contention() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Invoice42.pdf");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let err = clear_existing(&target, "Invoice42").unwrap_err();
        assert_eq!(err.kind(), "contention_failure");
        assert!(err.to_string().contains("Invoice42"));
    }
}
