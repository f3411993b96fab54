//! Per-key mutual exclusion for report jobs.
//!
//! Two runs for the same job key would race on the processing marker and the
//! artifact path. Each run takes an exclusive advisory lock (`fs2`) on a lock
//! file in the output directory before touching anything else. The lock is
//! released when the [`JobLock`] is dropped. The lock file itself stays, one
//! per base name in job scope: unlinking it while a waiter has it open would
//! let that waiter and a newcomer lock different inodes at once.

use crate::sentinel::MarkerScope;
use crate::types::JobKey;
use fs2::FileExt;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const DIRECTORY_LOCK_NAME: &str = ".report-pipeline.lock";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Path of the lock file guarding `key` under `scope`.
///
/// In directory scope all jobs share one lock, which serializes writers of the
/// shared fail marker.
pub fn lock_path(key: &JobKey, scope: MarkerScope) -> PathBuf {
    match scope {
        MarkerScope::Job => key.output_dir.join(format!(".{}.lock", key.base_name)),
        MarkerScope::Directory => key.output_dir.join(DIRECTORY_LOCK_NAME),
    }
}

/// Held exclusive lock; unlocks on drop
#[derive(Debug)]
pub struct JobLock {
    file: File,
    path: PathBuf,
}

impl JobLock {
    /// Acquire the lock for `key`, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` if another holder kept the lock for the whole wait.
    pub fn acquire(key: &JobKey, scope: MarkerScope, timeout: Duration) -> io::Result<Option<JobLock>> {
        fs::create_dir_all(&key.output_dir)?;
        let path = lock_path(key, scope);
        let file = open_lock_file(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("acquired job lock {:?}", path);
                    return Ok(Some(JobLock { file, path }));
                }
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        debug!("gave up waiting for job lock {:?}", path);
                        return Ok(None);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("released job lock {:?}", self.path);
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).truncate(false).read(true).write(true).open(path)
}

/// Whether a lock error means "someone else holds it"
pub fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_per_scope() {
        let key = JobKey::new("/reports", "Invoice42");
        assert_eq!(lock_path(&key, MarkerScope::Job), PathBuf::from("/reports/.Invoice42.lock"));
        assert_eq!(lock_path(&key, MarkerScope::Directory), PathBuf::from("/reports/.report-pipeline.lock"));
    }

    #[test]
    fn test_second_acquire_times_out_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");

        let first = JobLock::acquire(&key, MarkerScope::Job, Duration::from_millis(10)).unwrap();
        assert!(first.is_some());

        let second = JobLock::acquire(&key, MarkerScope::Job, Duration::from_millis(120)).unwrap();
        assert!(second.is_none());

        drop(first);
        let third = JobLock::acquire(&key, MarkerScope::Job, Duration::from_millis(10)).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn test_lock_file_outlives_release() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");

        drop(JobLock::acquire(&key, MarkerScope::Job, Duration::ZERO).unwrap());

        assert!(lock_path(&key, MarkerScope::Job).is_file());
    }

    #[test]
    fn test_different_keys_do_not_block_in_job_scope() {
        let temp_dir = TempDir::new().unwrap();
        let a = JobKey::new(temp_dir.path(), "A");
        let b = JobKey::new(temp_dir.path(), "B");

        let _a = JobLock::acquire(&a, MarkerScope::Job, Duration::ZERO).unwrap().unwrap();
        assert!(JobLock::acquire(&b, MarkerScope::Job, Duration::ZERO).unwrap().is_some());
    }

    #[test]
    fn test_directory_scope_serializes_all_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let a = JobKey::new(temp_dir.path(), "A");
        let b = JobKey::new(temp_dir.path(), "B");

        let _a = JobLock::acquire(&a, MarkerScope::Directory, Duration::ZERO).unwrap().unwrap();
        assert!(JobLock::acquire(&b, MarkerScope::Directory, Duration::ZERO).unwrap().is_none());
    }
}
