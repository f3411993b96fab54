//! Job-status sentinel files.
//!
//! A report job leaves two kinds of markers next to its artifact:
//!
//! - `<base>(processing)` - exists while a render is in flight. A marker that
//!   survives a crash tells an operator the run never finished.
//! - a fail marker - holds the diagnostic of the last failed attempt. In
//!   [`MarkerScope::Job`] it is `<base>.REPORTFAIL_README.txt`; in
//!   [`MarkerScope::Directory`] every job in the directory shares
//!   `REPORTFAIL_README.txt`.
//!
//! The orchestrator only talks to [`JobStatusStore`], so the filesystem
//! markers can be swapped for another store.

use crate::types::JobKey;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const PROCESSING_SUFFIX: &str = "(processing)";
const FAIL_MARKER_NAME: &str = "REPORTFAIL_README.txt";

/// How widely a fail marker is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerScope {
    /// One fail marker per (directory, base name)
    #[default]
    Job,
    /// One fail marker per directory, shared by every job writing there
    Directory,
}

impl std::str::FromStr for MarkerScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(MarkerScope::Job),
            "directory" | "dir" => Ok(MarkerScope::Directory),
            other => Err(format!("unknown marker scope '{}' (expected 'job' or 'directory')", other)),
        }
    }
}

/// Begin / fail / end bookkeeping for a job
pub trait JobStatusStore: Send + Sync {
    /// Mark the job as in flight and clear a stale failure record.
    fn begin(&self, key: &JobKey) -> io::Result<()>;

    /// Record why the job failed, replacing any earlier record.
    fn fail(&self, key: &JobKey, message: &str) -> io::Result<()>;

    /// Clear the in-flight mark. Must succeed when no mark exists.
    fn end(&self, key: &JobKey) -> io::Result<()>;
}

/// Filesystem implementation of [`JobStatusStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SentinelFiles {
    scope: MarkerScope,
}

impl SentinelFiles {
    pub fn new(scope: MarkerScope) -> Self {
        Self { scope }
    }

    pub fn processing_marker(&self, key: &JobKey) -> PathBuf {
        key.output_dir.join(format!("{}{}", key.base_name, PROCESSING_SUFFIX))
    }

    pub fn fail_marker(&self, key: &JobKey) -> PathBuf {
        match self.scope {
            MarkerScope::Job => key.output_dir.join(format!("{}.{}", key.base_name, FAIL_MARKER_NAME)),
            MarkerScope::Directory => key.output_dir.join(FAIL_MARKER_NAME),
        }
    }
}

impl JobStatusStore for SentinelFiles {
    fn begin(&self, key: &JobKey) -> io::Result<()> {
        if !key.output_dir.exists() {
            debug!("creating output directory {:?}", key.output_dir);
            fs::create_dir_all(&key.output_dir)?;
        }

        // Stale failure first: if it cannot be cleared, no processing marker is left behind
        remove_if_present(&self.fail_marker(key))?;

        let marker = self.processing_marker(key);
        fs::write(&marker, "")?;
        debug!("wrote processing marker {:?}", marker);
        Ok(())
    }

    fn fail(&self, key: &JobKey, message: &str) -> io::Result<()> {
        let marker = self.fail_marker(key);
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let content = format!("[{}] {} report creation failed: {}\n", timestamp, key.base_name, message);
        fs::write(&marker, content)?;
        debug!("wrote fail marker {:?}", marker);
        Ok(())
    }

    fn end(&self, key: &JobKey) -> io::Result<()> {
        remove_if_present(&self.processing_marker(key))
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("removed {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Guard that clears the processing marker when dropped.
///
/// Returned by [`ProcessingGuard::begin`]; the marker is removed exactly once,
/// either by [`finish`](ProcessingGuard::finish) or on drop (early return or
/// panic).
pub struct ProcessingGuard<'a> {
    store: &'a dyn JobStatusStore,
    key: &'a JobKey,
    ended: bool,
}

impl<'a> ProcessingGuard<'a> {
    /// Begin processing. If `begin` fails part way, processing is ended
    /// before the error is returned.
    pub fn begin(store: &'a dyn JobStatusStore, key: &'a JobKey) -> io::Result<Self> {
        let guard = Self { store, key, ended: false };
        store.begin(key)?;
        Ok(guard)
    }

    /// Record a failure for this job while it is still in flight.
    pub fn fail(&self, message: &str) -> io::Result<()> {
        self.store.fail(self.key, message)
    }

    /// End processing now and report any error doing so.
    pub fn finish(mut self) -> io::Result<()> {
        self.ended = true;
        self.store.end(self.key)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if !self.ended {
            self.ended = true;
            if let Err(e) = self.store.end(self.key) {
                warn!("failed to remove processing marker for {}: {}", self.key.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_begin_creates_missing_directory_and_marker() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path().join("nested/reports"), "Invoice42");
        let store = SentinelFiles::default();

        store.begin(&key).unwrap();

        assert!(key.output_dir.is_dir());
        let marker = store.processing_marker(&key);
        assert!(marker.ends_with("Invoice42(processing)"));
        assert_eq!(fs::read_to_string(marker).unwrap(), "");
    }

    #[test]
    fn test_begin_clears_previous_fail_marker() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");
        let store = SentinelFiles::default();

        store.fail(&key, "target in use").unwrap();
        assert!(store.fail_marker(&key).exists());

        store.begin(&key).unwrap();
        assert!(!store.fail_marker(&key).exists());
    }

    #[test]
    fn test_job_scope_leaves_other_jobs_fail_marker() {
        let temp_dir = TempDir::new().unwrap();
        let store = SentinelFiles::new(MarkerScope::Job);
        let a = JobKey::new(temp_dir.path(), "A");
        let b = JobKey::new(temp_dir.path(), "B");

        store.fail(&a, "boom").unwrap();
        store.begin(&b).unwrap();

        assert!(store.fail_marker(&a).exists());
    }

    #[test]
    fn test_directory_scope_shares_fail_marker() {
        let temp_dir = TempDir::new().unwrap();
        let store = SentinelFiles::new(MarkerScope::Directory);
        let a = JobKey::new(temp_dir.path(), "A");
        let b = JobKey::new(temp_dir.path(), "B");

        assert_eq!(store.fail_marker(&a), store.fail_marker(&b));
        assert!(store.fail_marker(&a).ends_with("REPORTFAIL_README.txt"));

        store.fail(&a, "boom").unwrap();
        store.begin(&b).unwrap();
        assert!(!store.fail_marker(&a).exists());
    }

    #[test]
    fn test_fail_marker_overwrites_and_names_base() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");
        let store = SentinelFiles::default();

        store.fail(&key, "first").unwrap();
        store.fail(&key, "second").unwrap();

        let content = fs::read_to_string(store.fail_marker(&key)).unwrap();
        assert!(content.contains("Invoice42"));
        assert!(content.contains("second"));
        assert!(!content.contains("first"));
    }

    #[test]
    fn test_marker_scope_from_str() {
        assert_eq!("job".parse::<MarkerScope>().unwrap(), MarkerScope::Job);
        assert_eq!("directory".parse::<MarkerScope>().unwrap(), MarkerScope::Directory);
        assert!("global".parse::<MarkerScope>().is_err());
    }

    #[test]
    fn test_end_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");
        let store = SentinelFiles::default();

        store.begin(&key).unwrap();
        store.end(&key).unwrap();
        store.end(&key).unwrap();
        assert!(!store.processing_marker(&key).exists());
    }

    #[test]
    fn test_guard_removes_marker_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");
        let store = SentinelFiles::default();

        {
            let _guard = ProcessingGuard::begin(&store, &key).unwrap();
            assert!(store.processing_marker(&key).exists());
        }
        assert!(!store.processing_marker(&key).exists());
    }

    /// Counts end() calls so the exactly-once rule can be checked
    #[derive(Default)]
    struct CountingStore {
        ends: AtomicUsize,
        refuse_begin: bool,
    }

    impl JobStatusStore for CountingStore {
        fn begin(&self, _key: &JobKey) -> io::Result<()> {
            if self.refuse_begin {
                return Err(io::Error::other("marker half written"));
            }
            Ok(())
        }
        fn fail(&self, _key: &JobKey, _message: &str) -> io::Result<()> {
            Ok(())
        }
        fn end(&self, _key: &JobKey) -> io::Result<()> {
            self.ends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_guard_ends_exactly_once() {
        let key = JobKey::new("/unused", "x");
        let store = CountingStore::default();

        let guard = ProcessingGuard::begin(&store, &key).unwrap();
        guard.finish().unwrap();
        assert_eq!(store.ends.load(Ordering::SeqCst), 1);

        {
            let _guard = ProcessingGuard::begin(&store, &key).unwrap();
        }
        assert_eq!(store.ends.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_begin_still_ends_processing() {
        let key = JobKey::new("/unused", "x");
        let store = CountingStore { refuse_begin: true, ..Default::default() };

        assert!(ProcessingGuard::begin(&store, &key).is_err());
        assert_eq!(store.ends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_begin_with_uncleared_fail_marker_writes_no_processing_marker() {
        let temp_dir = TempDir::new().unwrap();
        let key = JobKey::new(temp_dir.path(), "Invoice42");
        let store = SentinelFiles::default();
        fs::create_dir_all(store.fail_marker(&key).join("stuck")).unwrap();

        assert!(store.begin(&key).is_err());
        assert!(!store.processing_marker(&key).exists());
    }
}
