//! The exclusive process lock guarding the delivery pipeline.
//!
//! At most one pipeline instance may run a batch at a time, system-wide.
//! The lock is an OS-advisory exclusive lock (`flock`-style via `fs2`) on a
//! file under the storage root:
//!
//! - **Non-blocking**: if another process holds it, [`PipelineLock::try_acquire`]
//!   returns `None` immediately and the caller skips this cycle.
//! - **Scoped release**: acquisition returns a guard; the lock is released
//!   when the guard drops, on every exit path including panics.
//! - **No stale artifacts**: the lock is tied to the open file descriptor,
//!   so a hard process kill releases it automatically. The lock file itself
//!   is an empty marker that may persist; its presence means nothing.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while setting up the lock file.
///
/// Contention is not an error; it is the `Ok(None)` case of `try_acquire`.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;

/// Factory for batch-scoped exclusive locks on one lock file.
#[derive(Debug, Clone)]
pub struct PipelineLock {
    path: PathBuf,
}

/// Held while a batch runs; unlocks on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl PipelineLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PipelineLock { path: path.into() }
    }

    /// Attempts to take the lock without blocking.
    ///
    /// Returns `Ok(Some(guard))` on success and `Ok(None)` when another
    /// process (or another guard in this process) already holds it. Only
    /// filesystem problems opening the lock file surface as `Err`.
    pub fn try_acquire(&self) -> Result<Option<LockGuard>> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %self.path.display(), "pipeline lock acquired");
                Ok(Some(LockGuard {
                    file,
                    path: self.path.clone(),
                }))
            }
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Dropping the descriptor would release the lock anyway; the explicit
        // unlock keeps the release visible at a deterministic point.
        let _ = fs2::FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "pipeline lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_on_fresh_path_succeeds() {
        let dir = tempdir().unwrap();
        let lock = PipelineLock::new(dir.path().join("pipeline.lock"));

        let guard = lock.try_acquire().unwrap();
        assert!(guard.is_some());
    }

    #[test]
    fn second_acquire_while_held_returns_none() {
        let dir = tempdir().unwrap();
        let lock = PipelineLock::new(dir.path().join("pipeline.lock"));

        let _held = lock.try_acquire().unwrap().expect("first acquire");
        let contender = PipelineLock::new(lock.path());
        assert!(contender.try_acquire().unwrap().is_none());
    }

    #[test]
    fn lock_is_reacquirable_after_guard_drops() {
        let dir = tempdir().unwrap();
        let lock = PipelineLock::new(dir.path().join("pipeline.lock"));

        {
            let _guard = lock.try_acquire().unwrap().expect("first acquire");
        }
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn guard_releases_even_when_holder_panics() {
        let dir = tempdir().unwrap();
        let lock = PipelineLock::new(dir.path().join("pipeline.lock"));

        let path = lock.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let inner = PipelineLock::new(path);
            let _guard = inner.try_acquire().unwrap().expect("acquire");
            panic!("batch blew up");
        });
        assert!(result.is_err());

        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn exactly_one_of_two_concurrent_acquires_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");

        let a = PipelineLock::new(&path);
        let b = PipelineLock::new(&path);

        let ga = a.try_acquire().unwrap();
        let gb = b.try_acquire().unwrap();
        assert_eq!(ga.is_some() as u8 + gb.is_some() as u8, 1);
    }

    #[test]
    fn leftover_lock_file_is_not_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");

        // Simulate a previous hard-killed process: the marker file exists
        // but nothing holds the advisory lock.
        std::fs::write(&path, b"").unwrap();

        let lock = PipelineLock::new(&path);
        assert!(lock.try_acquire().unwrap().is_some());
    }
}
