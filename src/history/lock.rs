//! Cross-process exclusive lock around the snapshot's read-modify-write
//! cycle.
//!
//! Parallel CI jobs (workflow matrices, reruns) may race to update the same
//! snapshot. Each writer takes a lock file next to the snapshot before
//! loading, and releases it after the renamed save. A conflicting writer
//! retries a bounded number of times with backoff and then reports `Busy`;
//! the caller is expected to rerun the whole load-append-save cycle, never to
//! overwrite blindly.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use slog::{debug, Logger};

use crate::errors::{Error, Result};

const BACKOFF_BASE_MS: u64 = 50;
const BACKOFF_CAP_MS: u64 = 2_000;

/// RAII guard for the snapshot lock file. Dropping it releases the lock.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Acquires the lock for the snapshot at `store_path`, retrying
    /// `retries` times with exponential backoff before giving up with
    /// `Busy`.
    pub fn acquire(store_path: &Path, retries: u32, log: &Logger) -> Result<Self> {
        let path = lock_path(store_path);

        for attempt in 0..=retries {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut f) => {
                    // Owner pid, for manual cleanup after a crashed job.
                    let _ = writeln!(f, "{}", std::process::id());
                    return Ok(StoreLock { path });
                }
                Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
                    if attempt == retries {
                        break;
                    }
                    let backoff = backoff_ms(attempt);
                    debug!(
                        log,
                        "store lock {} held by another writer, retrying in {}ms",
                        path.display(),
                        backoff
                    );
                    thread::sleep(Duration::from_millis(backoff));
                }
                Err(e) => return Err(Error::io(&path, e)),
            }
        }

        Err(Error::Busy(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut p = store_path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

fn backoff_ms(attempt: u32) -> u64 {
    BACKOFF_BASE_MS
        .saturating_mul(1u64 << attempt.min(10))
        .min(BACKOFF_CAP_MS)
}
