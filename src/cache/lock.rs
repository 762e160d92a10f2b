//! Cross-process directory lock
//!
//! A lock is a sentinel file created with `create_new`, so only one
//! process can hold it at a time. The file disappears when the handle is
//! dropped, on every exit path.

use crate::error::{PrebuildError, PrebuildResult};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Name of the sentinel file placed in a locked directory
pub const LOCK_FILE_NAME: &str = ".prebuild.lock";

/// Log progress every this many failed attempts
const PROGRESS_EVERY: u32 = 10;

#[cfg(windows)]
const FILE_FLAG_DELETE_ON_CLOSE: u32 = 0x0400_0000;

/// Retry policy for acquiring a [`FileLock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Maximum number of creation attempts
    pub attempts: u32,
    /// Delay between attempts
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            attempts: 100,
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Scoped, exclusive hold on a directory
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
    attempt: u32,
}

impl FileLock {
    /// Acquire the lock for `directory`, retrying per `options`
    pub async fn try_create(directory: &Path, options: &LockOptions) -> PrebuildResult<Self> {
        let path = directory.join(LOCK_FILE_NAME);
        let started = Instant::now();

        for attempt in 1..=options.attempts {
            match open_exclusive(&path) {
                Ok(file) => {
                    debug!("Acquired {} on attempt {}", path.display(), attempt);
                    return Ok(Self {
                        path,
                        file: Some(file),
                        attempt,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if attempt % PROGRESS_EVERY == 0 {
                        info!(
                            "Waiting for lock {} ({} attempts, {:.1}s elapsed)",
                            path.display(),
                            attempt,
                            started.elapsed().as_secs_f64()
                        );
                    }
                }
                Err(e) => {
                    return Err(PrebuildError::io(
                        format!("creating lock file {}", path.display()),
                        e,
                    ))
                }
            }

            if attempt < options.attempts {
                tokio::time::sleep(options.retry_interval).await;
            }
        }

        Err(PrebuildError::LockTimeout {
            path,
            attempts: options.attempts,
        })
    }

    /// Path of the sentinel file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The 1-based attempt on which the lock was acquired
    pub fn acquired_on_attempt(&self) -> u32 {
        self.attempt
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        drop(self.file.take());

        #[cfg(not(windows))]
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(not(windows))]
fn open_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(windows)]
fn open_exclusive(path: &Path) -> std::io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .share_mode(0)
        .custom_flags(FILE_FLAG_DELETE_ON_CLOSE)
        .open(path)
}

/// Whether `path` names a lock sentinel
pub fn is_lock_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == LOCK_FILE_NAME)
}
