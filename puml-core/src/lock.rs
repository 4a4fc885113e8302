//! Single-instance guard backed by an advisory file lock.
//!
//! The advisory lock, not the lock file's contents, is the mutual-exclusion
//! primitive: a file left behind by a crashed process fails the "is anyone
//! actually holding this?" check and is reclaimed. The PID written into the
//! file is informational only.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::error::{Result, ViewerError};

/// Holds the exclusive advisory lock for this machine-local instance.
///
/// Released explicitly via [`InstanceLock::release`] or implicitly on drop;
/// release is idempotent.
pub struct InstanceLock {
    path: PathBuf,
    file: Option<File>,
}

impl InstanceLock {
    /// Check whether another live process holds the instance lock.
    ///
    /// A missing lock file means no instance is running. An existing file
    /// whose lock can still be taken is stale (its owner crashed without
    /// releasing) and is removed. Any other I/O error is reported but
    /// treated as "not running" — a transient filesystem error must not
    /// block an honest launch.
    pub fn is_running(path: &Path) -> bool {
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no lock file at {}; not running", path.display());
                return false;
            }
            Err(e) => {
                warn!(
                    "cannot open lock file {}: {}; assuming not running",
                    path.display(),
                    e
                );
                return false;
            }
        };

        if file.try_lock_exclusive().is_err() {
            debug!("lock at {} is held by a live process", path.display());
            return true;
        }

        // We got the lock, so the previous owner exited without cleaning up.
        info!(
            "reclaiming stale lock file at {} (previous owner did not exit cleanly)",
            path.display()
        );
        let _ = FileExt::unlock(&file);
        drop(file);
        if let Err(e) = std::fs::remove_file(path) {
            warn!("could not remove stale lock file: {}", e);
        }
        false
    }

    /// Create the lock file, take the exclusive non-blocking lock and write
    /// our PID into it.
    pub fn acquire(path: &Path) -> Result<InstanceLock> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        file.try_lock_exclusive().map_err(|_| ViewerError::LockHeld {
            path: path.to_path_buf(),
        })?;

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;

        info!("acquired instance lock at {}", path.display());
        Ok(InstanceLock {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    /// Unlock, close and delete the lock file. Calling twice is a no-op.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
            drop(file);
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("could not remove lock file {}: {}", self.path.display(), e);
            } else {
                info!("released instance lock at {}", self.path.display());
            }
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}
