//! Sentinel lock serializing concurrent fetches of the same artifact
//!
//! The lock is a file in the cache directory whose name is derived from the
//! target path, created with `create_new` so exactly one caller wins. Waiters
//! poll until it disappears. A lock file whose modification time is older than
//! the timeout is treated as stale (its owner died) and removed; a lock that
//! changed hands while we waited is judged by its own age, not our wait.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::retry::sleep_unless_cancelled;
use crate::cancel::CancelFlag;
use crate::error::StoreError;
use crate::logging::{operations, status};

/// Lock file path for a fetch target: `.{hash}.lock` next to it
pub fn lock_path(target: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(target.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!(".{}.lock", &digest[..16]))
}

/// Held lock; the sentinel is removed on drop
#[derive(Debug)]
pub struct FetchLock {
    path: PathBuf,
    /// Whether we had to wait for another holder first
    waited: bool,
}

impl FetchLock {
    /// Block until the lock for `target` is ours
    pub fn acquire(
        target: &Path,
        timeout: Duration,
        poll: Duration,
        cancel: &CancelFlag,
    ) -> Result<Self, StoreError> {
        let path = lock_path(target);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }

        let mut waited = false;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path, waited }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }

            if !waited {
                debug!(
                    operation = operations::FETCH,
                    status = status::WAIT,
                    target = %target.display(),
                    "fetch already in progress, waiting"
                );
                waited = true;
            }

            let age = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => SystemTime::now().duration_since(modified).unwrap_or_default(),
                // released between our open and the stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            if age >= timeout {
                warn!(
                    operation = operations::FETCH,
                    target = %target.display(),
                    "lock {} older than {:?}, removing stale lock",
                    path.display(),
                    timeout
                );
                let _ = fs::remove_file(&path);
                continue;
            }

            if !sleep_unless_cancelled(poll, cancel) {
                return Err(StoreError::Cancelled(target.display().to_string()));
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for FetchLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
