use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

/// Lock name serializing startup of the whole launcher family.
pub const LAUNCHER_LOCK: &str = "gantry-launcher";

/// Lock name serializing property-store transactions.
pub const PROPERTIES_LOCK: &str = "gantry-properties";

/// Backoff between try-lock attempts during a bounded wait.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("timed out waiting for lock '{name}' after {waited_ms} ms")]
    Timeout { name: String, waited_ms: u64 },

    #[error("lock '{name}' is unavailable: {source}")]
    Unavailable {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// A mutual-exclusion primitive identified by a name shared across
/// independently started processes.
///
/// Backed by an advisory lock on `<dir>/<name>.lock`. The lock file itself
/// is never deleted, so acquisition never races against file creation.
/// Mutual exclusion holds between distinct `NamedLock` instances, including
/// instances opened by other processes; re-acquiring through the *same*
/// instance is not checked and must be avoided by callers.
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    file: File,
}

impl NamedLock {
    /// Creates or opens the lock file for `name` under `dir`.
    pub fn open(dir: &Path, name: &str) -> Result<Self, LockError> {
        let unavailable = |source: io::Error| LockError::Unavailable {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(dir).map_err(unavailable)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(lock_file_path(dir, name))
            .map_err(unavailable)?;

        Ok(Self {
            name: name.to_string(),
            file,
        })
    }

    /// Blocks until the lock is held.
    pub fn acquire(&self) -> Result<NamedLockGuard<'_>, LockError> {
        self.file
            .lock_exclusive()
            .map_err(|source| LockError::Unavailable {
                name: self.name.clone(),
                source,
            })?;
        Ok(NamedLockGuard {
            lock: self,
            released: false,
        })
    }

    /// Waits at most `timeout` for the lock, polling between attempts.
    pub fn try_acquire(&self, timeout: Duration) -> Result<NamedLockGuard<'_>, LockError> {
        let started = Instant::now();
        loop {
            match self.file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(NamedLockGuard {
                        lock: self,
                        released: false,
                    });
                }
                Err(err) if is_contention(&err) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(LockError::Timeout {
                            name: self.name.clone(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(waited)));
                }
                Err(source) => {
                    return Err(LockError::Unavailable {
                        name: self.name.clone(),
                        source,
                    });
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub fn lock_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.lock"))
}

/// Contention is reported with a platform-specific error code, not always
/// `WouldBlock`.
fn is_contention(err: &io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
        || err.kind() == io::ErrorKind::WouldBlock
}

/// Holds the lock until released or dropped. Release never fails; an unlock
/// error on an already-poisoned handle is logged and swallowed.
#[derive(Debug)]
pub struct NamedLockGuard<'a> {
    lock: &'a NamedLock,
    released: bool,
}

impl NamedLockGuard<'_> {
    /// Disarms the guard: the lock stays held for as long as the underlying
    /// [`NamedLock`] is open. Dropping the `NamedLock` (or process exit)
    /// still releases it.
    pub fn hold(mut self) {
        self.released = true;
    }

    /// Idempotent explicit release.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.lock.file.unlock() {
            log::warn!("failed to release lock '{}': {err}", self.lock.name);
        }
    }
}

impl Drop for NamedLockGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
