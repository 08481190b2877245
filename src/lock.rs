//! Advisory file locks for dataset writes
//!
//! Mutual exclusion between uncoordinated writer processes is per
//! `(TUID, dataset-filename)` pair: one lock file named
//! `"{tuid}-{filename}.lock"` in a dedicated lock directory. Acquisition
//! uses `flock` in non-blocking mode on Unix, polled until a bounded
//! deadline; elsewhere the lock file itself is the token, created with
//! `create_new` and removed on release.
//!
//! Reads are deliberately unlocked: the store accepts read-during-write
//! races with last-writer-wins visibility.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::tuid::Tuid;

/// Default bound on lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Lock directory created under the data directory unless overridden.
pub(crate) const LOCK_DIR_NAME: &str = ".dataset_locks";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lock file name for a `(TUID, filename)` pair.
///
/// External writers that coordinate with the store take the same lock
/// under the same name.
#[must_use]
pub fn lock_file_name(tuid: &Tuid, filename: &str) -> String {
    format!("{tuid}-{filename}.lock")
}

/// A held advisory lock.
///
/// Released unconditionally when dropped, so a failing write under the
/// lock still releases it before the error propagates.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: File,
}

impl FileLock {
    /// Acquire the named lock inside `lock_dir`, waiting at most
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// [`Error::LockTimeout`] when the lock stays held past the deadline;
    /// [`Error::Io`] when the lock directory or file cannot be created.
    pub fn acquire(lock_dir: &Path, name: &str, timeout: Duration) -> Result<Self> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(name);
        let deadline = Instant::now() + timeout;
        Self::acquire_at(path, deadline, timeout)
    }

    #[cfg(unix)]
    fn acquire_at(path: PathBuf, deadline: Instant, timeout: Duration) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        let fd = file.as_raw_fd();

        loop {
            // LOCK_NB so a held lock polls instead of blocking past the
            // deadline.
            let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
            if rc == 0 {
                return Ok(Self { path, file });
            }
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EWOULDBLOCK) | Some(libc::EINTR) => {}
                _ => return Err(Error::Io(err)),
            }
            if Instant::now() >= deadline {
                return Err(Error::LockTimeout {
                    lockfile: path,
                    waited: timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    #[cfg(not(unix))]
    fn acquire_at(path: PathBuf, deadline: Instant, timeout: Duration) -> Result<Self> {
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok(Self { path, file }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout {
                            lockfile: path,
                            waited: timeout,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Path of the underlying lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // Close would release too; unlock explicitly so the release
            // point is the guard drop, not fd teardown order.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = fs::remove_file(&self.path);
        }
    }
}
