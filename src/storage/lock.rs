//! Advisory record locks
//!
//! Held around the read-merge-write of a record when cross-process merging
//! is enabled. The lock lives beside the record as `.dejavu.lock` and is
//! released on drop.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::ensure_dir;

/// Lock result type
pub type LockResult<T> = Result<T, LockError>;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock timeout after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive advisory lock on a record directory.
pub struct RecordLock {
    lock_path: PathBuf,
    lock_file: File,
}

impl RecordLock {
    const LOCK_FILENAME: &'static str = ".dejavu.lock";

    /// Acquire the lock for `record_dir`, waiting up to `timeout`.
    ///
    /// Creates the directory and lock file if they don't exist. Waiting
    /// sleeps the calling thread.
    pub fn acquire(record_dir: &Path, timeout: Duration) -> LockResult<Self> {
        ensure_dir(record_dir)?;

        let lock_path = record_dir.join(Self::LOCK_FILENAME);
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);
        let mut warned = false;

        loop {
            match Self::try_acquire_exclusive(&lock_path) {
                Ok(mut file) => {
                    if warned {
                        debug!(
                            lock = %lock_path.display(),
                            waited_s = start.elapsed().as_secs_f64(),
                            "lock acquired after contention"
                        );
                    }
                    // Holder diagnostics only; contents are never read back
                    if let Err(e) = writeln!(
                        file,
                        "pid={} acquired_at={}",
                        std::process::id(),
                        chrono::Utc::now().to_rfc3339()
                    ) {
                        debug!(lock = %lock_path.display(), error = %e, "could not record lock holder");
                    }
                    return Ok(Self {
                        lock_path,
                        lock_file: file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > Duration::from_millis(500) {
                        warn!(lock = %lock_path.display(), "lock contention, waiting");
                        warned = true;
                    }
                }
                Err(e) => return Err(LockError::Io(e)),
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout(timeout));
            }

            std::thread::sleep(poll_interval);
        }
    }

    #[cfg(unix)]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o666)
            .open(lock_path)?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

        if result == 0 {
            file.set_len(0)?;
            Ok(file)
        } else {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            } else {
                Err(err)
            }
        }
    }

    #[cfg(not(unix))]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        match OpenOptions::new().write(true).create_new(true).open(lock_path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.lock_file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquire_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let record_dir = temp_dir.path().join("nested").join("record");

        let lock = RecordLock::acquire(&record_dir, Duration::from_secs(1)).unwrap();

        assert!(record_dir.is_dir());
        assert!(lock.path().exists());
        assert_eq!(lock.path().file_name().unwrap(), ".dejavu.lock");
    }

    #[test]
    fn test_lock_records_holder() {
        let temp_dir = TempDir::new().unwrap();
        let lock = RecordLock::acquire(temp_dir.path(), Duration::from_secs(1)).unwrap();

        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert!(contents.starts_with(&format!("pid={} acquired_at=", std::process::id())));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let record_dir = temp_dir.path().join("record");

        {
            let _lock = RecordLock::acquire(&record_dir, Duration::from_secs(1)).unwrap();
        }

        let _again = RecordLock::acquire(&record_dir, Duration::from_secs(1)).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_lock_contention_times_out() {
        use std::sync::mpsc;
        use std::thread;

        let temp_dir = TempDir::new().unwrap();
        let record_dir = temp_dir.path().join("record");
        let record_dir2 = record_dir.clone();

        let held = RecordLock::acquire(&record_dir, Duration::from_secs(1)).unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let result = RecordLock::acquire(&record_dir2, Duration::from_millis(100));
            tx.send(matches!(result, Err(LockError::Timeout(_)))).unwrap();
        });

        assert!(rx.recv().unwrap(), "second acquisition should time out");
        handle.join().unwrap();
        drop(held);
    }
}
