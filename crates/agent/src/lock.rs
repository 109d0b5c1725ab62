//! Cross-process advisory lock on the cache directory.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Exclusive lock held until dropped.
#[derive(Debug)]
pub struct CacheLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block until the lock at `path` is held.
    #[cfg(unix)]
    pub fn acquire(path: &Path) -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        loop {
            // SAFETY: the descriptor is owned by `file` and stays open for the call.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Block until the lock at `path` is held.
    ///
    /// Without `flock`, the lock is the existence of the file itself.
    #[cfg(not(unix))]
    pub fn acquire(path: &Path) -> io::Result<Self> {
        use std::time::{Duration, Instant};

        const STALE_AFTER: Duration = Duration::from_secs(120);
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(file) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() > STALE_AFTER {
                        tracing::warn!(target: "platwrap::agent", path = %path.display(), "Removing stale lock file");
                        let _ = std::fs::remove_file(path);
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: `self.file` still owns the descriptor; it is closed only
            // after this call, when the field is dropped.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
