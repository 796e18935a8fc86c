//! Run-level mutual exclusion
//!
//! The whole run executes under one exclusive advisory lock on a fixed
//! filesystem path. A second invocation blocks in `acquire` until the holder
//! releases; there is no timeout or back-off.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use log::info;
use nix::fcntl::{flock, FlockArg};

/// Holds the submission lock for the lifetime of a run.
///
/// The lock is released when the guard drops, on every exit path. The lock
/// file itself is left in place; its presence has no meaning.
pub struct RunLock {
    file: File,
}

impl RunLock {
    pub fn acquire(path: &Path) -> io::Result<RunLock> {
        let file = OpenOptions::new().write(true).create(true).open(path)?;
        info!("Waiting for submission lock at {}", path.display());
        flock(file.as_raw_fd(), FlockArg::LockExclusive)
            .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
        info!("Got submission lock");
        Ok(RunLock { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = flock(self.file.as_raw_fd(), FlockArg::Unlock);
    }
}
