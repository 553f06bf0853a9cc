//! Advisory locking for the simulated record.
//!
//! Each mutation of the record is a read-modify-write. Holding an exclusive
//! flock on a sidecar `<record>.lock` file serializes concurrent xdpguard
//! invocations against the same record. Other writers are not covered.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::BlocklistError;

/// Holds an exclusive lock until dropped.
pub struct RecordLock {
    _file: File,
}

impl RecordLock {
    /// Block until the lock for `record_path` is acquired.
    ///
    /// Opens with create+read+write and no truncation to avoid a race
    /// between file creation and lock acquisition.
    pub fn acquire(record_path: &Path) -> Result<Self, BlocklistError> {
        let lock_path = lock_path_for(record_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| BlocklistError::storage(&lock_path, e))?;

        file.lock_exclusive()
            .map_err(|e| BlocklistError::storage(&lock_path, e))?;

        Ok(Self { _file: file })
    }
}

// Lock is released when the file is closed (on drop)

/// Sidecar lock path: `/tmp/blocked.txt` -> `/tmp/blocked.txt.lock`.
pub fn lock_path_for(record_path: &Path) -> PathBuf {
    let mut name = record_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
