use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

/// Advisory lock that serializes launcher daemons per runtime dir. Held for
/// the lifetime of the process; the lock file itself is never deleted.
pub struct InstanceLock {
    _file: File,
}

pub fn acquire(path: &Path) -> std::io::Result<InstanceLock> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;

    file.try_lock_exclusive()?;
    Ok(InstanceLock { _file: file })
}
