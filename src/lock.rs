//! Lock probing for the shared temp file.
//!
//! The temp file is shared with the external application, so its state is re-probed on
//! every poll and never cached. A probe opens the file for reading and attempts a
//! non-blocking exclusive lock; on Windows the open itself requests exclusive sharing.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(feature = "telemetry")]
use tracing::instrument;

/// Result of probing the temp file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Another handle holds the file.
    Locked,
    /// The probe obtained exclusive access.
    Free,
    /// The file no longer exists.
    Missing,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        self == LockState::Locked
    }
}

fn open_exclusive_probe(p: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true);
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        opts.share_mode(0);
    }
    opts.open(p)
}

#[cfg_attr(feature = "telemetry", instrument(level = "trace", ret))]
/// Probe whether another process (or handle) holds the file.
///
/// Sharing/permission failures count as locked: the conservative answer keeps polling
/// rather than reconciling a file that is still being written.
pub fn probe_lock(p: &Path) -> LockState {
    let f = match open_exclusive_probe(p) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return LockState::Missing,
        Err(_) => return LockState::Locked,
    };
    match f.try_lock_exclusive() {
        Ok(()) => {
            // Best-effort unlock; dropping the handle releases it regardless
            let _ = f.unlock();
            LockState::Free
        }
        Err(_) => LockState::Locked,
    }
}

/// Exclusive lock held on a file until dropped.
///
/// Used by hosts (and tests) that edit the temp file themselves and want the manager
/// to observe it as in use.
#[derive(Debug)]
pub struct HeldLock {
    file: File,
    path: PathBuf,
}

impl HeldLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        // Best-effort unlock; ignore errors
        let _ = self.file.unlock();
    }
}

/// Acquire a non-blocking exclusive lock at a specific path (the file must exist).
pub fn hold_lock(p: &Path) -> io::Result<HeldLock> {
    let f = OpenOptions::new().read(true).write(true).open(p)?;
    match f.try_lock_exclusive() {
        Ok(()) => Ok(HeldLock {
            file: f,
            path: p.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(io::Error::other(format!(
            "{} is locked by another process",
            p.display()
        ))),
        Err(e) => Err(e),
    }
}
