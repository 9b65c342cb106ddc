use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

const REMOVE_ATTEMPTS: usize = 10;
const REMOVE_BACKOFF: Duration = Duration::from_millis(100);

/// Ensure a directory exists, creating parents as needed.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Clear the read-only attribute so the file can be overwritten or deleted.
/// A missing file is not an error.
pub fn clear_readonly(p: &Path) -> io::Result<()> {
    let meta = match fs::metadata(p) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
    }
    fs::set_permissions(p, perms)
}

/// Mark a file read-only (all write bits cleared on Unix).
pub fn set_readonly(p: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(p)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(p, perms)
}

/// True iff the read-only attribute is clear and (Unix) the caller may write the file.
pub fn is_writable(p: &Path) -> bool {
    let Ok(meta) = fs::metadata(p) else {
        return false;
    };
    if meta.permissions().readonly() {
        return false;
    }
    #[cfg(unix)]
    {
        use nix::unistd::{access, AccessFlags};
        access(p, AccessFlags::W_OK).is_ok()
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Remove a file, clearing its read-only attribute first, with brief retries while
/// another process still holds it. Returns Ok when the file is gone.
pub fn remove_file_with_retries(p: &Path) -> io::Result<()> {
    let _ = clear_readonly(p);
    let mut last_err: Option<io::Error> = None;
    for attempt in 0..REMOVE_ATTEMPTS {
        match fs::remove_file(p) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => last_err = Some(e),
        }
        if attempt + 1 < REMOVE_ATTEMPTS {
            std::thread::sleep(REMOVE_BACKOFF);
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("remove failed")))
}
