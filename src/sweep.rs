//! Removal of leftover temp files.
//!
//! A host that dies mid-session (crash, kill -9) never runs its cleanup. Sweeping the
//! dedicated temp subdirectory on a later start removes such files once they are old
//! enough and no application holds them anymore.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::lock::probe_lock;
use crate::util::fs::remove_file_with_retries;

/// Outcome of a sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    /// Old enough but still locked by another process.
    pub skipped_locked: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Delete files directly inside `temp_dir` whose modification time is older than
/// `older_than`. Locked files are left alone. A missing directory is an empty sweep.
pub fn sweep_stale_files(temp_dir: &Path, older_than: Duration) -> io::Result<SweepReport> {
    let mut report = SweepReport::default();
    if !temp_dir.is_dir() {
        return Ok(report);
    }
    let now = SystemTime::now();
    for entry in WalkDir::new(temp_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| io::Error::other("directory walk failed"))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let age = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| now.duration_since(t).ok())
            .unwrap_or_default();
        if age < older_than {
            continue;
        }
        if probe_lock(&path).is_locked() {
            report.skipped_locked.push(path);
            continue;
        }
        match remove_file_with_retries(&path) {
            Ok(()) => report.removed.push(path),
            Err(e) => report.failed.push((path, e.to_string())),
        }
    }
    Ok(report)
}
