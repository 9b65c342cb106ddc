//! Temp file naming.
//!
//! Resolution rules:
//! - No extension hint: no path is synthesized; the caller must prompt for one.
//! - No base name: `<temp_dir>/content<N>.<ext>`, N probed sequentially from 1.
//! - Base name that collides, auto-rename on: `<base>(2).<ext>`, `(3)`, ... without
//!   looking at content.
//! - Base name that collides, auto-rename off: ask the human (read-only target:
//!   Abort/Retry/Ignore; writable target with different content: Yes/No/Cancel).

use std::path::{Path, PathBuf};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::dialog::{Answer, ConfirmKind, DialogGateway};
use crate::errors::EditError;
use crate::transfer::ContentTransfer;
use crate::ui::{keys, Localizer};
use crate::util::fs::{ensure_dir, is_writable};

pub const GENERATED_STEM: &str = "content";

pub struct NamingResolver<'a> {
    temp_dir: &'a Path,
    dialogs: &'a dyn DialogGateway,
    text: &'a dyn Localizer,
    transfer: &'a ContentTransfer,
}

impl<'a> NamingResolver<'a> {
    pub fn new(
        temp_dir: &'a Path,
        dialogs: &'a dyn DialogGateway,
        text: &'a dyn Localizer,
        transfer: &'a ContentTransfer,
    ) -> Self {
        Self {
            temp_dir,
            dialogs,
            text,
            transfer,
        }
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(level = "debug", skip(self), fields(temp_dir = %self.temp_dir.display()))
    )]
    /// Resolve a temp path. `Ok(None)` means no extension was available and the caller
    /// must obtain an explicit path; `Err(Cancelled)` means the human aborted.
    pub fn resolve(
        &self,
        base_name: Option<&str>,
        extension: Option<&str>,
        auto_rename: bool,
    ) -> Result<Option<PathBuf>, EditError> {
        let Some(ext) = extension.map(normalize_extension).filter(|e| !e.is_empty()) else {
            return Ok(None);
        };
        ensure_dir(self.temp_dir)?;

        let stem = base_name.map(sanitize_stem).filter(|s| !s.is_empty());
        let Some(stem) = stem else {
            return Ok(Some(first_free_generated(self.temp_dir, &ext)));
        };

        let candidate = self.temp_dir.join(file_name(&stem, &ext));
        if !candidate.exists() {
            return Ok(Some(candidate));
        }
        if auto_rename {
            return Ok(Some(first_free_counter(self.temp_dir, &stem, &ext)));
        }
        self.confirm_existing(candidate, &stem, &ext).map(Some)
    }

    fn confirm_existing(&self, candidate: PathBuf, stem: &str, ext: &str) -> Result<PathBuf, EditError> {
        let shown = candidate.display().to_string();
        loop {
            if !candidate.exists() {
                return Ok(candidate);
            }
            if !is_writable(&candidate) {
                let msg = self.text.get(keys::FILE_NOT_WRITABLE, &[&shown]);
                match self.dialogs.confirm(ConfirmKind::AbortRetryIgnore, &msg) {
                    Answer::Retry => continue,
                    Answer::Ignore => return self.prompt_alternate(stem, ext),
                    _ => return Err(EditError::Cancelled),
                }
            }
            if self.transfer.content_equals(&candidate) {
                return Ok(candidate);
            }
            let msg = self.text.get(keys::OVERWRITE_CHANGED, &[&shown]);
            return match self.dialogs.confirm(ConfirmKind::YesNoCancel, &msg) {
                Answer::Yes => Ok(candidate),
                Answer::No => self.prompt_alternate(stem, ext),
                _ => Err(EditError::Cancelled),
            };
        }
    }

    fn prompt_alternate(&self, stem: &str, ext: &str) -> Result<PathBuf, EditError> {
        self.dialogs
            .prompt_save_path(Some(ext), Some(stem))
            .ok_or(EditError::Cancelled)
    }
}

fn file_name(stem: &str, ext: &str) -> String {
    format!("{stem}.{ext}")
}

/// `content1.ext`, `content2.ext`, ... first name that does not exist.
pub fn first_free_generated(dir: &Path, ext: &str) -> PathBuf {
    let mut n: u64 = 1;
    loop {
        let p = dir.join(file_name(&format!("{GENERATED_STEM}{n}"), ext));
        if !p.exists() {
            return p;
        }
        n += 1;
    }
}

/// `stem(2).ext`, `stem(3).ext`, ... first name that does not exist.
pub fn first_free_counter(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut n: u64 = 2;
    loop {
        let p = dir.join(file_name(&format!("{stem}({n})"), ext));
        if !p.exists() {
            return p;
        }
        n += 1;
    }
}

/// Strip a leading dot and surrounding whitespace from an extension hint.
pub fn normalize_extension(ext: &str) -> String {
    sanitize_stem(ext.trim().trim_start_matches('.'))
}

/// Replace path separators and characters invalid on common filesystems with `_`.
pub fn sanitize_stem(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    // Leading/trailing dots would create hidden files or "name..ext"
    cleaned.trim_matches('.').trim().to_string()
}
