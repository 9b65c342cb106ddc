//! Error mapping guide:
//! - `Cancelled` is a normal outcome (user aborted a prompt); never log it as an error.
//! - Map `Cancelled` to exit code 130, io::ErrorKind::NotFound to 127, all others to 1.
//! - Keep user-visible strings in `display_for_edit_error`; callers should not format variants ad hoc.
use std::fmt;
use std::io;

/// Failure taxonomy for the external edit round-trip.
#[derive(Debug)]
pub enum EditError {
    /// The user aborted a naming or confirmation prompt.
    Cancelled,
    /// Reading or writing the temp file (or the field) failed.
    Io(io::Error),
    /// No handler could be started for the temp file.
    LaunchFailed(String),
    /// The source file is larger than the configured maximum.
    ContentTooLarge { length: u64, maximum: u64 },
    /// A session is already active for this field.
    AlreadyOpen,
    /// The field refuses writes.
    ReadOnly,
    /// A text field received bytes that are not valid UTF-8.
    InvalidText,
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_for_edit_error(self))
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EditError {
    fn from(e: io::Error) -> Self {
        EditError::Io(e)
    }
}

impl EditError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EditError::Cancelled)
    }
}

/// Map an io::Error to a process exit code:
/// - 127 for NotFound
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Convert EditError to exit code (parity with io::Error mapping).
pub fn exit_code_for_edit_error(e: &EditError) -> u8 {
    match e {
        EditError::Cancelled => 130,
        EditError::Io(ioe) => exit_code_for_io_error(ioe),
        _ => 1,
    }
}

/// Render a user-facing string for EditError.
pub fn display_for_edit_error(e: &EditError) -> String {
    match e {
        EditError::Cancelled => "operation cancelled".to_string(),
        EditError::Io(ioe) => ioe.to_string(),
        EditError::LaunchFailed(reason) => format!("cannot start an application for the file: {reason}"),
        EditError::ContentTooLarge { length, maximum } => format!(
            "file is too large ({length} bytes); the maximum allowed size is {maximum} bytes"
        ),
        EditError::AlreadyOpen => "the file is already open for editing".to_string(),
        EditError::ReadOnly => "the value is read-only".to_string(),
        EditError::InvalidText => "the file does not contain valid UTF-8 text".to_string(),
    }
}
