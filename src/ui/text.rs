//! User-facing text lookup.
//!
//! Messages are addressed by key; `{0}`, `{1}`, ... are replaced with the positional args.
//! Hosts supply their own `Localizer` for translated catalogs; unknown keys render as the key.

pub mod keys {
    pub const OVERWRITE_CHANGED: &str = "overwrite-changed";
    pub const FILE_NOT_WRITABLE: &str = "file-not-writable";
    pub const WRITE_FAILED: &str = "write-failed";
    pub const LAUNCH_FAILED_DELETE: &str = "launch-failed-delete";
    pub const EDITING_STARTED: &str = "editing-started";
    pub const WAITING_FOR_APPLICATION: &str = "waiting-for-application";
    pub const CONFIRM_WHEN_DONE: &str = "confirm-when-done";
    pub const SAVED: &str = "saved";
    pub const FINISHED: &str = "finished";
    pub const RECONCILE_FAILED: &str = "reconcile-failed";
    pub const RECOVER_SAVE_COPY: &str = "recover-save-copy";
    pub const RECOVER_COPY_FAILED: &str = "recover-copy-failed";
    pub const MONITOR_FAILED: &str = "monitor-failed";
}

pub trait Localizer: Send + Sync {
    fn get(&self, key: &str, args: &[&str]) -> String;
}

/// Built-in English catalog.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultText;

fn template(key: &str) -> Option<&'static str> {
    use keys::*;
    Some(match key {
        OVERWRITE_CHANGED => "The file {0} already exists and differs from the current value. Overwrite it?",
        FILE_NOT_WRITABLE => "The file {0} already exists and cannot be overwritten.",
        WRITE_FAILED => "Cannot write the file {0}: {1}",
        LAUNCH_FAILED_DELETE => "No application could be started for {0} ({1}). Delete the file?",
        EDITING_STARTED => "Opening {0}; the value is saved back when the application closes the file.",
        WAITING_FOR_APPLICATION => "Waiting for the application to release {0}...",
        CONFIRM_WHEN_DONE => "Cannot tell when editing of {0} is finished. Accept when done, or cancel to discard changes.",
        SAVED => "Changes from {0} were saved.",
        FINISHED => "Finished with {0}.",
        RECONCILE_FAILED => "Cannot save changes from {0}: {1}",
        RECOVER_SAVE_COPY => "The file {0} is still open. Save a copy of it before it is deleted?",
        RECOVER_COPY_FAILED => "Cannot save a copy to {0}: {1}",
        MONITOR_FAILED => "Lost track of the application editing {0}; accept when done or cancel.",
        _ => return None,
    })
}

/// Replace `{N}` placeholders with positional args; missing args leave the placeholder.
pub fn format_positional(tpl: &str, args: &[&str]) -> String {
    let mut out = tpl.to_string();
    for (i, a) in args.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), a);
    }
    out
}

impl Localizer for DefaultText {
    fn get(&self, key: &str, args: &[&str]) -> String {
        match template(key) {
            Some(t) => format_positional(t, args),
            None => key.to_string(),
        }
    }
}
