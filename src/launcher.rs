//! Start the OS default handler for a file.
//!
//! A launch yields an optional process handle. `None` (or a handle that has already
//! exited by the first poll) is expected: many associations hand the file to an
//! already-running instance and the launcher process returns immediately.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

#[cfg(feature = "telemetry")]
use tracing::instrument;
use wait_timeout::ChildExt;

use crate::errors::EditError;

/// How long to watch a fresh opener for an immediate failure exit.
const LAUNCH_GRACE: Duration = Duration::from_millis(250);

/// Live reference to a launched process.
pub trait ProcessHandle: Send {
    fn id(&self) -> Option<u32>;
    /// True while the process has not exited.
    fn is_running(&mut self) -> io::Result<bool>;
    /// Block up to `timeout`; `Ok(true)` once the process has exited.
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool>;
}

pub type ProcessRef = Box<dyn ProcessHandle>;

pub trait ProcessLauncher: Send + Sync {
    /// Start the default handler. `Err(LaunchFailed)` only when nothing could be started.
    fn launch(&self, path: &Path) -> Result<Option<ProcessRef>, EditError>;
}

/// Handle over a spawned child.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        // Reap an opener that already exited so it does not linger as a zombie
        let _ = self.child.try_wait();
    }
}

impl ProcessHandle for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_running(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool> {
        Ok(self.child.wait_timeout(timeout)?.is_some())
    }
}

/// Launches files through the platform opener (`open`, `xdg-open`/`gio open`,
/// `cmd /C start`) or a configured override command.
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher {
    opener: Option<String>,
}

impl SystemLauncher {
    pub fn new(opener: Option<String>) -> Self {
        Self { opener }
    }

    /// Program and leading arguments; the file path is appended last.
    pub fn opener_argv(&self) -> Result<Vec<String>, EditError> {
        if let Some(o) = &self.opener {
            let argv: Vec<String> = o.split_whitespace().map(str::to_string).collect();
            if argv.is_empty() {
                return Err(EditError::LaunchFailed("opener command is empty".to_string()));
            }
            return Ok(argv);
        }
        default_opener_argv()
    }
}

#[cfg(target_os = "macos")]
fn default_opener_argv() -> Result<Vec<String>, EditError> {
    Ok(vec!["open".to_string()])
}

#[cfg(windows)]
fn default_opener_argv() -> Result<Vec<String>, EditError> {
    Ok(vec![
        "cmd".to_string(),
        "/C".to_string(),
        "start".to_string(),
        String::new(),
    ])
}

#[cfg(all(unix, not(target_os = "macos")))]
fn default_opener_argv() -> Result<Vec<String>, EditError> {
    if let Ok(p) = which::which("xdg-open") {
        return Ok(vec![p.display().to_string()]);
    }
    if let Ok(p) = which::which("gio") {
        return Ok(vec![p.display().to_string(), "open".to_string()]);
    }
    Err(EditError::LaunchFailed(
        "no opener found on PATH (tried xdg-open, gio)".to_string(),
    ))
}

impl ProcessLauncher for SystemLauncher {
    #[cfg_attr(feature = "telemetry", instrument(level = "info", skip(self), err))]
    fn launch(&self, path: &Path) -> Result<Option<ProcessRef>, EditError> {
        let argv = self.opener_argv()?;
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            // Keep terminal signals aimed at the host away from the editor
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| EditError::LaunchFailed(format!("{}: {}", argv[0], e)))?;

        match child.wait_timeout(LAUNCH_GRACE) {
            Ok(Some(status)) if !status.success() => Err(EditError::LaunchFailed(format!(
                "{} exited with {}",
                argv[0], status
            ))),
            // Opener handed off and exited cleanly: no process to follow
            Ok(Some(_)) => Ok(None),
            Ok(None) => Ok(Some(Box::new(ChildProcess::new(child)))),
            Err(e) => Err(EditError::LaunchFailed(e.to_string())),
        }
    }
}
