//! Effective configuration for edit sessions.
//!
//! Precedence: built-in defaults < YAML file < environment.
//! - YAML file: `EXTEDIT_CONFIG` when set and non-empty, else `~/.config/extedit/config.yml`.
//!   A missing file is fine; a file that exists but cannot be read or parsed is an error.
//! - Environment: EXTEDIT_MAX_CONTENT_LENGTH, EXTEDIT_POLL_INTERVAL_MS,
//!   EXTEDIT_WAIT_FOR_PROCESS_MS, EXTEDIT_AUTO_RENAME, EXTEDIT_TEMP_DIR, EXTEDIT_OPENER.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAXIMUM_CONTENT_LENGTH: u64 = 30_000_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_WAIT_FOR_PROCESS_INTERVAL: Duration = Duration::from_millis(4000);
const TEMP_SUBDIR: &str = "extedit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditConfig {
    pub maximum_content_length: u64,
    pub poll_interval: Duration,
    pub wait_for_process_interval: Duration,
    pub auto_rename_on_open: bool,
    /// Dedicated temp subdirectory; created on demand.
    pub temp_dir: PathBuf,
    /// Opener command overriding the platform default (e.g. "xdg-open").
    pub opener: Option<String>,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            maximum_content_length: DEFAULT_MAXIMUM_CONTENT_LENGTH,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_for_process_interval: DEFAULT_WAIT_FOR_PROCESS_INTERVAL,
            auto_rename_on_open: true,
            temp_dir: std::env::temp_dir().join(TEMP_SUBDIR),
            opener: None,
        }
    }
}

/// On-disk shape; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    maximum_content_length: Option<u64>,
    poll_interval: Option<String>,
    wait_for_process_interval: Option<String>,
    auto_rename_on_open: Option<bool>,
    temp_dir: Option<PathBuf>,
    opener: Option<String>,
}

/// Serializable view used by `extedit config --json`.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub maximum_content_length: u64,
    pub poll_interval_ms: u64,
    pub wait_for_process_interval_ms: u64,
    pub auto_rename_on_open: bool,
    pub temp_dir: String,
    pub opener: Option<String>,
}

impl EditConfig {
    /// Load defaults, then the YAML file (if present), then environment overrides.
    pub fn load() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(path) = config_file_path() {
            if path.is_file() {
                cfg.apply_file(&path)?;
            }
        }
        cfg.apply_env()?;
        Ok(cfg.normalized())
    }

    /// Apply a YAML config file on top of the current values.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        if content.trim().is_empty() {
            return Ok(());
        }
        let file: ConfigFile = serde_yaml::from_str(&content)
            .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;

        if let Some(v) = file.maximum_content_length {
            self.maximum_content_length = v;
        }
        if let Some(s) = file.poll_interval {
            self.poll_interval = parse_duration_value(&s)
                .map_err(|e| format!("{}: poll-interval: {}", path.display(), e))?;
        }
        if let Some(s) = file.wait_for_process_interval {
            self.wait_for_process_interval = parse_duration_value(&s)
                .map_err(|e| format!("{}: wait-for-process-interval: {}", path.display(), e))?;
        }
        if let Some(v) = file.auto_rename_on_open {
            self.auto_rename_on_open = v;
        }
        if let Some(p) = file.temp_dir {
            self.temp_dir = p;
        }
        if let Some(o) = file.opener {
            let o = o.trim().to_string();
            self.opener = if o.is_empty() { None } else { Some(o) };
        }
        Ok(())
    }

    /// Apply EXTEDIT_* environment overrides.
    pub fn apply_env(&mut self) -> Result<(), String> {
        if let Some(v) = env_nonempty("EXTEDIT_MAX_CONTENT_LENGTH") {
            self.maximum_content_length = v
                .parse::<u64>()
                .map_err(|_| format!("EXTEDIT_MAX_CONTENT_LENGTH: not a byte count: {v}"))?;
        }
        if let Some(v) = env_nonempty("EXTEDIT_POLL_INTERVAL_MS") {
            self.poll_interval = parse_millis("EXTEDIT_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env_nonempty("EXTEDIT_WAIT_FOR_PROCESS_MS") {
            self.wait_for_process_interval = parse_millis("EXTEDIT_WAIT_FOR_PROCESS_MS", &v)?;
        }
        if let Some(v) = env_nonempty("EXTEDIT_AUTO_RENAME") {
            self.auto_rename_on_open = parse_bool(&v)
                .ok_or_else(|| format!("EXTEDIT_AUTO_RENAME: expected 1/0 or true/false: {v}"))?;
        }
        if let Some(v) = env_nonempty("EXTEDIT_TEMP_DIR") {
            self.temp_dir = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("EXTEDIT_OPENER") {
            self.opener = Some(v);
        }
        Ok(())
    }

    /// Clamp values that would make the poller spin.
    pub fn normalized(mut self) -> Self {
        if self.poll_interval.is_zero() {
            self.poll_interval = Duration::from_millis(1);
        }
        self
    }

    pub fn report(&self) -> ConfigReport {
        ConfigReport {
            maximum_content_length: self.maximum_content_length,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            wait_for_process_interval_ms: self.wait_for_process_interval.as_millis() as u64,
            auto_rename_on_open: self.auto_rename_on_open,
            temp_dir: self.temp_dir.display().to_string(),
            opener: self.opener.clone(),
        }
    }
}

/// Resolve the YAML config path from env override or the per-user default.
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(p) = env_nonempty("EXTEDIT_CONFIG") {
        return Some(PathBuf::from(p));
    }
    home::home_dir().map(|h| h.join(".config").join("extedit").join("config.yml"))
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_millis(key: &str, v: &str) -> Result<Duration, String> {
    v.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("{key}: not a number of milliseconds: {v}"))
}

/// Accept humantime strings ("500ms", "4s") and bare integers as milliseconds.
fn parse_duration_value(s: &str) -> Result<Duration, String> {
    let t = s.trim();
    if let Ok(ms) = t.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(t).map_err(|e| e.to_string())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
