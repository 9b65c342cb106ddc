#![allow(clippy::module_name_repetitions)]
//! Terminal color and the stderr channel.
//!
//! Session notices, prompts and diagnostics all go to stderr; stdout carries only
//! command results (`--json` output and the `config` report), so it stays pipeable.
//! Color on stderr is decided in this order: `NO_COLOR` set disables it, then
//! `--color`, then `EXTEDIT_COLOR`, then whether stderr is a terminal.
//!
//! Tones: info for session progress, warn when cleanup or a handler degrades but the
//! session continues, error when content could not be saved. A cancelled open is info.

use clap::ValueEnum;
use once_cell::sync::OnceCell;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

static COLOR_MODE: OnceCell<ColorMode> = OnceCell::new();

pub fn set_color_mode(mode: ColorMode) {
    let _ = COLOR_MODE.set(mode);
}

fn parse_color_mode(s: &str) -> Option<ColorMode> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ColorMode::Auto),
        "always" | "on" | "true" | "yes" => Some(ColorMode::Always),
        "never" | "off" | "false" | "no" => Some(ColorMode::Never),
        _ => None,
    }
}

fn env_color_mode_pref() -> Option<ColorMode> {
    std::env::var("EXTEDIT_COLOR")
        .ok()
        .and_then(|v| parse_color_mode(&v))
}

fn no_color_env() -> bool {
    // Per https://no-color.org/
    std::env::var("NO_COLOR").is_ok()
}

fn resolve_color(
    no_color: bool,
    flag: Option<ColorMode>,
    env: Option<ColorMode>,
    is_tty: bool,
) -> bool {
    if no_color {
        return false;
    }
    match flag.or(env) {
        Some(ColorMode::Always) => true,
        Some(ColorMode::Never) => false,
        Some(ColorMode::Auto) | None => is_tty,
    }
}

fn color_enabled_for(is_tty: bool) -> bool {
    resolve_color(
        no_color_env(),
        COLOR_MODE.get().copied(),
        env_color_mode_pref(),
        is_tty,
    )
}

pub fn color_enabled_stderr() -> bool {
    color_enabled_for(atty::is(atty::Stream::Stderr))
}

/// Wrap string with ANSI color code when enabled; otherwise return unchanged.
pub fn paint(enabled: bool, code: &str, s: &str) -> String {
    if enabled {
        format!("{code}{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Tone {
    Info,
    Warn,
    Error,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Info => "\x1b[36;1m",
            Tone::Warn => "\x1b[33m",
            Tone::Error => "\x1b[31;1m",
        }
    }
}

fn log_stderr(tone: Tone, use_color: bool, msg: &str) {
    eprintln!("{}", paint(use_color, tone.code(), msg));
}

pub fn log_info_stderr(use_color: bool, msg: &str) {
    log_stderr(Tone::Info, use_color, msg);
}

pub fn log_warn_stderr(use_color: bool, msg: &str) {
    log_stderr(Tone::Warn, use_color, msg);
}

pub fn log_error_stderr(use_color: bool, msg: &str) {
    log_stderr(Tone::Error, use_color, msg);
}
