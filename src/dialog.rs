//! Dialog gateway: every decision the manager needs from a human goes through here.
//!
//! The manager never renders UI; hosts implement `DialogGateway`. `TerminalDialogs` is
//! the stderr/stdin implementation used by the CLI.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    YesNo,
    YesNoCancel,
    RetryCancel,
    AbortRetryIgnore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Cancel,
    Retry,
    Abort,
    Ignore,
}

impl ConfirmKind {
    pub fn choices(self) -> &'static [Answer] {
        match self {
            ConfirmKind::YesNo => &[Answer::Yes, Answer::No],
            ConfirmKind::YesNoCancel => &[Answer::Yes, Answer::No, Answer::Cancel],
            ConfirmKind::RetryCancel => &[Answer::Retry, Answer::Cancel],
            ConfirmKind::AbortRetryIgnore => &[Answer::Abort, Answer::Retry, Answer::Ignore],
        }
    }

    /// Answer assumed when nobody can be asked.
    pub fn fallback(self) -> Answer {
        match self {
            ConfirmKind::YesNo => Answer::No,
            ConfirmKind::YesNoCancel | ConfirmKind::RetryCancel => Answer::Cancel,
            ConfirmKind::AbortRetryIgnore => Answer::Abort,
        }
    }
}

/// Non-blocking notices surfaced to the human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A writable session is about to launch the external application.
    EditingStarted,
    /// First poll found the file locked; waiting for the application to release it.
    WaitingForApplication,
    /// Completion could not be inferred; the human must accept or cancel.
    ConfirmWhenDone,
    /// Changes were written back into the field.
    Saved,
    /// Session finished and the temp file was removed.
    Finished,
    Error,
}

pub trait DialogGateway: Send + Sync {
    fn confirm(&self, kind: ConfirmKind, message: &str) -> Answer;
    fn prompt_open_path(&self) -> Option<PathBuf>;
    fn prompt_save_path(&self, default_ext: Option<&str>, default_name: Option<&str>)
        -> Option<PathBuf>;
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Parse a typed answer; accepts full words or their first letter.
pub fn parse_answer(kind: ConfirmKind, line: &str) -> Option<Answer> {
    let t = line.trim().to_ascii_lowercase();
    if t.is_empty() {
        return None;
    }
    kind.choices().iter().copied().find(|a| {
        let word = answer_word(*a);
        t == word || (t.len() == 1 && word.starts_with(t.as_str()))
    })
}

fn answer_word(a: Answer) -> &'static str {
    match a {
        Answer::Yes => "yes",
        Answer::No => "no",
        Answer::Cancel => "cancel",
        Answer::Retry => "retry",
        Answer::Abort => "abort",
        Answer::Ignore => "ignore",
    }
}

/// Terminal dialogs: prompts on stderr, answers from a line reader (stdin by default).
pub struct TerminalDialogs {
    input: Mutex<Box<dyn BufRead + Send>>,
    interactive: bool,
}

impl TerminalDialogs {
    /// Prompts on stdin; falls back to conservative answers when not attached to a TTY
    /// or when EXTEDIT_NON_INTERACTIVE=1.
    pub fn stdio() -> Self {
        let interactive = atty::is(atty::Stream::Stdin)
            && std::env::var("EXTEDIT_NON_INTERACTIVE").ok().as_deref() != Some("1");
        Self {
            input: Mutex::new(Box::new(io::BufReader::new(io::stdin()))),
            interactive,
        }
    }

    pub fn with_input(input: Box<dyn BufRead + Send>) -> Self {
        Self {
            input: Mutex::new(input),
            interactive: true,
        }
    }

    fn read_line(&self) -> Option<String> {
        if !self.interactive {
            return None;
        }
        let mut guard = self.input.lock().unwrap_or_else(|e| e.into_inner());
        let mut line = String::new();
        match guard.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    fn prompt(&self, text: &str) {
        let use_err = crate::color_enabled_stderr();
        eprint!("{}", crate::paint(use_err, "\x1b[90m", text));
        let _ = io::stderr().flush();
    }
}

impl DialogGateway for TerminalDialogs {
    fn confirm(&self, kind: ConfirmKind, message: &str) -> Answer {
        let use_err = crate::color_enabled_stderr();
        eprintln!("{}", crate::paint(use_err, "\x1b[33;1m", message));
        let labels = kind
            .choices()
            .iter()
            .map(|a| {
                let w = answer_word(*a);
                format!("[{}]{}", &w[..1], &w[1..])
            })
            .collect::<Vec<_>>()
            .join("/");
        for _ in 0..3 {
            self.prompt(&format!("{labels}: "));
            let Some(line) = self.read_line() else {
                return kind.fallback();
            };
            if let Some(a) = parse_answer(kind, &line) {
                return a;
            }
        }
        kind.fallback()
    }

    fn prompt_open_path(&self) -> Option<PathBuf> {
        self.prompt("Path of the file to load (empty to cancel): ");
        self.read_line()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    fn prompt_save_path(
        &self,
        default_ext: Option<&str>,
        default_name: Option<&str>,
    ) -> Option<PathBuf> {
        let suggested = match (default_name, default_ext) {
            (Some(n), Some(e)) => Some(format!("{n}.{e}")),
            (Some(n), None) => Some(n.to_string()),
            (None, Some(e)) => Some(format!("untitled.{e}")),
            (None, None) => None,
        };
        match &suggested {
            Some(s) => self.prompt(&format!("Save as [{s}] (\"-\" to cancel): ")),
            None => self.prompt("Save as (empty to cancel): "),
        }
        let line = self.read_line()?;
        let t = line.trim();
        if t == "-" {
            return None;
        }
        if t.is_empty() {
            return suggested.map(PathBuf::from);
        }
        Some(PathBuf::from(t))
    }

    fn notify(&self, kind: NoticeKind, message: &str) {
        let use_err = crate::color_enabled_stderr();
        let line = format!("extedit: {message}");
        match kind {
            NoticeKind::Error => crate::log_error_stderr(use_err, &line),
            NoticeKind::ConfirmWhenDone | NoticeKind::WaitingForApplication => {
                crate::log_warn_stderr(use_err, &line)
            }
            _ => crate::log_info_stderr(use_err, &line),
        }
    }
}
