use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use extedit::{
    Answer, ConfirmKind, DialogGateway, EditConfig, EditError, FieldKind, FileField,
    SessionCoordinator, SessionPhase, StaticHint, TerminalDialogs,
};

mod cli;

use cli::{Cli, Command, FieldArgs};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_terminate(_sig: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT/SIGTERM into a flag so an open session is recovered instead of leaked.
///
/// Installed only once `open` has returned: before that no temp file is owned and the
/// default action is the right one. Blocking terminal reads retry after the signal, so
/// an interrupt during the decision prompt takes effect when the prompt returns.
#[cfg(unix)]
fn install_signal_handlers() {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    let action = SigAction::new(
        SigHandler::Handler(on_terminate),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        if let Err(e) = unsafe { sigaction(sig, &action) } {
            let use_err = extedit::color_enabled_stderr();
            extedit::log_warn_stderr(
                use_err,
                &format!("extedit: cannot install {sig} handler: {e}"),
            );
        }
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

fn load_config(cli: &Cli) -> Result<EditConfig> {
    let mut cfg = EditConfig::load().map_err(|e| anyhow!(e))?;
    if let Some(dir) = &cli.temp_dir {
        cfg.temp_dir = dir.clone();
    }
    if let Some(opener) = &cli.opener {
        cfg.opener = Some(opener.clone());
    }
    Ok(cfg)
}

fn file_field(args: &FieldArgs) -> Arc<FileField> {
    let kind = if args.text {
        FieldKind::Text
    } else {
        FieldKind::Binary
    };
    Arc::new(FileField::new(&args.field, kind, args.read_only))
}

fn stem_and_ext(p: &Path) -> (Option<String>, Option<String>) {
    let stem = p.file_stem().map(|s| s.to_string_lossy().to_string());
    let ext = p.extension().map(|s| s.to_string_lossy().to_string());
    (stem, ext)
}

fn coordinator(
    cfg: EditConfig,
    args: &FieldArgs,
    dialogs: Arc<TerminalDialogs>,
    name: Option<String>,
    extension: Option<String>,
) -> SessionCoordinator {
    let (stem, ext) = stem_and_ext(&args.field);
    let mut builder = SessionCoordinator::builder(file_field(args), dialogs).config(cfg);
    if let Some(n) = name.or(stem) {
        builder = builder.name_hint(Arc::new(StaticHint::new(n)));
    }
    if let Some(e) = extension.or(ext) {
        builder = builder.extension_hint(Arc::new(StaticHint::new(e)));
    }
    builder.build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopStep {
    Recover,
    Done,
    AskUser,
    Wait,
}

/// What the terminal loop does next; an interrupt always wins.
fn next_step(interrupted: bool, phase: SessionPhase) -> LoopStep {
    if interrupted {
        return LoopStep::Recover;
    }
    match phase {
        SessionPhase::Cleaned | SessionPhase::Idle => LoopStep::Done,
        SessionPhase::AwaitingUserInput => LoopStep::AskUser,
        _ => LoopStep::Wait,
    }
}

fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Drive an open session to completion from the terminal.
fn wait_for_session(session: &SessionCoordinator, dialogs: &TerminalDialogs) {
    loop {
        let phase = session.wait_settled(Some(Duration::from_millis(200)));
        match next_step(interrupted(), phase) {
            LoopStep::Recover => {
                session.recover_file();
                return;
            }
            LoopStep::Done => return,
            LoopStep::Wait => {}
            LoopStep::AskUser => {
                let answer = dialogs.confirm(
                    ConfirmKind::YesNo,
                    "Finished editing? [yes] saves the changes, [no] discards them.",
                );
                // Ctrl-C while the prompt was up: recover instead of acting on the answer
                if next_step(interrupted(), phase) == LoopStep::Recover {
                    session.recover_file();
                    return;
                }
                if answer != Answer::Yes {
                    session.close_file();
                    return;
                }
                if let Err(e) = session.accept() {
                    let use_err = extedit::color_enabled_stderr();
                    extedit::log_error_stderr(use_err, &format!("extedit: {e}"));
                    session.recover_file();
                    return;
                }
            }
        }
    }
}

fn report_edit_error(e: &EditError) -> ExitCode {
    let use_err = extedit::color_enabled_stderr();
    if e.is_cancelled() {
        extedit::log_info_stderr(use_err, "extedit: cancelled");
    } else {
        extedit::log_error_stderr(
            use_err,
            &format!("extedit: {}", extedit::display_for_edit_error(e)),
        );
    }
    ExitCode::from(extedit::exit_code_for_edit_error(e))
}

fn run_doctor(cfg: &EditConfig) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("extedit doctor");
    eprintln!("  version: v{}", version);
    eprintln!(
        "  build: {} {} {} ({})",
        env!("EXTEDIT_BUILD_DATE"),
        env!("EXTEDIT_BUILD_TARGET"),
        env!("EXTEDIT_BUILD_PROFILE"),
        env!("EXTEDIT_BUILD_RUSTC")
    );
    eprintln!("  host: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
    match extedit::SystemLauncher::new(cfg.opener.clone()).opener_argv() {
        Ok(argv) => eprintln!("  opener: {}", argv.join(" ")),
        Err(e) => eprintln!("  opener: unavailable ({e})"),
    }
    let writable = extedit::util::fs::ensure_dir(&cfg.temp_dir)
        .map(|_| extedit::util::fs::is_writable(&cfg.temp_dir))
        .unwrap_or(false);
    eprintln!(
        "  temp dir: {} ({})",
        cfg.temp_dir.display(),
        if writable { "writable" } else { "not writable" }
    );
    match extedit::config::config_file_path() {
        Some(p) if p.is_file() => eprintln!("  config file: {}", p.display()),
        Some(p) => eprintln!("  config file: {} (not present)", p.display()),
        None => eprintln!("  config file: (no home directory)"),
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = load_config(&cli)?;
    let dialogs = Arc::new(TerminalDialogs::stdio());

    match cli.command {
        Command::Edit {
            field,
            name,
            extension,
            no_auto_rename,
            json,
        } => {
            let mut cfg = cfg;
            if no_auto_rename {
                cfg.auto_rename_on_open = false;
            }
            let session = coordinator(cfg, &field, Arc::clone(&dialogs), name, extension);
            if let Err(e) = session.open() {
                return Ok(report_edit_error(&e));
            }
            install_signal_handlers();
            wait_for_session(&session, &dialogs);
            let snapshot = session.snapshot();
            if json {
                let out = serde_json::to_string_pretty(&snapshot)
                    .context("cannot serialize session state")?;
                println!("{out}");
            }
            Ok(if snapshot.processed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Load { field, from } => {
            let session = coordinator(cfg, &field, Arc::clone(&dialogs), None, None);
            match session.load_from_file(from.as_deref()) {
                Ok(p) => {
                    let use_err = extedit::color_enabled_stderr();
                    extedit::log_info_stderr(use_err, &format!("extedit: loaded {}", p.display()));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => Ok(report_edit_error(&e)),
            }
        }
        Command::Save { field, to } => {
            let session = coordinator(cfg, &field, Arc::clone(&dialogs), None, None);
            match session.save_to_file(to.as_deref()) {
                Ok(p) => {
                    let use_err = extedit::color_enabled_stderr();
                    extedit::log_info_stderr(use_err, &format!("extedit: saved {}", p.display()));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => Ok(report_edit_error(&e)),
            }
        }
        Command::Clear { field } => {
            let session = coordinator(cfg, &field, Arc::clone(&dialogs), None, None);
            match session.clear_field() {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) => Ok(report_edit_error(&e)),
            }
        }
        Command::Clean { older_than, json } => {
            let report = extedit::sweep_stale_files(&cfg.temp_dir, older_than)
                .with_context(|| format!("cannot sweep {}", cfg.temp_dir.display()))?;
            if json {
                let value = serde_json::json!({
                    "removed": report.removed.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                    "skipped_locked": report.skipped_locked.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                    "failed": report.failed.iter().map(|(p, e)| serde_json::json!({"path": p.display().to_string(), "error": e})).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let use_err = extedit::color_enabled_stderr();
                for p in &report.removed {
                    extedit::log_info_stderr(use_err, &format!("extedit: removed {}", p.display()));
                }
                for p in &report.skipped_locked {
                    extedit::log_warn_stderr(use_err, &format!("extedit: in use, kept {}", p.display()));
                }
                for (p, e) in &report.failed {
                    extedit::log_error_stderr(use_err, &format!("extedit: cannot remove {}: {}", p.display(), e));
                }
            }
            Ok(if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Config { json } => {
            let report = cfg.report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("maximum-content-length: {}", report.maximum_content_length);
                println!("poll-interval: {}ms", report.poll_interval_ms);
                println!("wait-for-process-interval: {}ms", report.wait_for_process_interval_ms);
                println!("auto-rename-on-open: {}", report.auto_rename_on_open);
                println!("temp-dir: {}", report.temp_dir);
                println!("opener: {}", report.opener.as_deref().unwrap_or("(platform default)"));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Doctor => {
            run_doctor(&cfg);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let _telemetry = extedit::telemetry_init();
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        extedit::set_color_mode(mode);
    }
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let use_err = extedit::color_enabled_stderr();
            extedit::log_error_stderr(use_err, &format!("extedit: {e:#}"));
            ExitCode::from(1)
        }
    }
}
