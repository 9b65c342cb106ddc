//! Edit session coordinator: the public Open/Load/Save/Close/Recover contract.
//!
//! Behavior
//! - One session at a time. All state lives in one mutex-guarded `Session`; the owning
//!   thread, the poller and the process-exit watcher all go through it.
//! - Terminal cleanup happens exactly once: every path re-checks `processed` right after
//!   taking the lock and backs off if set. The winner marks the session processed under
//!   the lock, deletes the temp file after releasing it, then publishes `Cleaned`.
//! - Each open bumps a generation counter so a stale poller from an earlier session can
//!   never act on a newer one.
//! - Dropping the coordinator with a session still open runs `recover_file` once.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::EditConfig;
use crate::dialog::{Answer, ConfirmKind, DialogGateway, NoticeKind};
use crate::errors::EditError;
use crate::field::{Field, Hint};
use crate::launcher::{ProcessLauncher, ProcessRef, SystemLauncher};
use crate::naming::{normalize_extension, sanitize_stem, NamingResolver};
use crate::transfer::ContentTransfer;
use crate::ui::{keys, DefaultText, InlineDispatcher, Localizer, UiDispatcher};
use crate::util::fs::{clear_readonly, ensure_dir, remove_file_with_retries, set_readonly};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session has been opened (or the last open failed).
    Idle,
    /// `open` is resolving a name, writing content or launching.
    Opening,
    WaitingInitialDelay,
    /// Exit of the launched process is being watched.
    AttachedToProcess,
    /// The file is locked; polling until it is released.
    WaitingForRelease,
    /// Completion could not be inferred; waiting for `accept` or `close_file`.
    AwaitingUserInput,
    Reconciling,
    Cleaned,
}

/// Copy of the observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub file_path: Option<PathBuf>,
    pub opened: bool,
    pub processed: bool,
    pub save_on_exit: bool,
    pub user_input_required: bool,
}

pub(crate) type Notice = (NoticeKind, String);

/// Temp file removal deferred until the session mutex is released.
#[must_use]
pub(crate) struct PendingCleanup {
    generation: u64,
    path: Option<PathBuf>,
}

pub(crate) struct Session {
    pub(crate) generation: u64,
    pub(crate) phase: SessionPhase,
    pub(crate) file_path: Option<PathBuf>,
    pub(crate) opened: bool,
    pub(crate) processed: bool,
    pub(crate) save_on_exit: bool,
    pub(crate) user_input_required: bool,
    pub(crate) process: Option<ProcessRef>,
    pub(crate) initial_poll: bool,
    pub(crate) locked_on_first_poll: bool,
    /// Dropping the sender wakes and stops the poller.
    pub(crate) stop: Option<mpsc::Sender<()>>,
}

impl Session {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            phase: SessionPhase::Idle,
            file_path: None,
            opened: false,
            processed: false,
            save_on_exit: false,
            user_input_required: false,
            process: None,
            initial_poll: true,
            locked_on_first_poll: false,
            stop: None,
        }
    }

    fn is_active(&self) -> bool {
        self.phase == SessionPhase::Opening || (self.opened && !self.processed)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            file_path: self.file_path.clone(),
            opened: self.opened,
            processed: self.processed,
            save_on_exit: self.save_on_exit,
            user_input_required: self.user_input_required,
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<Session>,
    changed: Condvar,
    pub(crate) field: Arc<dyn Field>,
    pub(crate) transfer: ContentTransfer,
    pub(crate) dialogs: Arc<dyn DialogGateway>,
    pub(crate) ui: Arc<dyn UiDispatcher>,
    pub(crate) text: Arc<dyn Localizer>,
    pub(crate) launcher: Arc<dyn ProcessLauncher>,
    pub(crate) config: EditConfig,
    name_hint: Option<Arc<dyn Hint>>,
    extension_hint: Option<Arc<dyn Hint>>,
}

impl Shared {
    /// Lock the session; a panic on another thread must not wedge the owner.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn transition(&self, st: &mut Session, phase: SessionPhase) {
        st.phase = phase;
        self.changed.notify_all();
    }

    /// True while `generation` is the current, unfinished session.
    pub(crate) fn is_live(&self, generation: u64) -> bool {
        let st = self.lock_state();
        st.generation == generation && st.opened && !st.processed
    }

    fn hint_values(&self) -> (Option<String>, Option<String>) {
        let name = self
            .name_hint
            .as_ref()
            .and_then(|h| h.value())
            .map(|s| sanitize_stem(&s))
            .filter(|s| !s.is_empty());
        let ext = self
            .extension_hint
            .as_ref()
            .and_then(|h| h.value())
            .map(|s| normalize_extension(&s))
            .filter(|s| !s.is_empty());
        (name, ext)
    }

    fn path_text(st: &Session) -> String {
        st.file_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    /// Reconcile (when asked, writable and changed) then mark the session processed.
    ///
    /// On a reconcile failure nothing is deleted and the error is returned; the caller
    /// decides how to surface it. `None` means another path already finished.
    pub(crate) fn finish_locked(
        &self,
        st: &mut Session,
        reconcile: bool,
    ) -> Result<Option<(Vec<Notice>, PendingCleanup)>, EditError> {
        if st.processed {
            return Ok(None);
        }
        let shown = Self::path_text(st);
        let mut notices = Vec::new();
        if let (true, true, Some(path)) = (reconcile, st.save_on_exit, st.file_path.clone()) {
            let previous = st.phase;
            self.transition(st, SessionPhase::Reconciling);
            if !self.transfer.content_equals(&path) {
                if let Err(e) = self.transfer.write_file_to_field(&path) {
                    self.transition(st, previous);
                    return Err(e);
                }
                notices.push((NoticeKind::Saved, self.text.get(keys::SAVED, &[&shown])));
            }
        }
        let pending = self.cleanup_locked(st);
        notices.push((NoticeKind::Finished, self.text.get(keys::FINISHED, &[&shown])));
        Ok(Some((notices, pending)))
    }

    /// Background completion whose reconcile failed: keep the file, ask the human.
    pub(crate) fn reconcile_failed_locked(&self, st: &mut Session, err: &EditError) -> Vec<Notice> {
        st.user_input_required = true;
        self.transition(st, SessionPhase::AwaitingUserInput);
        let shown = Self::path_text(st);
        let use_err = crate::color_enabled_stderr();
        crate::log_error_stderr(
            use_err,
            &format!("extedit: cannot save changes from {shown}: {err}"),
        );
        #[cfg(feature = "telemetry")]
        tracing::error!(path = %shown, error = %err, "reconcile failed");
        vec![(
            NoticeKind::Error,
            self.text
                .get(keys::RECONCILE_FAILED, &[&shown, &err.to_string()]),
        )]
    }

    /// Mark the session processed and detach its monitors. Caller has checked
    /// `processed`. The file itself goes in `complete_cleanup`, after the lock is released,
    /// so deletion retries never stall the owning thread.
    pub(crate) fn cleanup_locked(&self, st: &mut Session) -> PendingCleanup {
        st.processed = true;
        st.opened = false;
        st.user_input_required = false;
        st.process = None;
        st.stop = None;
        PendingCleanup {
            generation: st.generation,
            path: st.file_path.clone(),
        }
    }

    /// Delete the temp file, then publish `Cleaned` unless a newer session took over.
    pub(crate) fn complete_cleanup(&self, pending: PendingCleanup) {
        if let Some(path) = &pending.path {
            if let Err(e) = remove_file_with_retries(path) {
                let use_err = crate::color_enabled_stderr();
                crate::log_warn_stderr(
                    use_err,
                    &format!("extedit: could not delete {}: {}", path.display(), e),
                );
            }
        }
        let mut st = self.lock_state();
        if st.generation == pending.generation {
            self.transition(&mut st, SessionPhase::Cleaned);
        }
    }

    /// A poller or exit-watcher fault: fall back to an explicit human decision.
    pub(crate) fn degrade_after_fault(&self, generation: u64, reason: &str) {
        let notices = {
            let mut st = self.lock_state();
            if st.generation != generation || st.processed || !st.opened {
                return;
            }
            st.user_input_required = true;
            st.process = None;
            self.transition(&mut st, SessionPhase::AwaitingUserInput);
            let shown = Self::path_text(&st);
            vec![(
                NoticeKind::Error,
                self.text.get(keys::MONITOR_FAILED, &[&shown]),
            )]
        };
        let use_err = crate::color_enabled_stderr();
        crate::log_error_stderr(use_err, &format!("extedit: session monitor failed: {reason}"));
        #[cfg(feature = "telemetry")]
        tracing::error!(reason, "session monitor failed");
        self.dispatch(notices);
    }

    /// Deliver notices from a background thread through the UI dispatcher.
    pub(crate) fn dispatch(&self, notices: Vec<Notice>) {
        for (kind, msg) in notices {
            let dialogs = Arc::clone(&self.dialogs);
            self.ui
                .run_on_ui_thread(Box::new(move || dialogs.notify(kind, &msg)));
        }
    }
}

/// Builder for `SessionCoordinator`; everything but the field and dialogs is optional.
pub struct CoordinatorBuilder {
    field: Arc<dyn Field>,
    dialogs: Arc<dyn DialogGateway>,
    config: EditConfig,
    launcher: Option<Arc<dyn ProcessLauncher>>,
    ui: Arc<dyn UiDispatcher>,
    text: Arc<dyn Localizer>,
    name_hint: Option<Arc<dyn Hint>>,
    extension_hint: Option<Arc<dyn Hint>>,
}

impl CoordinatorBuilder {
    pub fn config(mut self, config: EditConfig) -> Self {
        self.config = config.normalized();
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn ui_dispatcher(mut self, ui: Arc<dyn UiDispatcher>) -> Self {
        self.ui = ui;
        self
    }

    pub fn localizer(mut self, text: Arc<dyn Localizer>) -> Self {
        self.text = text;
        self
    }

    pub fn name_hint(mut self, hint: Arc<dyn Hint>) -> Self {
        self.name_hint = Some(hint);
        self
    }

    pub fn extension_hint(mut self, hint: Arc<dyn Hint>) -> Self {
        self.extension_hint = Some(hint);
        self
    }

    pub fn build(self) -> SessionCoordinator {
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(SystemLauncher::new(self.config.opener.clone())));
        let transfer =
            ContentTransfer::new(Arc::clone(&self.field), self.config.maximum_content_length);
        SessionCoordinator {
            shared: Arc::new(Shared {
                state: Mutex::new(Session::idle(0)),
                changed: Condvar::new(),
                field: self.field,
                transfer,
                dialogs: self.dialogs,
                ui: self.ui,
                text: self.text,
                launcher,
                config: self.config,
                name_hint: self.name_hint,
                extension_hint: self.extension_hint,
            }),
        }
    }
}

pub struct SessionCoordinator {
    shared: Arc<Shared>,
}

impl SessionCoordinator {
    pub fn builder(field: Arc<dyn Field>, dialogs: Arc<dyn DialogGateway>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            field,
            dialogs,
            config: EditConfig::default(),
            launcher: None,
            ui: Arc::new(InlineDispatcher),
            text: Arc::new(DefaultText),
            name_hint: None,
            extension_hint: None,
        }
    }

    #[cfg_attr(feature = "telemetry", instrument(level = "info", skip(self), err))]
    /// Materialize the field to a temp file, launch its default handler and start
    /// monitoring. Returns the temp file path.
    pub fn open(&self) -> Result<PathBuf, EditError> {
        let generation = self.reserve()?;
        match self.open_reserved(generation) {
            Ok(p) => Ok(p),
            Err(e) => {
                let mut st = self.shared.lock_state();
                if st.generation == generation && st.phase == SessionPhase::Opening {
                    *st = Session::idle(generation);
                    self.shared.changed.notify_all();
                }
                Err(e)
            }
        }
    }

    fn reserve(&self) -> Result<u64, EditError> {
        let mut st = self.shared.lock_state();
        if st.is_active() {
            return Err(EditError::AlreadyOpen);
        }
        let generation = st.generation + 1;
        *st = Session::idle(generation);
        st.save_on_exit = !self.shared.field.is_read_only();
        self.shared.transition(&mut st, SessionPhase::Opening);
        Ok(generation)
    }

    fn open_reserved(&self, generation: u64) -> Result<PathBuf, EditError> {
        let shared = &self.shared;
        let save_on_exit = !shared.field.is_read_only();
        let (name, ext) = shared.hint_values();

        let resolved = NamingResolver::new(
            &shared.config.temp_dir,
            shared.dialogs.as_ref(),
            shared.text.as_ref(),
            &shared.transfer,
        )
        .resolve(
            name.as_deref(),
            ext.as_deref(),
            shared.config.auto_rename_on_open,
        )?;
        let path = match resolved {
            Some(p) => p,
            None => {
                ensure_dir(&shared.config.temp_dir)?;
                shared
                    .dialogs
                    .prompt_save_path(ext.as_deref(), name.as_deref())
                    .ok_or(EditError::Cancelled)?
            }
        };

        self.write_with_retry(&path)?;
        if !save_on_exit {
            if let Err(e) = set_readonly(&path) {
                let use_err = crate::color_enabled_stderr();
                crate::log_warn_stderr(
                    use_err,
                    &format!("extedit: could not mark {} read-only: {}", path.display(), e),
                );
            }
        }
        let shown = path.display().to_string();
        if save_on_exit {
            // Surface the session before launching so the application does not hide it
            shared.dialogs.notify(
                NoticeKind::EditingStarted,
                &shared.text.get(keys::EDITING_STARTED, &[&shown]),
            );
        }

        let process = match shared.launcher.launch(&path) {
            Ok(p) => p,
            Err(e) => {
                self.offer_delete_after_launch_failure(&path, &e);
                return Err(EditError::Cancelled);
            }
        };

        let (tx, rx) = mpsc::channel();
        {
            let mut st = shared.lock_state();
            st.file_path = Some(path.clone());
            st.opened = true;
            st.save_on_exit = save_on_exit;
            st.process = process;
            st.stop = Some(tx);
            st.initial_poll = true;
            shared.transition(&mut st, SessionPhase::WaitingInitialDelay);
        }
        if let Err(e) = crate::poller::spawn_poller(Arc::clone(shared), generation, rx) {
            shared.degrade_after_fault(generation, &format!("cannot start poller: {e}"));
        }
        Ok(path)
    }

    fn write_with_retry(&self, path: &Path) -> Result<(), EditError> {
        let existed = path.exists();
        loop {
            match self.shared.transfer.write_field_to_file(path) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let msg = self.shared.text.get(
                        keys::WRITE_FAILED,
                        &[&path.display().to_string(), &e.to_string()],
                    );
                    if self.shared.dialogs.confirm(ConfirmKind::RetryCancel, &msg) == Answer::Retry {
                        continue;
                    }
                    if !existed {
                        let _ = remove_file_with_retries(path);
                    }
                    return Err(EditError::Cancelled);
                }
            }
        }
    }

    fn offer_delete_after_launch_failure(&self, path: &Path, err: &EditError) {
        let reason = match err {
            EditError::LaunchFailed(r) => r.clone(),
            other => other.to_string(),
        };
        let use_err = crate::color_enabled_stderr();
        crate::log_warn_stderr(
            use_err,
            &format!("extedit: launch failed for {}: {}", path.display(), reason),
        );
        let msg = self.shared.text.get(
            keys::LAUNCH_FAILED_DELETE,
            &[&path.display().to_string(), &reason],
        );
        if self.shared.dialogs.confirm(ConfirmKind::YesNo, &msg) == Answer::Yes {
            if let Err(e) = remove_file_with_retries(path) {
                crate::log_warn_stderr(
                    use_err,
                    &format!("extedit: could not delete {}: {}", path.display(), e),
                );
            }
        }
    }

    #[cfg_attr(feature = "telemetry", instrument(level = "info", skip(self), err))]
    /// Replace the field value with the contents of `path` (prompted when `None`).
    pub fn load_from_file(&self, path: Option<&Path>) -> Result<PathBuf, EditError> {
        if self.shared.field.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self
                .shared
                .dialogs
                .prompt_open_path()
                .ok_or(EditError::Cancelled)?,
        };
        let _st = self.shared.lock_state();
        self.shared.transfer.write_file_to_field(&path)?;
        Ok(path)
    }

    #[cfg_attr(feature = "telemetry", instrument(level = "info", skip(self), err))]
    /// Write the field value to `path` (prompted when `None`).
    pub fn save_to_file(&self, path: Option<&Path>) -> Result<PathBuf, EditError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let (name, ext) = self.shared.hint_values();
                self.shared
                    .dialogs
                    .prompt_save_path(ext.as_deref(), name.as_deref())
                    .ok_or(EditError::Cancelled)?
            }
        };
        let _st = self.shared.lock_state();
        self.shared.transfer.write_field_to_file(&path)?;
        Ok(path)
    }

    /// Abandon the open session without reconciling. Idempotent; returns true when this
    /// call performed the cleanup.
    pub fn close_file(&self) -> bool {
        let pending = {
            let mut st = self.shared.lock_state();
            if !st.opened || st.processed {
                return false;
            }
            self.shared.cleanup_locked(&mut st)
        };
        self.shared.complete_cleanup(pending);
        true
    }

    /// Resolve `AwaitingUserInput`: reconcile if changed, then clean up.
    /// Returns Ok(false) when there is nothing awaiting a decision.
    pub fn accept(&self) -> Result<bool, EditError> {
        let finished = {
            let mut st = self.shared.lock_state();
            if st.processed || !st.opened || st.phase != SessionPhase::AwaitingUserInput {
                return Ok(false);
            }
            self.shared.finish_locked(&mut st, true)?
        };
        let Some((notices, pending)) = finished else {
            return Ok(false);
        };
        self.shared.complete_cleanup(pending);
        for (kind, msg) in notices {
            self.shared.dialogs.notify(kind, &msg);
        }
        Ok(true)
    }

    /// Teardown while a session is open: offer once to save a copy of the temp file
    /// (writable sessions only), then clean up. Returns true when this call cleaned up.
    pub fn recover_file(&self) -> bool {
        let pending = {
            let mut st = self.shared.lock_state();
            if !st.opened || st.processed {
                return false;
            }
            if let (true, Some(path)) = (st.save_on_exit, st.file_path.clone()) {
                self.offer_copy(&path);
            }
            self.shared.cleanup_locked(&mut st)
        };
        self.shared.complete_cleanup(pending);
        true
    }

    fn offer_copy(&self, path: &Path) {
        let shared = &self.shared;
        let shown = path.display().to_string();
        let msg = shared.text.get(keys::RECOVER_SAVE_COPY, &[&shown]);
        if shared.dialogs.confirm(ConfirmKind::YesNo, &msg) != Answer::Yes {
            return;
        }
        let (name, ext) = shared.hint_values();
        let Some(dest) = shared
            .dialogs
            .prompt_save_path(ext.as_deref(), name.as_deref())
        else {
            return;
        };
        let copied = clear_readonly(&dest).and_then(|_| fs::copy(path, &dest));
        if let Err(e) = copied {
            shared.dialogs.notify(
                NoticeKind::Error,
                &shared.text.get(
                    keys::RECOVER_COPY_FAILED,
                    &[&dest.display().to_string(), &e.to_string()],
                ),
            );
        }
    }

    /// Clear the field value. Refused while a session is open.
    pub fn clear_field(&self) -> Result<(), EditError> {
        if self.shared.field.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        let st = self.shared.lock_state();
        if st.is_active() {
            return Err(EditError::AlreadyOpen);
        }
        self.shared.field.clear_value()?;
        drop(st);
        Ok(())
    }

    pub fn file_opened(&self) -> bool {
        self.shared.lock_state().opened
    }

    pub fn file_processed(&self) -> bool {
        self.shared.lock_state().processed
    }

    /// Temp file of the current (or most recent) session.
    pub fn file_name(&self) -> Option<PathBuf> {
        self.shared.lock_state().file_path.clone()
    }

    pub fn state(&self) -> SessionPhase {
        self.shared.lock_state().phase
    }

    pub fn user_input_required(&self) -> bool {
        self.shared.lock_state().user_input_required
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock_state().snapshot()
    }

    /// Block until the session is `Cleaned`, `AwaitingUserInput` or `Idle`, or until
    /// `timeout` elapses. Returns the phase observed last.
    pub fn wait_settled(&self, timeout: Option<Duration>) -> SessionPhase {
        // An unrepresentable deadline (e.g. Duration::MAX) means wait without one
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut st = self.shared.lock_state();
        loop {
            // A processed session is settled only once its file is gone
            let settled = match st.phase {
                SessionPhase::Cleaned | SessionPhase::Idle => true,
                SessionPhase::AwaitingUserInput => !st.processed,
                _ => false,
            };
            if settled {
                return st.phase;
            }
            st = match deadline {
                None => self
                    .shared
                    .changed
                    .wait(st)
                    .unwrap_or_else(|e| e.into_inner()),
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return st.phase;
                    }
                    self.shared
                        .changed
                        .wait_timeout(st, d - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        // Dispose: offer recovery once for a session that is still open
        self.recover_file();
    }
}
