//! Background completion detection.
//!
//! After an initial grace period the poller takes one `PollObservation` per tick under
//! the session mutex and maps it through `decide`:
//!
//! | read-only | live process | locked on first poll | locked now | action                      |
//! |-----------|--------------|----------------------|------------|-----------------------------|
//! | yes       | -            | -                    | yes        | keep polling                |
//! | yes       | -            | -                    | no         | clean up, no reconcile      |
//! | no        | yes          | -                    | -          | attach to process exit      |
//! | no        | no           | yes                  | yes        | keep polling                |
//! | no        | no           | yes                  | no         | reconcile + clean up        |
//! | no        | no           | no                   | -          | ask the human               |
//!
//! Only the very first tick counts as the initial poll; a later unlock/relock flicker is
//! not re-examined.
//!
//! Sleeps are `recv_timeout` on a stop channel, so dropping the session's sender
//! (close/recover/cleanup) ends the loop without waiting out the interval. Panics are
//! contained and degrade the session to `AwaitingUserInput`.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::dialog::NoticeKind;
use crate::launcher::ProcessRef;
use crate::lock::probe_lock;
use crate::session::{Notice, PendingCleanup, SessionPhase, Shared};
use crate::ui::keys;

/// Snapshot taken on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollObservation {
    /// `None` when there is no process reference.
    pub process_alive: Option<bool>,
    pub file_locked: bool,
    pub is_initial_poll: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    KeepPolling,
    AttachToProcess,
    /// Read-only completion: delete the file, never write back.
    Cleanup,
    ReconcileAndCleanup,
    AwaitUserInput,
}

/// The decision table as a pure function.
///
/// `locked_on_first_poll` is ignored on the initial tick (the observation itself is the
/// first poll).
pub fn decide(read_only: bool, locked_on_first_poll: bool, obs: &PollObservation) -> PollAction {
    if read_only {
        return if obs.file_locked {
            PollAction::KeepPolling
        } else {
            PollAction::Cleanup
        };
    }
    if obs.process_alive == Some(true) {
        return PollAction::AttachToProcess;
    }
    let locked_first = if obs.is_initial_poll {
        obs.file_locked
    } else {
        locked_on_first_poll
    };
    match (locked_first, obs.file_locked) {
        (false, _) => PollAction::AwaitUserInput,
        (true, true) => PollAction::KeepPolling,
        (true, false) => PollAction::ReconcileAndCleanup,
    }
}

enum Step {
    Continue,
    Stop,
}

pub(crate) fn spawn_poller(
    shared: Arc<Shared>,
    generation: u64,
    stop: Receiver<()>,
) -> io::Result<()> {
    thread::Builder::new()
        .name("extedit-poller".to_string())
        .spawn(move || {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| poll_loop(&shared, generation, &stop)));
            if outcome.is_err() {
                shared.degrade_after_fault(generation, "poller panicked");
            }
        })?;
    Ok(())
}

/// False when the stop channel fired (or its sender was dropped).
fn sleep_or_stop(stop: &Receiver<()>, interval: Duration) -> bool {
    matches!(stop.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}

fn poll_loop(shared: &Arc<Shared>, generation: u64, stop: &Receiver<()>) {
    if !sleep_or_stop(stop, shared.config.wait_for_process_interval) {
        return;
    }
    loop {
        if let Step::Stop = tick(shared, generation) {
            return;
        }
        if !sleep_or_stop(stop, shared.config.poll_interval) {
            return;
        }
    }
}

fn tick(shared: &Arc<Shared>, generation: u64) -> Step {
    let mut notices: Vec<Notice> = Vec::new();
    let mut attach: Option<ProcessRef> = None;
    let mut pending: Option<PendingCleanup> = None;
    let step = {
        let mut st = shared.lock_state();
        if st.generation != generation || st.processed || !st.opened {
            return Step::Stop;
        }
        let Some(path) = st.file_path.clone() else {
            return Step::Stop;
        };
        let shown = path.display().to_string();

        let process_alive = st
            .process
            .as_mut()
            .map(|h| h.is_running().unwrap_or(false));
        let obs = PollObservation {
            process_alive,
            file_locked: probe_lock(&path).is_locked(),
            is_initial_poll: st.initial_poll,
        };
        if obs.is_initial_poll {
            st.initial_poll = false;
            st.locked_on_first_poll = obs.file_locked;
        }
        let read_only = !st.save_on_exit;
        let action = decide(read_only, st.locked_on_first_poll, &obs);
        #[cfg(feature = "telemetry")]
        tracing::debug!(?obs, ?action, path = %shown, "poll tick");

        match action {
            PollAction::KeepPolling => {
                if obs.is_initial_poll && !read_only {
                    notices.push((
                        NoticeKind::WaitingForApplication,
                        shared.text.get(keys::WAITING_FOR_APPLICATION, &[&shown]),
                    ));
                }
                if st.phase != SessionPhase::WaitingForRelease {
                    shared.transition(&mut st, SessionPhase::WaitingForRelease);
                }
                Step::Continue
            }
            PollAction::AttachToProcess => match st.process.take() {
                Some(handle) => {
                    shared.transition(&mut st, SessionPhase::AttachedToProcess);
                    attach = Some(handle);
                    Step::Stop
                }
                None => Step::Continue,
            },
            PollAction::Cleanup | PollAction::ReconcileAndCleanup => {
                let reconcile = action == PollAction::ReconcileAndCleanup;
                match shared.finish_locked(&mut st, reconcile) {
                    Ok(Some((n, p))) => {
                        notices.extend(n);
                        pending = Some(p);
                    }
                    Ok(None) => {}
                    Err(e) => notices.extend(shared.reconcile_failed_locked(&mut st, &e)),
                }
                Step::Stop
            }
            PollAction::AwaitUserInput => {
                st.user_input_required = true;
                shared.transition(&mut st, SessionPhase::AwaitingUserInput);
                notices.push((
                    NoticeKind::ConfirmWhenDone,
                    shared.text.get(keys::CONFIRM_WHEN_DONE, &[&shown]),
                ));
                Step::Stop
            }
        }
    };
    if let Some(p) = pending {
        shared.complete_cleanup(p);
    }
    shared.dispatch(notices);
    if let Some(handle) = attach {
        if let Err(e) = spawn_exit_watcher(Arc::clone(shared), generation, handle) {
            shared.degrade_after_fault(generation, &format!("cannot watch process exit: {e}"));
        }
    }
    step
}

fn spawn_exit_watcher(shared: Arc<Shared>, generation: u64, handle: ProcessRef) -> io::Result<()> {
    thread::Builder::new()
        .name("extedit-exit-watch".to_string())
        .spawn(move || {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| watch_exit(&shared, generation, handle)));
            if outcome.is_err() {
                shared.degrade_after_fault(generation, "exit watcher panicked");
            }
        })?;
    Ok(())
}

/// Wait for the attached process to exit, then reconcile and clean up.
///
/// Waits in `poll_interval` slices so an explicit close is noticed and the thread ends.
fn watch_exit(shared: &Arc<Shared>, generation: u64, mut handle: ProcessRef) {
    loop {
        if !shared.is_live(generation) {
            return;
        }
        match handle.wait_timeout(shared.config.poll_interval) {
            Ok(true) => break,
            Ok(false) => continue,
            Err(e) => {
                shared.degrade_after_fault(generation, &format!("waiting for process: {e}"));
                return;
            }
        }
    }
    let (notices, pending) = {
        let mut st = shared.lock_state();
        if st.generation != generation || st.processed || !st.opened {
            return;
        }
        match shared.finish_locked(&mut st, true) {
            Ok(Some((n, p))) => (n, Some(p)),
            Ok(None) => (Vec::new(), None),
            Err(e) => (shared.reconcile_failed_locked(&mut st, &e), None),
        }
    };
    if let Some(p) = pending {
        shared.complete_cleanup(p);
    }
    shared.dispatch(notices);
}
