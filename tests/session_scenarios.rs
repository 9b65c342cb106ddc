mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use extedit::{
    Answer, Blob, ConfirmKind, EditError, MemoryField, NoticeKind, SessionCoordinator,
    SessionPhase, StaticHint,
};
use support::{fast_config, files_in, wait_for, FakeLauncher, LaunchMode, ScriptedDialogs};

const SETTLE: Option<Duration> = Some(Duration::from_secs(5));

#[test]
fn test_read_only_released_lock_cleans_up_without_writing() {
    let td = tempfile::tempdir().expect("tmpdir");
    let field = Arc::new(MemoryField::text("original").read_only());
    let dialogs = ScriptedDialogs::new();
    let launcher = FakeLauncher::locking(LaunchMode::NoProcess);
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(fast_config(td.path()))
        .launcher(launcher.clone())
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build();

    let path = session.open().expect("open");
    assert!(path.exists());
    assert!(wait_for(|| session.state() == SessionPhase::WaitingForRelease));
    launcher.release();

    assert_eq!(session.wait_settled(SETTLE), SessionPhase::Cleaned);
    assert!(!path.exists(), "temp file must be deleted");
    assert!(session.file_processed());
    assert_eq!(field.write_count(), 0);
    assert_eq!(field.snapshot(), Some(Blob::Text("original".into())));
    // Read-only sessions never announce editing nor wait notices
    assert!(!dialogs.notice_kinds().contains(&NoticeKind::EditingStarted));
    assert!(!dialogs.notice_kinds().contains(&NoticeKind::WaitingForApplication));
    assert!(dialogs.confirms().is_empty());
}

#[test]
fn test_live_process_exit_reconciles_modified_file() {
    let td = tempfile::tempdir().expect("tmpdir");
    let field = Arc::new(MemoryField::binary(vec![1u8, 2, 3]));
    let dialogs = ScriptedDialogs::new();
    let exited = Arc::new(AtomicBool::new(false));
    let launcher = FakeLauncher::new(LaunchMode::Live(exited.clone()));
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(fast_config(td.path()))
        .launcher(launcher)
        .name_hint(Arc::new(StaticHint::new("image")))
        .extension_hint(Arc::new(StaticHint::new(".bin")))
        .build();

    let path = session.open().expect("open");
    assert_eq!(path, td.path().join("edit").join("image.bin"));
    assert_eq!(std::fs::read(&path).expect("read temp"), vec![1u8, 2, 3]);
    assert!(wait_for(|| session.state() == SessionPhase::AttachedToProcess));

    std::fs::write(&path, [9u8, 8, 7, 6]).expect("modify");
    exited.store(true, Ordering::SeqCst);

    assert_eq!(session.wait_settled(SETTLE), SessionPhase::Cleaned);
    assert_eq!(field.snapshot(), Some(Blob::Bytes(vec![9, 8, 7, 6])));
    assert!(!path.exists());
    // Notices are delivered after the state lock is released
    assert!(wait_for(|| dialogs.has_notice(NoticeKind::Finished)));
    let kinds = dialogs.notice_kinds();
    assert!(kinds.contains(&NoticeKind::EditingStarted));
    assert!(kinds.contains(&NoticeKind::Saved));
}

#[test]
fn test_lock_then_release_reconciles_without_prompting() {
    let td = tempfile::tempdir().expect("tmpdir");
    let field = Arc::new(MemoryField::text("draft"));
    let dialogs = ScriptedDialogs::new();
    let launcher = FakeLauncher::locking(LaunchMode::NoProcess);
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(fast_config(td.path()))
        .launcher(launcher.clone())
        .extension_hint(Arc::new(StaticHint::new("md")))
        .build();

    let path = session.open().expect("open");
    assert_eq!(path.file_name().and_then(|s| s.to_str()), Some("content1.md"));
    assert!(wait_for(|| dialogs.has_notice(NoticeKind::WaitingForApplication)));

    std::fs::write(&path, "final text").expect("modify");
    launcher.release();

    assert_eq!(session.wait_settled(SETTLE), SessionPhase::Cleaned);
    assert_eq!(field.snapshot(), Some(Blob::Text("final text".into())));
    assert!(!path.exists());
    assert!(dialogs.confirms().is_empty(), "no prompt expected");
    assert!(!session.user_input_required());
}

#[test]
fn test_never_locked_waits_for_explicit_accept() {
    let td = tempfile::tempdir().expect("tmpdir");
    let field = Arc::new(MemoryField::text("before"));
    let dialogs = ScriptedDialogs::new();
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(fast_config(td.path()))
        .launcher(FakeLauncher::new(LaunchMode::NoProcess))
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build();

    let path = session.open().expect("open");
    assert_eq!(session.wait_settled(SETTLE), SessionPhase::AwaitingUserInput);
    assert!(session.user_input_required());
    assert!(wait_for(|| dialogs.has_notice(NoticeKind::ConfirmWhenDone)));

    // Nothing happens on its own while awaiting the human
    std::fs::write(&path, "after").expect("modify");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(session.state(), SessionPhase::AwaitingUserInput);
    assert_eq!(field.write_count(), 0);
    assert!(path.exists());

    assert!(session.accept().expect("accept"));
    assert_eq!(session.state(), SessionPhase::Cleaned);
    assert_eq!(field.snapshot(), Some(Blob::Text("after".into())));
    assert!(!path.exists());
    assert!(!session.accept().expect("second accept"), "nothing left to accept");
}

#[test]
fn test_unwritable_collision_abort_cancels_open() {
    let td = tempfile::tempdir().expect("tmpdir");
    let mut cfg = fast_config(td.path());
    cfg.auto_rename_on_open = false;
    std::fs::create_dir_all(&cfg.temp_dir).expect("mkdir");
    let existing = cfg.temp_dir.join("report.txt");
    std::fs::write(&existing, "someone else's").expect("write existing");
    extedit::util::fs::set_readonly(&existing).expect("set readonly");

    let field = Arc::new(MemoryField::text("mine"));
    let dialogs = ScriptedDialogs::new();
    dialogs.answer(Answer::Abort);
    let launcher = FakeLauncher::new(LaunchMode::NoProcess);
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(cfg.clone())
        .launcher(launcher.clone())
        .name_hint(Arc::new(StaticHint::new("report")))
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build();

    let err = session.open().expect_err("open must be cancelled");
    assert!(matches!(err, EditError::Cancelled), "unexpected error: {err}");
    assert_eq!(dialogs.confirm_kinds(), vec![ConfirmKind::AbortRetryIgnore]);
    assert_eq!(files_in(&cfg.temp_dir), vec![existing.clone()]);
    assert_eq!(
        std::fs::read_to_string(&existing).expect("read"),
        "someone else's"
    );
    assert!(launcher.launched().is_empty());
    assert_eq!(session.state(), SessionPhase::Idle);
    assert!(!session.file_opened());

    extedit::util::fs::clear_readonly(&existing).expect("clear readonly");
}

#[test]
fn test_oversized_edit_after_exit_keeps_file_for_decision() {
    let td = tempfile::tempdir().expect("tmpdir");
    let field = Arc::new(MemoryField::text("v"));
    let dialogs = ScriptedDialogs::new();
    let exited = Arc::new(AtomicBool::new(false));
    let mut cfg = fast_config(td.path());
    cfg.maximum_content_length = 4;
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(cfg)
        .launcher(FakeLauncher::new(LaunchMode::Live(exited.clone())))
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build();

    let path = session.open().expect("open");
    assert!(wait_for(|| session.state() == SessionPhase::AttachedToProcess));
    std::fs::write(&path, "far too long for the field").expect("grow");
    exited.store(true, Ordering::SeqCst);

    assert_eq!(session.wait_settled(SETTLE), SessionPhase::AwaitingUserInput);
    assert!(session.user_input_required());
    assert!(!session.file_processed());
    assert!(path.exists(), "edited file must survive a failed save");
    assert_eq!(field.write_count(), 0);
    assert_eq!(field.snapshot(), Some(Blob::Text("v".into())));
    assert!(wait_for(|| dialogs.has_notice(NoticeKind::Error)));
    assert!(!dialogs.notice_kinds().contains(&NoticeKind::Finished));

    // Accepting retries the save and fails the same way
    match session.accept() {
        Err(EditError::ContentTooLarge { maximum, .. }) => assert_eq!(maximum, 4),
        other => panic!("expected ContentTooLarge, got {other:?}"),
    }
    assert_eq!(session.state(), SessionPhase::AwaitingUserInput);
    assert!(path.exists());

    assert!(session.close_file());
    assert_eq!(session.state(), SessionPhase::Cleaned);
    assert!(!path.exists());
    assert_eq!(field.snapshot(), Some(Blob::Text("v".into())));
}

fn assert_monitor_fault_degrades(mode: LaunchMode) {
    let td = tempfile::tempdir().expect("tmpdir");
    let field = Arc::new(MemoryField::text("v"));
    let dialogs = ScriptedDialogs::new();
    let session = SessionCoordinator::builder(field.clone(), dialogs.clone())
        .config(fast_config(td.path()))
        .launcher(FakeLauncher::new(mode))
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build();

    let path = session.open().expect("open");
    assert_eq!(session.wait_settled(SETTLE), SessionPhase::AwaitingUserInput);
    assert!(session.user_input_required());
    assert!(path.exists());
    assert!(wait_for(|| dialogs
        .notices()
        .iter()
        .any(|(k, m)| *k == NoticeKind::Error && m.contains("Lost track"))));

    assert!(session.close_file());
    assert_eq!(session.state(), SessionPhase::Cleaned);
    assert!(!path.exists());
    assert_eq!(field.write_count(), 0);
}

#[test]
fn test_failing_exit_wait_falls_back_to_user_decision() {
    assert_monitor_fault_degrades(LaunchMode::WaitFails);
}

#[test]
fn test_panicking_status_check_falls_back_to_user_decision() {
    assert_monitor_fault_degrades(LaunchMode::PollPanics);
}
