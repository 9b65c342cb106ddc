mod support;

use std::sync::Arc;

use extedit::{
    Answer, ConfirmKind, EditError, MemoryField, SessionCoordinator, StaticHint,
};
use support::{fast_config, FakeLauncher, LaunchMode, ScriptedDialogs};

fn named_session(
    cfg: extedit::EditConfig,
    field: Arc<MemoryField>,
    dialogs: Arc<ScriptedDialogs>,
) -> SessionCoordinator {
    SessionCoordinator::builder(field, dialogs)
        .config(cfg)
        .launcher(FakeLauncher::new(LaunchMode::NoProcess))
        .name_hint(Arc::new(StaticHint::new("notes")))
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build()
}

#[test]
fn test_auto_rename_numbers_collisions_without_prompting() {
    let td = tempfile::tempdir().expect("tmpdir");
    let cfg = fast_config(td.path());
    std::fs::create_dir_all(&cfg.temp_dir).expect("mkdir");
    std::fs::write(cfg.temp_dir.join("notes.txt"), "a").expect("write");
    std::fs::write(cfg.temp_dir.join("notes(2).txt"), "b").expect("write");

    let dialogs = ScriptedDialogs::new();
    let session = named_session(cfg.clone(), Arc::new(MemoryField::text("c")), dialogs.clone());
    let path = session.open().expect("open");
    assert_eq!(path, cfg.temp_dir.join("notes(3).txt"));
    assert!(dialogs.confirms().is_empty());
    assert!(session.close_file());
    // Other files are untouched
    assert_eq!(std::fs::read_to_string(cfg.temp_dir.join("notes.txt")).expect("read"), "a");
}

#[test]
fn test_existing_file_with_same_content_is_reused() {
    let td = tempfile::tempdir().expect("tmpdir");
    let mut cfg = fast_config(td.path());
    cfg.auto_rename_on_open = false;
    std::fs::create_dir_all(&cfg.temp_dir).expect("mkdir");
    let existing = cfg.temp_dir.join("notes.txt");
    std::fs::write(&existing, "same").expect("write");

    let dialogs = ScriptedDialogs::new();
    let session = named_session(cfg, Arc::new(MemoryField::text("same")), dialogs.clone());
    assert_eq!(session.open().expect("open"), existing);
    assert!(dialogs.confirms().is_empty());
    assert!(session.close_file());
}

#[test]
fn test_changed_existing_file_overwrite_or_choose_other() {
    let td = tempfile::tempdir().expect("tmpdir");
    let mut cfg = fast_config(td.path());
    cfg.auto_rename_on_open = false;
    std::fs::create_dir_all(&cfg.temp_dir).expect("mkdir");
    let existing = cfg.temp_dir.join("notes.txt");

    // Yes: overwrite in place
    std::fs::write(&existing, "stale").expect("write");
    let dialogs = ScriptedDialogs::new();
    dialogs.answer(Answer::Yes);
    let session = named_session(cfg.clone(), Arc::new(MemoryField::text("fresh")), dialogs.clone());
    assert_eq!(session.open().expect("open"), existing);
    assert_eq!(std::fs::read_to_string(&existing).expect("read"), "fresh");
    assert_eq!(dialogs.confirm_kinds(), vec![ConfirmKind::YesNoCancel]);
    assert!(session.close_file());

    // No: the human picks another path
    std::fs::write(&existing, "stale").expect("write");
    let other = td.path().join("elsewhere.txt");
    let dialogs = ScriptedDialogs::new();
    dialogs.answer(Answer::No);
    dialogs.save_path(Some(other.clone()));
    let session = named_session(cfg.clone(), Arc::new(MemoryField::text("fresh")), dialogs);
    assert_eq!(session.open().expect("open"), other);
    assert_eq!(std::fs::read_to_string(&existing).expect("read"), "stale");
    assert!(session.close_file());

    // Cancel: nothing is opened
    let dialogs = ScriptedDialogs::new();
    dialogs.answer(Answer::Cancel);
    let session = named_session(cfg, Arc::new(MemoryField::text("fresh")), dialogs);
    assert!(matches!(session.open(), Err(EditError::Cancelled)));
    assert_eq!(std::fs::read_to_string(&existing).expect("read"), "stale");
}

#[test]
fn test_unwritable_existing_file_ignore_prompts_for_path() {
    let td = tempfile::tempdir().expect("tmpdir");
    let mut cfg = fast_config(td.path());
    cfg.auto_rename_on_open = false;
    std::fs::create_dir_all(&cfg.temp_dir).expect("mkdir");
    let existing = cfg.temp_dir.join("notes.txt");
    std::fs::write(&existing, "locked down").expect("write");
    extedit::util::fs::set_readonly(&existing).expect("set readonly");

    let other = td.path().join("alt.txt");
    let dialogs = ScriptedDialogs::new();
    dialogs.answer(Answer::Retry);
    dialogs.answer(Answer::Ignore);
    dialogs.save_path(Some(other.clone()));
    let session = named_session(cfg, Arc::new(MemoryField::text("mine")), dialogs.clone());
    assert_eq!(session.open().expect("open"), other);
    assert_eq!(
        dialogs.confirm_kinds(),
        vec![ConfirmKind::AbortRetryIgnore, ConfirmKind::AbortRetryIgnore]
    );
    assert_eq!(std::fs::read_to_string(&other).expect("read"), "mine");
    assert!(session.close_file());
    extedit::util::fs::clear_readonly(&existing).expect("clear readonly");
}

#[test]
fn test_generated_names_skip_existing_and_sanitize_hints() {
    let td = tempfile::tempdir().expect("tmpdir");
    let cfg = fast_config(td.path());
    std::fs::create_dir_all(&cfg.temp_dir).expect("mkdir");
    std::fs::write(cfg.temp_dir.join("content1.PNG"), [0u8]).expect("write");

    let session = SessionCoordinator::builder(Arc::new(MemoryField::binary(vec![1u8])), ScriptedDialogs::new())
        .config(cfg.clone())
        .launcher(FakeLauncher::new(LaunchMode::NoProcess))
        .extension_hint(Arc::new(StaticHint::new(" .PNG ")))
        .build();
    let path = session.open().expect("open");
    assert_eq!(path.parent(), Some(cfg.temp_dir.as_path()));
    assert_eq!(path.file_name().and_then(|s| s.to_str()), Some("content2.PNG"));
    assert!(session.close_file());

    let session = SessionCoordinator::builder(Arc::new(MemoryField::text("x")), ScriptedDialogs::new())
        .config(cfg.clone())
        .launcher(FakeLauncher::new(LaunchMode::NoProcess))
        .name_hint(Arc::new(StaticHint::new("../etc/passwd")))
        .extension_hint(Arc::new(StaticHint::new("txt")))
        .build();
    let path = session.open().expect("open");
    assert_eq!(path.parent(), Some(cfg.temp_dir.as_path()), "name hint must not escape");
    assert!(session.close_file());
}
