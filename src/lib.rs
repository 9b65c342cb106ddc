//! extedit: round-trip a field value through the OS default application.
//!
//! Architecture
//! - session.rs: `SessionCoordinator`, the public Open/Load/Save/Close/Recover contract and
//!   the single mutex every writer goes through.
//! - poller.rs: background completion detection (decision table, exit watcher).
//! - naming.rs, transfer.rs, launcher.rs, lock.rs: the leaf components.
//! - field.rs, dialog.rs, ui/*: collaborator boundaries supplied by the host.
//! - config.rs, color.rs, telemetry.rs, errors.rs: ambient configuration, logging, errors.
//!
//! Environment
//! - EXTEDIT_CONFIG, EXTEDIT_MAX_CONTENT_LENGTH, EXTEDIT_POLL_INTERVAL_MS,
//!   EXTEDIT_WAIT_FOR_PROCESS_MS, EXTEDIT_AUTO_RENAME, EXTEDIT_TEMP_DIR, EXTEDIT_OPENER:
//!   configuration overrides (see config.rs).
//! - EXTEDIT_COLOR / NO_COLOR: stderr color control.
//! - EXTEDIT_NON_INTERACTIVE=1: terminal dialogs answer conservatively without prompting.
//! - EXTEDIT_TRACING_FMT=1 / RUST_LOG: structured tracing (feature `telemetry`).

mod color;
pub mod config;
pub mod dialog;
mod errors;
pub mod field;
pub mod launcher;
pub mod lock;
pub mod naming;
pub mod poller;
pub mod session;
pub mod sweep;
pub mod telemetry;
pub mod transfer;
pub mod ui;
pub mod util;

pub use color::*;
pub use config::EditConfig;
pub use dialog::{Answer, ConfirmKind, DialogGateway, NoticeKind, TerminalDialogs};
pub use errors::*;
pub use field::{Blob, Field, FieldKind, FileField, Hint, MemoryField, StaticHint};
pub use launcher::{ChildProcess, ProcessHandle, ProcessLauncher, ProcessRef, SystemLauncher};
pub use lock::{hold_lock, probe_lock, HeldLock, LockState};
pub use naming::NamingResolver;
pub use poller::{decide, PollAction, PollObservation};
pub use session::{CoordinatorBuilder, SessionCoordinator, SessionPhase, SessionSnapshot};
pub use sweep::{sweep_stale_files, SweepReport};
pub use telemetry::{telemetry_init, TelemetryGuard};
pub use transfer::ContentTransfer;
pub use ui::{DefaultText, InlineDispatcher, Localizer, UiDispatcher};
