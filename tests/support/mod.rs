/*!
Test support helpers shared across integration tests.

- ScriptedDialogs: queued answers/paths; records every confirm and notice
- FakeLauncher / FakeProcess: launch outcomes without starting real applications
- fast_config(dir): millisecond intervals and a private temp directory
- wait_for(cond): bounded polling for background state changes

Unscripted confirms answer with the kind's conservative fallback.
*/

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use extedit::{
    Answer, ConfirmKind, DialogGateway, EditConfig, EditError, NoticeKind, ProcessHandle,
    ProcessLauncher, ProcessRef,
};
use fs2::FileExt;

#[derive(Default)]
pub struct ScriptedDialogs {
    answers: Mutex<VecDeque<Answer>>,
    save_paths: Mutex<VecDeque<Option<PathBuf>>>,
    open_paths: Mutex<VecDeque<Option<PathBuf>>>,
    confirms: Mutex<Vec<(ConfirmKind, String)>>,
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

#[allow(dead_code)]
impl ScriptedDialogs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, a: Answer) {
        self.answers.lock().unwrap().push_back(a);
    }

    pub fn save_path(&self, p: Option<PathBuf>) {
        self.save_paths.lock().unwrap().push_back(p);
    }

    pub fn open_path(&self, p: Option<PathBuf>) {
        self.open_paths.lock().unwrap().push_back(p);
    }

    pub fn confirms(&self) -> Vec<(ConfirmKind, String)> {
        self.confirms.lock().unwrap().clone()
    }

    pub fn confirm_kinds(&self) -> Vec<ConfirmKind> {
        self.confirms().into_iter().map(|(k, _)| k).collect()
    }

    pub fn notice_kinds(&self) -> Vec<NoticeKind> {
        self.notices.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn has_notice(&self, kind: NoticeKind) -> bool {
        self.notices.lock().unwrap().iter().any(|(k, _)| *k == kind)
    }
}

impl DialogGateway for ScriptedDialogs {
    fn confirm(&self, kind: ConfirmKind, message: &str) -> Answer {
        self.confirms
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| kind.fallback())
    }

    fn prompt_open_path(&self) -> Option<PathBuf> {
        self.open_paths.lock().unwrap().pop_front().flatten()
    }

    fn prompt_save_path(&self, _ext: Option<&str>, _name: Option<&str>) -> Option<PathBuf> {
        self.save_paths.lock().unwrap().pop_front().flatten()
    }

    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }
}

#[derive(Clone, Copy)]
enum Fault {
    None,
    WaitFails,
    PollPanics,
}

/// Process whose exit is controlled by the test.
pub struct FakeProcess {
    exited: Arc<AtomicBool>,
    fault: Fault,
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn is_running(&mut self) -> io::Result<bool> {
        if let Fault::PollPanics = self.fault {
            panic!("process table unavailable");
        }
        Ok(!self.exited.load(Ordering::SeqCst))
    }

    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<bool> {
        match self.fault {
            Fault::WaitFails => {
                return Err(io::Error::new(io::ErrorKind::Other, "wait interrupted"))
            }
            Fault::PollPanics => panic!("process table unavailable"),
            Fault::None => {}
        }
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.exited.load(Ordering::SeqCst) {
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(self.exited.load(Ordering::SeqCst))
    }
}

#[allow(dead_code)]
pub enum LaunchMode {
    /// Opener handed the file off and returned.
    NoProcess,
    /// A live process; set the flag to make it exit.
    Live(Arc<AtomicBool>),
    /// A live process whose exit cannot be waited on.
    WaitFails,
    /// A live process whose status checks panic.
    PollPanics,
    Fail,
}

/// Launcher that never starts anything. With `hold_lock` set it locks the file during
/// launch, standing in for an application that keeps the document open.
pub struct FakeLauncher {
    mode: LaunchMode,
    hold_lock: bool,
    held: Mutex<Option<File>>,
    launched: Mutex<Vec<PathBuf>>,
}

#[allow(dead_code)]
impl FakeLauncher {
    pub fn new(mode: LaunchMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            hold_lock: false,
            held: Mutex::new(None),
            launched: Mutex::new(Vec::new()),
        })
    }

    pub fn locking(mode: LaunchMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            hold_lock: true,
            held: Mutex::new(None),
            launched: Mutex::new(Vec::new()),
        })
    }

    /// The "application" lets go of the file.
    pub fn release(&self) {
        self.held.lock().unwrap().take();
    }

    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, path: &Path) -> Result<Option<ProcessRef>, EditError> {
        self.launched.lock().unwrap().push(path.to_path_buf());
        if self.hold_lock {
            *self.held.lock().unwrap() = Some(hold_read_lock(path));
        }
        match &self.mode {
            LaunchMode::NoProcess => Ok(None),
            LaunchMode::Live(exited) => Ok(Some(Box::new(FakeProcess {
                exited: Arc::clone(exited),
                fault: Fault::None,
            }))),
            LaunchMode::WaitFails => Ok(Some(Box::new(FakeProcess {
                exited: Arc::new(AtomicBool::new(false)),
                fault: Fault::WaitFails,
            }))),
            LaunchMode::PollPanics => Ok(Some(Box::new(FakeProcess {
                exited: Arc::new(AtomicBool::new(false)),
                fault: Fault::PollPanics,
            }))),
            LaunchMode::Fail => Err(EditError::LaunchFailed("no handler registered".into())),
        }
    }
}

/// Exclusive lock through a read-only handle, so it also works on read-only temp files.
pub fn hold_read_lock(path: &Path) -> File {
    let f = File::open(path).expect("open for lock");
    f.try_lock_exclusive().expect("lock temp file");
    f
}

/// Short intervals and a private temp directory under `dir`.
#[allow(dead_code)]
pub fn fast_config(dir: &Path) -> EditConfig {
    EditConfig {
        poll_interval: Duration::from_millis(20),
        wait_for_process_interval: Duration::from_millis(60),
        temp_dir: dir.join("edit"),
        ..EditConfig::default()
    }
}

/// Poll `cond` until it holds or five seconds pass.
#[allow(dead_code)]
pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[allow(dead_code)]
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut v: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default();
    v.sort();
    v
}
