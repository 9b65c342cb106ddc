/// Marshals work onto the host's UI-affine thread.
///
/// Every prompt or notice raised from the poller or the process-exit watcher goes
/// through `run_on_ui_thread`; calls made on the owning thread invoke the gateway
/// directly. Implementations may run `f` synchronously or queue it.
pub trait UiDispatcher: Send + Sync {
    fn run_on_ui_thread(&self, f: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs the closure on the calling thread. Suitable for hosts without thread affinity
/// (the CLI, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn run_on_ui_thread(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        f()
    }
}
