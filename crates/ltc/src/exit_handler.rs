//! Process-wide exit coordination.
//!
//! Components that touch global terminal state (cursor visibility, TTY
//! echo) or own background streams register a cleanup callback here.
//! Whether the process ends through [`ExitHandler::exit`] or through an
//! interrupt, every callback runs exactly once, in registration order,
//! before the process terminates.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ExitStatus;

type Callback = Box<dyn FnOnce() + Send>;
type Exiter = Arc<dyn Fn(i32) + Send + Sync>;

/// Runs registered cleanup callbacks before terminating the process.
#[derive(Clone)]
pub struct ExitHandler {
    callbacks: Arc<Mutex<Vec<Callback>>>,
    exiter: Exiter,
    shutdown: CancellationToken,
}

impl fmt::Debug for ExitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitHandler")
            .field("pending_callbacks", &self.callbacks.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for ExitHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitHandler {
    /// Creates a handler that terminates via [`std::process::exit`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_exiter(|code| std::process::exit(code))
    }

    /// Creates a handler with a custom termination function.
    ///
    /// Tests use this to observe the exit code without ending the process.
    #[must_use]
    pub fn with_exiter(exiter: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(Vec::new())),
            exiter: Arc::new(exiter),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled as soon as an exit starts.
    ///
    /// Polling loops select on it so they stop before the callbacks run.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Registers a callback to run on exit.
    pub fn on_exit(&self, callback: impl FnOnce() + Send + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Runs all pending callbacks, then terminates with `code`.
    ///
    /// Callbacks are drained before they run, so a second call (for
    /// example an interrupt racing a normal exit) never repeats them.
    pub fn exit(&self, code: i32) {
        self.shutdown.cancel();
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        debug!(code, callbacks = callbacks.len(), "running exit callbacks");
        for callback in callbacks {
            callback();
        }
        (self.exiter)(code);
    }

    /// Exits with the code of `status`.
    pub fn exit_with(&self, status: ExitStatus) {
        self.exit(status.code());
    }

    /// Spawns the interrupt listener.
    ///
    /// On Ctrl-C the handler exits with [`ExitStatus::SigInt`].
    pub fn listen_for_interrupt(&self) -> JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received");
                handler.exit_with(ExitStatus::SigInt);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn recording_handler() -> (ExitHandler, Arc<Mutex<Vec<i32>>>) {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&codes);
        let handler = ExitHandler::with_exiter(move |code| sink.lock().push(code));
        (handler, codes)
    }

    #[test]
    fn runs_callbacks_in_registration_order() {
        let (handler, codes) = recording_handler();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            handler.on_exit(move || order.lock().push(i));
        }

        handler.exit(0);

        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(*codes.lock(), vec![0]);
    }

    #[test]
    fn callbacks_run_only_once() {
        let (handler, codes) = recording_handler();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        handler.on_exit(move || *counter.lock() += 1);

        handler.exit_with(ExitStatus::SigInt);
        handler.exit_with(ExitStatus::CommandFailed);

        assert_eq!(*calls.lock(), 1);
        assert_eq!(*codes.lock(), vec![130, 14]);
    }

    #[test]
    fn clones_share_callbacks() {
        let (handler, _codes) = recording_handler();
        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);
        handler.clone().on_exit(move || *flag.lock() = true);

        handler.exit(0);

        assert!(*fired.lock());
    }

    #[test]
    fn exit_cancels_shutdown_token() {
        let (handler, _codes) = recording_handler();
        let token = handler.shutdown_token();
        assert!(!token.is_cancelled());

        handler.exit_with(ExitStatus::SigInt);

        assert!(token.is_cancelled());
    }

    proptest! {
        #[test]
        fn every_callback_runs_exactly_once_in_order(count in 0usize..32) {
            let (handler, _codes) = recording_handler();
            let order = Arc::new(Mutex::new(Vec::new()));
            for i in 0..count {
                let order = Arc::clone(&order);
                handler.on_exit(move || order.lock().push(i));
            }

            handler.exit(0);
            handler.exit(0);

            let expected: Vec<usize> = (0..count).collect();
            prop_assert_eq!(&*order.lock(), &expected);
        }
    }
}
