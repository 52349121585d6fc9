//! The cooperative work-loop scheduler (spec §4.6): one iteration at a
//! time, woken by an external notification or retried with back-off on
//! failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Whatever drives one tick of work. `SyncLoop` is the only
/// implementation in this crate, but the driver itself doesn't know
/// that -- any cooperative, retryable async loop fits this contract.
#[async_trait]
pub trait Worker: Send {
    type Error: std::fmt::Debug + Send;

    async fn work(&mut self) -> Result<(), Self::Error>;

    /// Invoked exactly once, after `is_done()` first returns `true` or
    /// when the driver is torn down externally.
    fn destroy(&mut self);

    fn is_done(&self) -> bool;

    /// Must not panic or propagate; errors that escape `work()` always
    /// land here, never anywhere else.
    fn on_error(&mut self, error: Self::Error);

    fn retry_delay(&self, attempt: u32) -> Duration;
}

/// Wakes a [`WorkLoop`]'s driver. Cheap to clone and hand to anything
/// that needs to prod the loop: editor-state-changed callbacks, the
/// content client's `active` event, stream-close handlers, and
/// in-flight async call completions (spec §4.5 driver).
#[derive(Clone)]
pub struct Notifier(Arc<Notify>);

impl Notifier {
    pub fn notify(&self) {
        self.0.notify_one();
    }
}

pub struct WorkLoop<W: Worker> {
    worker: W,
    notify: Arc<Notify>,
}

impl<W: Worker> WorkLoop<W> {
    /// Builds the worker via `make_worker`, handing it a [`Notifier`]
    /// it (or callbacks it registers) can use to wake the driver.
    pub fn new(make_worker: impl FnOnce(Notifier) -> W) -> Self {
        let notify = Arc::new(Notify::new());
        let worker = make_worker(Notifier(notify.clone()));
        Self { worker, notify }
    }

    pub fn notifier(&self) -> Notifier {
        Notifier(self.notify.clone())
    }

    /// Runs until the worker reports done, destroying it exactly once
    /// on the way out. Never returns early on error: errors go to
    /// `on_error` and the loop retries with back-off.
    pub async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            match self.worker.work().await {
                Ok(()) => {
                    attempt = 0;
                    if self.worker.is_done() {
                        break;
                    }
                    self.notify.notified().await;
                }
                Err(error) => {
                    debug!(?attempt, "work-loop iteration failed, will retry");
                    self.worker.on_error(error);
                    if self.worker.is_done() {
                        break;
                    }
                    let delay = self.worker.retry_delay(attempt);
                    attempt = attempt.saturating_add(1);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.notify.notified() => {
                            debug!("woken during back-off, retrying immediately");
                        }
                    }
                }
            }
        }
        self.worker.destroy();
    }

    /// Runs a single iteration without the notify/back-off wrapper;
    /// useful for tests that want to drive the loop by hand.
    pub async fn tick_once(&mut self) -> Result<(), W::Error> {
        self.worker.work().await
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    pub fn worker_mut(&mut self) -> &mut W {
        &mut self.worker
    }
}

impl<W: Worker> Drop for WorkLoop<W> {
    fn drop(&mut self) {
        if !self.worker.is_done() {
            warn!("work loop dropped without reaching completion; destroying worker now");
        }
    }
}
