//! Serialized execution for resolver state.
//!
//! Every state mutation in this crate runs as a job on a [`SyncContext`]:
//! a queue drained by a single task, so jobs run strictly in submission
//! order and never overlap. The scheduled executor (a tokio runtime handle)
//! is used only to run ticker loops and DNS lookups that hand their results
//! back into the context.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// An executor that serializes everything submitted to it.
///
/// Clones share the same queue. The drain task lives on the runtime the
/// context was created on and exits when every clone is dropped.
#[derive(Clone)]
pub struct SyncContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl SyncContext {
    pub fn new(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self { tx }
    }

    /// Enqueues a job. Jobs run in submission order, one at a time.
    ///
    /// Jobs must not block; anything that waits gets spawned on the runtime
    /// and re-enters the context on completion.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        // send only fails when the runtime is tearing down
        let _ = self.tx.send(Box::new(job));
    }

    /// Runs `task` inside the context after `initial_delay`, then repeatedly
    /// with `delay` between the *completion* of one run and the start of the
    /// next (fixed delay, not fixed rate).
    pub fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        delay: Duration,
        handle: &Handle,
        task: impl Fn() + Send + Sync + 'static,
    ) -> ScheduledHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let ctx = self.clone();
        let task = Arc::new(task);

        handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(initial_delay) => {}
                _ = cancel_rx.changed() => return,
            }
            loop {
                let (done_tx, done_rx) = oneshot::channel();
                let tick = task.clone();
                ctx.execute(move || {
                    tick();
                    let _ = done_tx.send(());
                });
                tokio::select! {
                    ack = done_rx => {
                        if ack.is_err() {
                            // context drained away; nothing left to tick
                            return;
                        }
                    }
                    _ = cancel_rx.changed() => return,
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel_rx.changed() => return,
                }
            }
        });

        ScheduledHandle { cancel: cancel_tx }
    }
}

/// Handle to a recurring task started by
/// [`SyncContext::schedule_with_fixed_delay`].
///
/// Cancelling (or dropping the handle) stops the ticker loop. A tick that
/// was already queued at cancel time may still run once; callers gate their
/// tick bodies on their own lifecycle state.
pub struct ScheduledHandle {
    cancel: watch::Sender<bool>,
}

impl ScheduledHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}
