//! Deferred calls from the scripting domain to the simulation domain.
//!
//! Scripts never touch world state directly. They package the call as a
//! [`Deferred`] task and hand it to a [`FutureSubmitter`]; the simulation
//! side drains the [`FutureQueue`] once per tick and runs each task there.
//! A task is consumed by value, so it runs at most once, and its
//! [`FutureHandle`] flips to done right after it returns. A task dropped
//! without running (the queue closed under it) flips its handle to
//! abandoned instead, so waiters always wake.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::error::FutureError;
use crate::subsystem::HookSubsystem;

/// A call captured on the scripting side, executed on the simulation side.
pub trait Deferred: Send + 'static {
    /// Short name of the operation, for logs.
    fn name(&self) -> &'static str;

    /// Perform the operation. Runs on the simulation domain.
    fn execute(self: Box<Self>, subsystem: &HookSubsystem);
}

#[derive(Debug, Default)]
struct FutureState {
    done: AtomicBool,
    abandoned: AtomicBool,
    notify: Notify,
}

impl FutureState {
    fn complete(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn abandon(&self) {
        self.abandoned.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// Scripting-side view of a submitted task.
#[derive(Debug, Clone)]
pub struct FutureHandle {
    task: &'static str,
    state: Arc<FutureState>,
}

impl FutureHandle {
    /// Name of the task behind this handle.
    pub const fn task(&self) -> &'static str {
        self.task
    }

    /// Whether the task has executed.
    pub fn is_done(&self) -> bool {
        self.state.done.load(Ordering::Acquire)
    }

    /// Whether the task was dropped without running.
    pub fn is_abandoned(&self) -> bool {
        self.state.abandoned.load(Ordering::Acquire)
    }

    /// Wait until the task has executed.
    ///
    /// # Errors
    ///
    /// Returns [`FutureError::Dropped`] if the session shut down before
    /// the task ran.
    pub async fn wait(&self) -> Result<(), FutureError> {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_done() {
                return Ok(());
            }
            if self.is_abandoned() {
                return Err(FutureError::Dropped { task: self.task });
            }
            notified.await;
        }
    }
}

struct Submitted {
    task: Option<Box<dyn Deferred>>,
    state: Arc<FutureState>,
}

impl Drop for Submitted {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.state.abandon();
        }
    }
}

/// Scripting-side entry point of the future queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FutureSubmitter {
    sender: UnboundedSender<Submitted>,
}

impl core::fmt::Debug for Submitted {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Submitted")
            .field("task", &self.task.as_ref().map(|task| task.name()))
            .finish_non_exhaustive()
    }
}

impl FutureSubmitter {
    /// Queue `task` for the next simulation tick.
    ///
    /// # Errors
    ///
    /// Returns [`FutureError::QueueClosed`] if the simulation side has shut
    /// down; the task is dropped without running.
    pub fn submit(&self, task: impl Deferred) -> Result<FutureHandle, FutureError> {
        self.submit_boxed(Box::new(task))
    }

    /// Queue an already boxed task.
    ///
    /// # Errors
    ///
    /// Returns [`FutureError::QueueClosed`] if the simulation side has shut
    /// down.
    pub fn submit_boxed(&self, task: Box<dyn Deferred>) -> Result<FutureHandle, FutureError> {
        let name = task.name();
        let state = Arc::new(FutureState::default());
        let submitted = Submitted {
            task: Some(task),
            state: Arc::clone(&state),
        };
        if self.sender.send(submitted).is_err() {
            return Err(FutureError::QueueClosed { task: name });
        }
        Ok(FutureHandle { task: name, state })
    }
}

/// Simulation-side end of the future queue.
#[derive(Debug)]
pub struct FutureQueue {
    receiver: UnboundedReceiver<Submitted>,
}

impl FutureQueue {
    /// Create a connected submitter and queue.
    pub fn new() -> (FutureSubmitter, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (FutureSubmitter { sender }, Self { receiver })
    }

    /// Execute every task submitted so far, in submission order.
    ///
    /// Returns how many tasks ran. Tasks submitted while draining wait for
    /// the next call.
    pub fn drain(&mut self, subsystem: &HookSubsystem) -> usize {
        let pending = self.receiver.len();
        let mut executed: usize = 0;
        while executed < pending {
            let Ok(mut submitted) = self.receiver.try_recv() else {
                break;
            };
            executed = executed.saturating_add(1);
            let Some(task) = submitted.task.take() else {
                continue;
            };
            let name = task.name();
            task.execute(subsystem);
            submitted.state.complete();
            debug!(task = name, "Future executed");
        }
        executed
    }

    /// Refuse further submissions and drop every task still queued.
    ///
    /// Waiters on the dropped tasks wake with [`FutureError::Dropped`].
    /// Returns how many tasks were dropped.
    pub fn close(&mut self) -> usize {
        self.receiver.close();
        let mut dropped: usize = 0;
        while let Ok(submitted) = self.receiver.try_recv() {
            if let Some(task) = &submitted.task {
                warn!(task = task.name(), "Future dropped before it ran");
            }
            dropped = dropped.saturating_add(1);
        }
        dropped
    }
}
