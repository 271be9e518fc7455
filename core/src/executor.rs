//! Execution contexts for callback delivery.
//!
//! An [`Executor`] accepts a task and runs it somewhere: inline, on a fresh
//! thread, or on a foreground loop the host drains itself. A [`Platform`]
//! picks the default one when the client is not configured with an
//! explicit callback executor.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{error, trace, warn};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs every task on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Runs every task on a new named thread. If the thread cannot be started
/// the task runs on the calling thread instead.
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    name: String,
}

impl ThreadExecutor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new("courier-callback")
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let pending = Arc::new(Mutex::new(Some(task)));
        let handed_off = pending.clone();
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            let task = handed_off.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(task) = task {
                task();
            }
        });
        if let Err(e) = spawned {
            error!("could not start callback thread {}, running inline: {e}", self.name);
            let task = pending.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(task) = task {
                task();
            }
        }
    }
}

/// Queues tasks for the thread that owns the matching [`Looper`].
///
/// Once the `Looper` is dropped nothing drains the queue, so tasks run on
/// the posting thread instead.
#[derive(Debug, Clone)]
pub struct LoopExecutor {
    sender: Sender<Task>,
}

impl Executor for LoopExecutor {
    fn execute(&self, task: Task) {
        trace!("posting task to loop");
        if let Err(SendError(task)) = self.sender.send(task) {
            warn!("loop is gone, running task on the posting thread");
            task();
        }
    }
}

/// The receiving side of a foreground loop.
///
/// Tasks run only when the owning thread calls [`run_pending`](Self::run_pending)
/// or [`run_one`](Self::run_one), which is what makes delivery
/// foreground-affine.
#[derive(Debug)]
pub struct Looper {
    receiver: Receiver<Task>,
}

impl Looper {
    /// Create a loop and the executor that feeds it.
    pub fn new() -> (Looper, LoopExecutor) {
        let (sender, receiver) = mpsc::channel();
        (Looper { receiver }, LoopExecutor { sender })
    }

    /// Run every task already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Host environment strategy.
pub trait Platform: Send + Sync {
    /// Where callbacks go when the client has no explicit executor. `None`
    /// delivers on the thread that completed the call.
    fn default_callback_executor(&self) -> Option<Arc<dyn Executor>> {
        None
    }
}

/// A platform without a foreground context.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainPlatform;

impl Platform for PlainPlatform {}

/// A platform whose callbacks belong on a foreground loop.
#[derive(Clone)]
pub struct ForegroundPlatform {
    executor: Arc<dyn Executor>,
}

impl ForegroundPlatform {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl Platform for ForegroundPlatform {
    fn default_callback_executor(&self) -> Option<Arc<dyn Executor>> {
        Some(self.executor.clone())
    }
}
