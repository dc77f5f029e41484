//! # Execution Contexts
//!
//! Where callback delivery runs. An executor promises nothing about ordering
//! relative to other executors; `SerialExecutor` additionally runs its own
//! jobs in submission order.

use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs later, possibly on a specific thread or task.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

impl<F> Executor for F
where
    F: Fn(Job) + Send + Sync + 'static,
{
    fn execute(&self, job: Job) {
        self(job)
    }
}

/// Spawns one tokio task per job. Jobs may run concurrently and out of order.
#[derive(Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }
}

/// Runs jobs one at a time, first in first out, on a single tokio task.
#[derive(Clone)]
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialExecutor {
    /// Spawns the draining task on `handle`.
    ///
    /// The task ends once every clone of the executor is dropped.
    pub fn spawn(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self { tx }
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("serial executor has stopped, dropping job");
        }
    }
}
