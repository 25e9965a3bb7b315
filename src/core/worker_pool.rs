//! Bounded worker pool that runs CPU-bound tasks on dedicated execution units.
//!
//! The pool keeps CPU-heavy work (image validation, dominant-colour
//! extraction) off the request-handling runtime. It limits concurrent
//! execution to `max_units` units, queues excess tasks in strict FIFO
//! order, and guarantees every submitted task resolves exactly once.
//!
//! # Key Features
//!
//! - **Bounded**: at most `max_units` units exist, created lazily
//! - **FIFO**: tasks start in submission order as units free up
//! - **Crash isolation**: a panicking task retires only its own unit
//! - **Exactly-once resolution**: success, task failure, unit crash or shutdown
//!
//! # Example
//!
//! ```rust,ignore
//! use xivdye_worker_pool::config::WorkerPoolConfig;
//! use xivdye_worker_pool::core::WorkerPool;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_max_units(2), my_executor)?;
//!
//! let color = pool.execute(job).await?;
//! let handle = pool.submit(other_job)?;
//! let result = handle.with_timeout(Duration::from_secs(10)).await;
//!
//! pool.shutdown().await;
//! ```

mod coordinator;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::core::{PoolError, TaskId};

pub use coordinator::WorkerPool;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Live execution units.
    pub unit_count: usize,
    /// Units currently executing a task.
    pub active_count: usize,
    /// Tasks waiting for a unit.
    pub queued_count: usize,
    /// Configured unit cap.
    pub max_units: usize,
    /// Total tasks accepted.
    pub submitted_tasks: u64,
    /// Tasks that resolved with a result.
    pub completed_tasks: u64,
    /// Tasks that resolved with a `TaskFailure`.
    pub failed_tasks: u64,
    /// Tasks lost to a unit crash.
    pub crashed_tasks: u64,
    /// Tasks resolved with `PoolShutdown`.
    pub cancelled_tasks: u64,
    /// Unit spawn attempts that failed.
    pub spawn_failures: u64,
}

/// Cumulative pool counters (lock-free).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub crashed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub spawn_failures: AtomicU64,
}

impl PoolCounters {
    /// Combine the counters with a reading of the live coordinator state.
    pub fn snapshot(
        &self,
        unit_count: usize,
        active_count: usize,
        queued_count: usize,
        max_units: usize,
    ) -> PoolStats {
        PoolStats {
            unit_count,
            active_count,
            queued_count,
            max_units,
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            crashed_tasks: self.crashed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pending outcome of a submitted task.
///
/// Resolves exactly once. Dropping the handle does not cancel the task; it
/// still runs to completion inside the pool and its result is discarded.
#[derive(Debug)]
#[must_use = "a TaskHandle does nothing unless awaited"]
pub struct TaskHandle<R> {
    id: TaskId,
    rx: oneshot::Receiver<Result<R, PoolError>>,
}

impl<R> TaskHandle<R> {
    pub(crate) const fn new(id: TaskId, rx: oneshot::Receiver<Result<R, PoolError>>) -> Self {
        Self { id, rx }
    }

    /// Identifier the pool assigned to this task.
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Wait at most `timeout` for the outcome.
    ///
    /// On expiry this returns `PoolError::Timeout` while the task keeps
    /// running to completion inside the pool.
    ///
    /// # Errors
    ///
    /// Any error the task resolves with, or `PoolError::Timeout`.
    pub async fn with_timeout(self, timeout: Duration) -> Result<R, PoolError> {
        match tokio::time::timeout(timeout, self).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PoolError::Timeout),
        }
    }

    /// Block the current thread until the outcome is available.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// Any error the task resolves with.
    pub fn blocking_wait(self) -> Result<R, PoolError> {
        self.rx.blocking_recv().unwrap_or(Err(PoolError::PoolShutdown))
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, PoolError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped continuation means the pool itself went away.
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PoolError::PoolShutdown)))
    }
}
