//! The task execution entry point run inside each execution unit.

use async_trait::async_trait;

use super::TaskFailure;

/// Identifier assigned to each submitted task, unique per pool.
pub type TaskId = u64;

/// Identifier of an execution unit, unique per pool and never reused.
pub type UnitId = u64;

/// Where a task is running. Passed to the entry point alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    /// The task being executed.
    pub task: TaskId,
    /// The unit executing it.
    pub unit: UnitId,
}

/// Entry point executed by every unit of a `WorkerPool`.
///
/// Each unit owns a clone of the executor and calls it from a dedicated OS
/// thread with its own single-threaded tokio runtime, so CPU-bound work here
/// never stalls the caller's runtime.
///
/// For every payload the executor produces exactly one outcome: `Ok(result)`,
/// `Err(TaskFailure)`, or a panic. A panic is treated as an abnormal unit
/// exit: the unit is retired and the task resolves with
/// `PoolError::UnitCrash`.
///
/// Neither payload nor result needs to be serializable; they only cross a
/// thread boundary.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use xivdye_worker_pool::core::{TaskContext, TaskFailure, WorkerExecutor};
///
/// #[derive(Clone)]
/// struct Checksum;
///
/// #[async_trait]
/// impl WorkerExecutor<Vec<u8>, u32> for Checksum {
///     async fn execute(&self, bytes: Vec<u8>, _ctx: TaskContext) -> Result<u32, TaskFailure> {
///         if bytes.is_empty() {
///             return Err("empty buffer".into());
///         }
///         Ok(bytes.iter().map(|b| u32::from(*b)).sum())
///     }
/// }
/// ```
#[async_trait]
pub trait WorkerExecutor<P, R>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Execute one task payload.
    async fn execute(&self, payload: P, ctx: TaskContext) -> Result<R, TaskFailure>;
}
