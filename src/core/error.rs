//! Error types for pool operations.

use thiserror::Error;

use super::UnitId;

/// Errors produced while creating an execution unit.
///
/// A spawn error is fatal to the spawn attempt only. The pool keeps the
/// affected task queued and tries again on the next dispatch opportunity.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The unit's private runtime could not be built.
    #[error("failed to build unit runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The OS refused to start the unit thread.
    #[error("failed to launch unit thread: {0}")]
    Launch(#[source] std::io::Error),
    /// The launcher declined to start the unit.
    #[error("launcher refused unit: {0}")]
    Refused(String),
}

/// A logical failure reported by the entry point for one specific task.
///
/// Carries only a description; the pool never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TaskFailure {
    message: String,
}

impl TaskFailure {
    /// Create a failure with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for TaskFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TaskFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for TaskFailure {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
        }
    }
}

/// Errors surfaced to callers of a `WorkerPool`.
#[derive(Debug, Error)]
pub enum PoolError {
    /// An execution unit could not be created.
    #[error("execution unit could not be spawned: {0}")]
    Spawn(#[from] SpawnError),
    /// The entry point reported a failure for this task.
    #[error("task failed: {0}")]
    TaskFailed(#[from] TaskFailure),
    /// The unit running this task terminated abnormally.
    #[error("execution unit {unit} crashed: {reason}")]
    UnitCrash {
        /// Unit that crashed.
        unit: UnitId,
        /// Panic message or exit description.
        reason: String,
    },
    /// The pool was shut down before the task completed.
    #[error("pool has been shut down")]
    PoolShutdown,
    /// A caller-side wait gave up before the task resolved.
    #[error("operation timed out")]
    Timeout,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PoolError {
    /// Whether the caller may reasonably resubmit the work.
    ///
    /// `PoolShutdown` and `InvalidConfig` mean the pool is unavailable;
    /// everything else is transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Spawn(_) | Self::TaskFailed(_) | Self::UnitCrash { .. } | Self::Timeout
        )
    }
}
