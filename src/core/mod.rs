//! Core pool abstractions: entry point, queue, execution units, coordinator.

pub mod cell;
pub mod error;
pub mod executor;
pub mod queue;
pub mod unit;
pub mod worker_pool;

pub use cell::PoolCell;
pub use error::{PoolError, SpawnError, TaskFailure};
pub use executor::{TaskContext, TaskId, UnitId, WorkerExecutor};
pub use queue::TaskQueue;
pub use unit::{UnitSnapshot, UnitState};
pub use worker_pool::{PoolStats, TaskHandle, WorkerPool};
