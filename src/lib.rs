//! # XIV Dye Worker Pool
//!
//! A bounded pool of execution units for offloading CPU-bound image work
//! from the chat bot's async runtime.
//!
//! The bot validates uploads and extracts dominant colors on behalf of many
//! concurrent users. Doing that on the main runtime stalls every other
//! interaction, so the work is handed to a small, lazily grown set of
//! dedicated units.
//!
//! ## Key Features
//!
//! - **Bounded Concurrency**: At most `max_units` units ever exist; extra work waits in FIFO order
//! - **Lazy Growth**: Units are started only when work arrives and none is idle
//! - **Crash Isolation**: A panicking unit fails only its own task and is replaced on demand
//! - **Exactly-Once Completion**: Every submission resolves once, including at shutdown
//! - **Graceful Shutdown**: Queued and in-flight work is failed and units are awaited with a grace period
//!
//! ## WorkerPool
//!
//! ```rust,ignore
//! use xivdye_worker_pool::config::WorkerPoolConfig;
//! use xivdye_worker_pool::core::WorkerPool;
//! use xivdye_worker_pool::jobs::{ImageJob, ImageJobExecutor, ImagePolicy};
//!
//! let pool: WorkerPool<_, _, _> = WorkerPool::new(WorkerPoolConfig::from_env()?, ImageJobExecutor)?;
//!
//! let info = pool
//!     .execute(ImageJob::Validate { bytes, policy: ImagePolicy::default() })
//!     .await?;
//!
//! pool.shutdown().await;
//! ```
//!
//! For complete examples, see `tests/worker_pool_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pool abstractions: coordinator, execution units, errors.
pub mod core;
/// Configuration models for the pool.
pub mod config;
/// Builders to construct pools from configuration.
pub mod builders;
/// Image jobs run on the pool.
pub mod jobs;
/// Unit launchers.
pub mod runtime;
/// Shared utilities.
pub mod util;
