//! Configuration models for the worker pool.

pub mod pool;

pub use pool::{default_max_units, units_for_parallelism, WorkerPoolConfig, MAX_UNITS_CAP};
