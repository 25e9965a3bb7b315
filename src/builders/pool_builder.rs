//! Builder to construct a `WorkerPool` from configuration.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::WorkerPoolConfig;
use crate::core::{PoolError, WorkerExecutor, WorkerPool};
use crate::runtime::{Launch, ThreadLauncher};

/// Step-by-step construction of a `WorkerPool`.
///
/// ```rust,ignore
/// let pool: WorkerPool<ImageJob, ImageJobResult, _> = WorkerPool::builder(ImageJobExecutor)
///     .config(WorkerPoolConfig::from_env()?)
///     .max_units(2)
///     .build()?;
/// ```
pub struct WorkerPoolBuilder<P, R, E> {
    executor: E,
    config: WorkerPoolConfig,
    launcher: Option<Arc<dyn Launch>>,
    _types: PhantomData<fn(P) -> R>,
}

impl<P, R, E> WorkerPoolBuilder<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    /// Start a builder with default configuration.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            config: WorkerPoolConfig::default(),
            launcher: None,
            _types: PhantomData,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: WorkerPoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the unit cap.
    #[must_use]
    pub fn max_units(mut self, max_units: usize) -> Self {
        self.config.max_units = max_units;
        self
    }

    /// Start units through a custom launcher instead of plain OS threads.
    #[must_use]
    pub fn launcher(mut self, launcher: impl Launch) -> Self {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Validate the configuration and build the pool.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn build(self) -> Result<WorkerPool<P, R, E>, PoolError> {
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(ThreadLauncher::from_config(&self.config)));
        WorkerPool::with_launcher(self.config, self.executor, launcher)
    }
}

impl<P, R, E> WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    /// Start building a pool around `executor`.
    pub fn builder(executor: E) -> WorkerPoolBuilder<P, R, E> {
        WorkerPoolBuilder::new(executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TaskContext, TaskFailure};
    use async_trait::async_trait;

    #[derive(Clone)]
    struct Echo;

    #[async_trait]
    impl WorkerExecutor<u8, u8> for Echo {
        async fn execute(&self, payload: u8, _ctx: TaskContext) -> Result<u8, TaskFailure> {
            Ok(payload)
        }
    }

    #[test]
    fn test_builder_overrides_max_units() {
        let pool: WorkerPool<u8, u8, _> = WorkerPool::builder(Echo).max_units(3).build().unwrap();
        assert_eq!(pool.config().max_units, 3);
        assert_eq!(pool.stats().max_units, 3);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result: Result<WorkerPool<u8, u8, _>, _> = WorkerPool::builder(Echo).max_units(0).build();
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }
}
