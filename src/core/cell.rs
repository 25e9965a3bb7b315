//! One-time initialization guard for a process-wide pool.
//!
//! The bot builds one pool at start-up and hands it to every command
//! handler. [`PoolCell`] makes that initialization explicit and idempotent
//! without resorting to a global: the owner creates the cell, calls
//! [`PoolCell::get_or_try_init`] during start-up, and passes the returned
//! `Arc` (or a reference to the cell) to whoever needs it.
//!
//! # Examples
//!
//! ```rust,ignore
//! use xivdye_worker_pool::core::{PoolCell, WorkerPool};
//!
//! let cell = PoolCell::new();
//! let pool = cell.get_or_try_init(|| WorkerPool::new(config, executor))?;
//!
//! // Re-initialization returns the existing pool; the closure is not run.
//! let same = cell.get_or_try_init(|| unreachable!())?;
//! assert!(Arc::ptr_eq(&pool, &same));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use super::{PoolError, WorkerExecutor, WorkerPool};

/// Holds at most one shared `WorkerPool`.
pub struct PoolCell<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    slot: Mutex<Option<Arc<WorkerPool<P, R, E>>>>,
}

impl<P, R, E> Default for PoolCell<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R, E> PoolCell<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the pool, building it with `init` if the cell is empty.
    ///
    /// Concurrent callers are serialized; `init` runs at most once per
    /// successful initialization.
    ///
    /// # Errors
    ///
    /// Propagates the error from `init`; the cell stays empty in that case.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<WorkerPool<P, R, E>>, PoolError>
    where
        F: FnOnce() -> Result<WorkerPool<P, R, E>, PoolError>,
    {
        let mut slot = self.slot.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(init()?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// The pool, if initialized.
    #[must_use]
    pub fn get(&self) -> Option<Arc<WorkerPool<P, R, E>>> {
        self.slot.lock().clone()
    }

    /// Empty the cell and return its pool, so it can be shut down and the
    /// cell re-initialized.
    pub fn take(&self) -> Option<Arc<WorkerPool<P, R, E>>> {
        self.slot.lock().take()
    }
}
