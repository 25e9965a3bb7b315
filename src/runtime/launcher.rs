//! Launchers that start execution-unit threads.

use std::thread;

use crate::config::WorkerPoolConfig;
use crate::core::{SpawnError, UnitId};

/// Body of an execution unit, run to completion on its own thread.
pub type UnitBody = Box<dyn FnOnce() + Send + 'static>;

/// Abstraction for starting the concurrent context behind a unit.
///
/// The pool observes unit exit through the body itself, so a launcher only
/// has to start it and report whether that worked.
pub trait Launch: Send + Sync + 'static {
    /// Start `body` as unit `unit`.
    ///
    /// Called with the pool's coordinator lock held. `body` must run on
    /// another execution context and `launch` must return without waiting
    /// for it: the body blocks on its command channel until the pool sends
    /// work, which needs that same lock.
    ///
    /// # Errors
    ///
    /// Returns a `SpawnError` if the context could not be started. The body
    /// is dropped without running in that case.
    fn launch(&self, unit: UnitId, body: UnitBody) -> Result<(), SpawnError>;
}

/// Launcher that gives each unit a dedicated, named OS thread.
#[derive(Debug, Clone)]
pub struct ThreadLauncher {
    name_prefix: String,
    stack_size: usize,
}

impl ThreadLauncher {
    /// Create a launcher with an explicit name prefix and stack size.
    pub fn new(name_prefix: impl Into<String>, stack_size: usize) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            stack_size,
        }
    }

    /// Create a launcher from pool configuration.
    #[must_use]
    pub fn from_config(config: &WorkerPoolConfig) -> Self {
        Self::new(config.thread_name_prefix.clone(), config.thread_stack_size)
    }
}

impl Launch for ThreadLauncher {
    fn launch(&self, unit: UnitId, body: UnitBody) -> Result<(), SpawnError> {
        // The join handle is dropped; exit is reported by the body.
        thread::Builder::new()
            .name(format!("{}-{unit}", self.name_prefix))
            .stack_size(self.stack_size)
            .spawn(body)
            .map(drop)
            .map_err(SpawnError::Launch)
    }
}
