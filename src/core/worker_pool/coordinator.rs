//! Pool coordinator: owns the queue and the live units, and dispatches.
//!
//! All bookkeeping happens under one `parking_lot::Mutex`. Submissions
//! arrive from caller threads and completions from unit threads; the lock
//! serializes both. The dispatch step is an iterative loop that only does
//! non-blocking channel sends and thread launches, so it never re-enters
//! itself. Continuations settled inside a critical section are fired after
//! the lock is released.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerPoolConfig;
use crate::core::queue::TaskQueue;
use crate::core::unit::{ExecutionUnit, UnitEvents, UnitExit, UnitSnapshot};
use crate::core::{PoolError, SpawnError, TaskFailure, TaskId, UnitId, WorkerExecutor};
use crate::runtime::{Launch, ThreadLauncher};

use super::{PoolCounters, PoolStats, TaskHandle};

type Reply<R> = oneshot::Sender<Result<R, PoolError>>;

struct PendingTask<P, R> {
    id: TaskId,
    payload: P,
    reply: Reply<R>,
}

struct PoolState<P, R> {
    units: Vec<ExecutionUnit<P, Reply<R>>>,
    queue: TaskQueue<PendingTask<P, R>>,
    active: usize,
    next_unit: UnitId,
    shut_down: bool,
}

/// Continuations resolved under the lock, fired once it is released.
struct Settled<R>(Vec<(Reply<R>, Result<R, PoolError>)>);

impl<R> Settled<R> {
    const fn new() -> Self {
        Self(Vec::new())
    }

    fn push(&mut self, reply: Reply<R>, outcome: Result<R, PoolError>) {
        self.0.push((reply, outcome));
    }

    fn fire(self) {
        for (reply, outcome) in self.0 {
            // The caller may have dropped its handle.
            let _ = reply.send(outcome);
        }
    }
}

struct Coordinator<P, R, E> {
    pool_id: Uuid,
    max_units: usize,
    executor: E,
    launcher: Arc<dyn Launch>,
    me: Weak<Self>,
    state: Mutex<PoolState<P, R>>,
    counters: PoolCounters,
    shutdown: AtomicBool,
    next_task: AtomicU64,
}

impl<P, R, E> Coordinator<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn submit(&self, payload: P) -> Result<TaskHandle<R>, PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();

        let mut state = self.state.lock();
        if state.shut_down {
            return Err(PoolError::PoolShutdown);
        }
        state.queue.enqueue(PendingTask { id, payload, reply });
        PoolCounters::bump(&self.counters.submitted_tasks);
        debug!(task = id, queued = state.queue.len(), "task submitted");

        self.dispatch(&mut state);
        Ok(TaskHandle::new(id, rx))
    }

    /// Assign queued tasks to units until the queue is empty or no unit is
    /// obtainable.
    fn dispatch(&self, state: &mut PoolState<P, R>) {
        while !state.shut_down {
            let Some(task) = state.queue.dequeue_next() else {
                break;
            };

            let slot = if let Some(idx) = state.units.iter().position(ExecutionUnit::is_idle) {
                idx
            } else if state.units.len() < self.max_units {
                match self.spawn_unit(state) {
                    Ok(unit) => {
                        state.units.push(unit);
                        state.units.len() - 1
                    }
                    Err(err) => {
                        PoolCounters::bump(&self.counters.spawn_failures);
                        warn!(
                            pool = %self.pool_id,
                            task = task.id,
                            error = %err,
                            "failed to spawn execution unit; task stays at the head of the queue"
                        );
                        state.queue.requeue_front(task);
                        break;
                    }
                }
            } else {
                state.queue.requeue_front(task);
                break;
            };

            let PendingTask { id, payload, reply } = task;
            let unit_id = state.units[slot].id();
            match state.units[slot].dispatch(id, payload, reply) {
                Ok(()) => {
                    state.active += 1;
                    debug!(task = id, unit = unit_id, active = state.active, "task dispatched");
                }
                Err((payload, reply)) => {
                    state.units.remove(slot);
                    warn!(pool = %self.pool_id, unit = unit_id, "execution unit vanished before dispatch; retiring it");
                    state.queue.requeue_front(PendingTask { id, payload, reply });
                }
            }
        }

        debug_assert!(state.active <= state.units.len());
        debug_assert!(state.units.len() <= self.max_units);
    }

    fn spawn_unit(&self, state: &mut PoolState<P, R>) -> Result<ExecutionUnit<P, Reply<R>>, SpawnError> {
        let id = state.next_unit;
        state.next_unit += 1;
        let events: Weak<dyn UnitEvents<R>> = self.me.clone();
        ExecutionUnit::spawn(id, self.executor.clone(), events, self.launcher.as_ref())
    }

    fn warm_up(&self, count: usize) -> Result<usize, PoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.shut_down {
            return Err(PoolError::PoolShutdown);
        }

        let target = count.min(self.max_units);
        while state.units.len() < target {
            match self.spawn_unit(state) {
                Ok(unit) => state.units.push(unit),
                Err(err) => {
                    PoolCounters::bump(&self.counters.spawn_failures);
                    warn!(pool = %self.pool_id, error = %err, "failed to warm up execution unit");
                    return Err(err.into());
                }
            }
        }

        self.dispatch(state);
        Ok(state.units.len())
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        self.counters
            .snapshot(state.units.len(), state.active, state.queue.len(), self.max_units)
    }

    fn units(&self) -> Vec<UnitSnapshot> {
        self.state.lock().units.iter().map(ExecutionUnit::snapshot).collect()
    }

    /// Mark the pool shut down, fail all queued and in-flight work, and
    /// request every unit to stop. Returns the exit signals to await.
    fn begin_shutdown(&self) -> Vec<(UnitId, oneshot::Receiver<()>)> {
        let mut settled = Settled::new();
        let mut exits = Vec::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if !state.shut_down {
                state.shut_down = true;
                self.shutdown.store(true, Ordering::Release);
                info!(
                    pool = %self.pool_id,
                    units = state.units.len(),
                    queued = state.queue.len(),
                    "shutting down worker pool"
                );
            }

            for task in state.queue.drain() {
                PoolCounters::bump(&self.counters.cancelled_tasks);
                settled.push(task.reply, Err(PoolError::PoolShutdown));
            }
            for mut unit in state.units.drain(..) {
                let (in_flight, exited) = unit.terminate();
                if let Some((task, reply)) = in_flight {
                    debug!(task, unit = unit.id(), "abandoning in-flight task");
                    PoolCounters::bump(&self.counters.cancelled_tasks);
                    settled.push(reply, Err(PoolError::PoolShutdown));
                }
                if let Some(exited) = exited {
                    exits.push((unit.id(), exited));
                }
            }
            state.active = 0;
        }
        settled.fire();
        exits
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl<P, R, E> UnitEvents<R> for Coordinator<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn completed(&self, unit: UnitId, task: TaskId, outcome: Result<R, TaskFailure>) {
        let mut settled = Settled::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(record) = state.units.iter_mut().find(|u| u.id() == unit) else {
                debug!(task, unit, "discarding result from retired unit");
                return;
            };
            let Some((finished, reply)) = record.finish() else {
                return;
            };
            debug_assert_eq!(finished, task);
            state.active -= 1;

            match &outcome {
                Ok(_) => {
                    PoolCounters::bump(&self.counters.completed_tasks);
                    debug!(task, unit, "task completed");
                }
                Err(failure) => {
                    PoolCounters::bump(&self.counters.failed_tasks);
                    debug!(task, unit, error = %failure, "task failed");
                }
            }
            settled.push(reply, outcome.map_err(PoolError::TaskFailed));

            self.dispatch(state);
        }
        settled.fire();
    }

    fn exited(&self, unit: UnitId, exit: UnitExit) {
        let mut settled = Settled::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(idx) = state.units.iter().position(|u| u.id() == unit) else {
                debug!(unit, "retired execution unit exited");
                return;
            };

            let mut dead = state.units.remove(idx);
            let (in_flight, _) = dead.terminate();
            let reason = match exit {
                UnitExit::Crashed(reason) => reason,
                UnitExit::Terminated => "unit exited while still in the pool".to_string(),
            };
            error!(
                pool = %self.pool_id,
                unit,
                reason = %reason,
                remaining = state.units.len(),
                "execution unit crashed"
            );

            if let Some((task, reply)) = in_flight {
                state.active -= 1;
                PoolCounters::bump(&self.counters.crashed_tasks);
                settled.push(reply, Err(PoolError::UnitCrash { unit, reason }));
                debug!(task, unit, "in-flight task lost to unit crash");
            }

            // A replacement is spawned lazily if work is waiting.
            self.dispatch(state);
        }
        settled.fire();
    }
}

/// Bounded pool of execution units for CPU-bound work.
///
/// Units are dedicated OS threads, each with its own single-threaded tokio
/// runtime, created on demand up to `max_units`. Tasks beyond capacity wait
/// in a FIFO queue. Every accepted task resolves exactly once, with the
/// executor's result, its `TaskFailure`, a `UnitCrash`, or `PoolShutdown`.
///
/// # Design
///
/// - **No polling**: units block on their command channel; callers await a oneshot
/// - **Serialized bookkeeping**: one mutex guards queue and unit set
/// - **Clean shutdown**: dropping a unit's sender unblocks it naturally
pub struct WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    config: WorkerPoolConfig,
    inner: Arc<Coordinator<P, R, E>>,
}

impl<P, R, E> WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    /// Create a pool whose units run on dedicated OS threads.
    ///
    /// No unit is started until work arrives (or `warm_up` is called).
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: WorkerPoolConfig, executor: E) -> Result<Self, PoolError> {
        let launcher = ThreadLauncher::from_config(&config);
        Self::with_launcher(config, executor, Arc::new(launcher))
    }

    /// Create a pool that starts its units through `launcher`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn with_launcher(
        config: WorkerPoolConfig,
        executor: E,
        launcher: Arc<dyn Launch>,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let pool_id = Uuid::new_v4();
        let inner = Arc::new_cyclic(|me| Coordinator {
            pool_id,
            max_units: config.max_units,
            executor,
            launcher,
            me: me.clone(),
            state: Mutex::new(PoolState {
                units: Vec::with_capacity(config.max_units),
                queue: TaskQueue::new(),
                active: 0,
                next_unit: 0,
                shut_down: false,
            }),
            counters: PoolCounters::default(),
            shutdown: AtomicBool::new(false),
            next_task: AtomicU64::new(0),
        });

        info!(
            pool = %pool_id,
            max_units = config.max_units,
            "WorkerPool initialized (units spawn on demand)"
        );

        Ok(Self { config, inner })
    }

    /// Submit a task and get a handle to its outcome.
    ///
    /// Never blocks: the task is either handed to a unit right away or
    /// queued behind earlier submissions.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` if the pool has been shut down.
    pub fn submit(&self, payload: P) -> Result<TaskHandle<R>, PoolError> {
        self.inner.submit(payload)
    }

    /// Submit a task and wait for its outcome.
    ///
    /// # Errors
    ///
    /// `PoolShutdown`, `TaskFailed`, or `UnitCrash`, as described on
    /// [`PoolError`].
    pub async fn execute(&self, payload: P) -> Result<R, PoolError> {
        self.submit(payload)?.await
    }

    /// Eagerly start idle units until `count` (capped at `max_units`) are
    /// live. Returns the number of live units.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Spawn` if a unit could not be started, or
    /// `PoolError::PoolShutdown` after shutdown.
    pub fn warm_up(&self, count: usize) -> Result<usize, PoolError> {
        self.inner.warm_up(count)
    }

    /// Current pool statistics. Pure read.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Snapshot of every live unit, in creation order.
    #[must_use]
    pub fn units(&self) -> Vec<UnitSnapshot> {
        self.inner.units()
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    /// Shut the pool down.
    ///
    /// Queued and in-flight tasks resolve with `PoolShutdown` immediately.
    /// Every unit is then asked to stop, and this waits up to the configured
    /// grace period for them to exit; units still busy after that are
    /// detached. Safe to call more than once.
    pub async fn shutdown(&self) {
        let exits = self.inner.begin_shutdown();
        let unit_count = exits.len();
        let deadline = Instant::now() + self.config.shutdown_grace();

        for (unit, exited) in exits {
            if tokio::time::timeout_at(deadline, exited).await.is_ok() {
                debug!(unit, "execution unit joined");
            } else {
                warn!(unit, "execution unit did not exit within grace period - detaching");
            }
        }

        info!(pool = %self.inner.pool_id, units = unit_count, "worker pool shut down complete");
    }
}

impl<P, R, E> Drop for WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    fn drop(&mut self) {
        // Resolve outstanding work but don't wait for units here.
        if !self.inner.is_shut_down() {
            debug!("WorkerPool dropped without explicit shutdown - units will be detached");
        }
        drop(self.inner.begin_shutdown());
    }
}
