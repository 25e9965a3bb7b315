//! Execution units: isolated worker threads that run one task at a time.
//!
//! A unit is a dedicated thread owning a current-thread tokio runtime and
//! the receiving end of a single-slot command channel. The coordinator
//! keeps the matching [`ExecutionUnit`] record, which holds the sender, the
//! unit's [`UnitState`], and the continuation of the task in flight. The
//! continuation never crosses the thread boundary, so the coordinator alone
//! decides how each task resolves.
//!
//! State machine: `Starting -> Idle <-> Busy`, and any state `-> Dead`.
//! A `Dead` unit is dropped from the pool and never reused.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::debug;

use super::{SpawnError, TaskContext, TaskFailure, TaskId, UnitId, WorkerExecutor};
use crate::runtime::Launch;

/// Lifecycle state of an execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Created but not yet running.
    Starting,
    /// Running and waiting for a task.
    Idle,
    /// Executing exactly one task.
    Busy,
    /// Terminated or crashed. Terminal.
    Dead,
}

/// Point-in-time view of one unit, for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    /// Unit identifier.
    pub id: UnitId,
    /// Current lifecycle state.
    pub state: UnitState,
    /// Task being executed, if busy.
    pub current_task: Option<TaskId>,
}

/// How a unit thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitExit {
    /// The command channel was closed.
    Terminated,
    /// The entry point panicked, or the thread unwound for another reason.
    Crashed(String),
}

/// Callbacks a unit thread uses to report back to its owner.
pub(crate) trait UnitEvents<R>: Send + Sync {
    /// The unit finished `task` and is ready for another one.
    fn completed(&self, unit: UnitId, task: TaskId, outcome: Result<R, TaskFailure>);
    /// The unit thread is exiting.
    fn exited(&self, unit: UnitId, exit: UnitExit);
}

struct Assignment<P> {
    task: TaskId,
    payload: P,
}

/// Coordinator-side record of a live unit.
///
/// `C` is whatever the owner needs to keep while a task is in flight.
pub(crate) struct ExecutionUnit<P, C> {
    id: UnitId,
    state: UnitState,
    commands: Option<Sender<Assignment<P>>>,
    in_flight: Option<(TaskId, C)>,
    exited: Option<oneshot::Receiver<()>>,
}

impl<P, C> ExecutionUnit<P, C>
where
    P: Send + 'static,
{
    /// Build the unit's runtime and start its thread.
    pub(crate) fn spawn<R, E>(
        id: UnitId,
        executor: E,
        events: Weak<dyn UnitEvents<R>>,
        launcher: &dyn Launch,
    ) -> Result<Self, SpawnError>
    where
        R: Send + 'static,
        E: WorkerExecutor<P, R>,
    {
        let mut unit = Self {
            id,
            state: UnitState::Starting,
            commands: None,
            in_flight: None,
            exited: None,
        };

        let runtime = UnitRuntime::build()?;
        let (command_tx, command_rx) = bounded::<Assignment<P>>(1);
        let (exited_tx, exited_rx) = oneshot::channel();

        launcher.launch(
            id,
            Box::new(move || {
                let guard = ExitGuard {
                    unit: id,
                    events,
                    exit: UnitExit::Crashed("unit thread exited unexpectedly".into()),
                    _exited: exited_tx,
                };
                // The guard reports a crash if the runtime is somehow gone.
                let Some(runtime) = runtime.into_inner() else {
                    return;
                };
                run_unit(guard, &runtime, &executor, command_rx);
            }),
        )?;

        unit.commands = Some(command_tx);
        unit.exited = Some(exited_rx);
        unit.state = UnitState::Idle;
        debug!(unit = id, "execution unit spawned");
        Ok(unit)
    }

    /// Hand a task to this idle unit.
    ///
    /// Only ever called on an `Idle` unit. If the unit thread has already
    /// gone away, the unit is marked `Dead` and the payload and continuation
    /// are given back.
    pub(crate) fn dispatch(&mut self, task: TaskId, payload: P, continuation: C) -> Result<(), (P, C)> {
        debug_assert_eq!(self.state, UnitState::Idle);
        let Some(commands) = &self.commands else {
            return Err((payload, continuation));
        };
        match commands.try_send(Assignment { task, payload }) {
            Ok(()) => {
                self.state = UnitState::Busy;
                self.in_flight = Some((task, continuation));
                Ok(())
            }
            Err(err) => {
                self.state = UnitState::Dead;
                self.commands = None;
                Err((err.into_inner().payload, continuation))
            }
        }
    }

    /// Mark the in-flight task finished and return its continuation.
    pub(crate) fn finish(&mut self) -> Option<(TaskId, C)> {
        let in_flight = self.in_flight.take()?;
        self.state = UnitState::Idle;
        Some(in_flight)
    }

    /// Request the unit stop. Idempotent.
    ///
    /// Returns the abandoned in-flight task, if any, and the unit's exit
    /// signal the first time it is called.
    pub(crate) fn terminate(&mut self) -> (Option<(TaskId, C)>, Option<oneshot::Receiver<()>>) {
        self.commands = None;
        self.state = UnitState::Dead;
        (self.in_flight.take(), self.exited.take())
    }

    pub(crate) const fn id(&self) -> UnitId {
        self.id
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.state == UnitState::Idle
    }

    pub(crate) fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            id: self.id,
            state: self.state,
            current_task: self.in_flight.as_ref().map(|(task, _)| *task),
        }
    }
}

/// A unit's private current-thread runtime.
///
/// Shut down in the background unless the unit thread takes it: a failed
/// launch drops it on the submitting thread, which may itself be running
/// inside a runtime.
struct UnitRuntime(Option<Runtime>);

impl UnitRuntime {
    fn build() -> Result<Self, SpawnError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SpawnError::Runtime)?;
        Ok(Self(Some(runtime)))
    }

    /// Hand the runtime to the unit thread, where a plain drop is fine.
    fn into_inner(mut self) -> Option<Runtime> {
        self.0.take()
    }
}

impl Drop for UnitRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// Reports the unit's exit however its thread ends, including unwinding.
struct ExitGuard<R> {
    unit: UnitId,
    events: Weak<dyn UnitEvents<R>>,
    exit: UnitExit,
    // Dropped after `drop` runs, which wakes anyone awaiting the exit.
    _exited: oneshot::Sender<()>,
}

impl<R> Drop for ExitGuard<R> {
    fn drop(&mut self) {
        let exit = std::mem::replace(&mut self.exit, UnitExit::Terminated);
        if let Some(events) = self.events.upgrade() {
            events.exited(self.unit, exit);
        }
    }
}

fn run_unit<P, R, E>(
    mut guard: ExitGuard<R>,
    runtime: &Runtime,
    executor: &E,
    commands: Receiver<Assignment<P>>,
) where
    P: Send + 'static,
    R: Send + 'static,
    E: WorkerExecutor<P, R>,
{
    let unit = guard.unit;
    debug!(unit, "execution unit started");

    // Blocks until a task arrives; a closed channel means terminate.
    while let Ok(Assignment { task, payload }) = commands.recv() {
        let ctx = TaskContext { task, unit };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(executor.execute(payload, ctx))
        }));

        match outcome {
            Ok(result) => {
                if let Some(events) = guard.events.upgrade() {
                    events.completed(unit, task, result);
                }
            }
            Err(panic) => {
                // Close the slot before reporting so nothing else can be queued here.
                drop(commands);
                guard.exit = UnitExit::Crashed(panic_message(panic.as_ref()));
                return;
            }
        }
    }

    debug!(unit, "execution unit channel closed, exiting");
    guard.exit = UnitExit::Terminated;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unit panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ThreadLauncher;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    enum Event {
        Completed(UnitId, TaskId, Result<u32, TaskFailure>),
        Exited(UnitId, UnitExit),
    }

    struct Recorder {
        tx: Sender<Event>,
    }

    impl UnitEvents<u32> for Recorder {
        fn completed(&self, unit: UnitId, task: TaskId, outcome: Result<u32, TaskFailure>) {
            let _ = self.tx.send(Event::Completed(unit, task, outcome));
        }

        fn exited(&self, unit: UnitId, exit: UnitExit) {
            let _ = self.tx.send(Event::Exited(unit, exit));
        }
    }

    #[derive(Clone)]
    struct Doubler;

    #[async_trait]
    impl WorkerExecutor<u32, u32> for Doubler {
        async fn execute(&self, payload: u32, _ctx: TaskContext) -> Result<u32, TaskFailure> {
            match payload {
                0 => Err("zero".into()),
                13 => panic!("unlucky payload"),
                n => Ok(n * 2),
            }
        }
    }

    fn spawn_unit(id: UnitId) -> (ExecutionUnit<u32, ()>, Arc<Recorder>, Receiver<Event>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let recorder = Arc::new(Recorder { tx });
        let weak: Weak<dyn UnitEvents<u32>> = Arc::<Recorder>::downgrade(&recorder);
        let launcher = ThreadLauncher::new("unit-test", 256 * 1024);
        let unit = ExecutionUnit::spawn(id, Doubler, weak, &launcher).expect("spawn");
        (unit, recorder, rx)
    }

    fn next(rx: &Receiver<Event>) -> Event {
        rx.recv_timeout(Duration::from_secs(5)).expect("event")
    }

    #[test]
    fn test_unit_runs_tasks_and_returns_to_idle() {
        let (mut unit, _recorder, rx) = spawn_unit(1);
        assert!(unit.is_idle());

        unit.dispatch(10, 21, ()).map_err(|_| ()).expect("dispatch");
        assert_eq!(unit.snapshot().state, UnitState::Busy);
        assert_eq!(unit.snapshot().current_task, Some(10));

        match next(&rx) {
            Event::Completed(1, 10, Ok(42)) => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(unit.finish().map(|(task, ())| task), Some(10));
        assert!(unit.is_idle());

        unit.dispatch(11, 0, ()).map_err(|_| ()).expect("dispatch");
        match next(&rx) {
            Event::Completed(1, 11, Err(failure)) => assert_eq!(failure.message(), "zero"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_terminate_is_idempotent_and_reports_exit() {
        let (mut unit, _recorder, rx) = spawn_unit(2);

        let (in_flight, exited) = unit.terminate();
        assert!(in_flight.is_none());
        assert!(exited.is_some());
        assert_eq!(unit.snapshot().state, UnitState::Dead);

        let (again, exited_again) = unit.terminate();
        assert!(again.is_none());
        assert!(exited_again.is_none());

        match next(&rx) {
            Event::Exited(2, UnitExit::Terminated) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    struct Refuse;

    impl Launch for Refuse {
        fn launch(&self, _unit: UnitId, _body: crate::runtime::UnitBody) -> Result<(), SpawnError> {
            Err(SpawnError::Refused("no capacity".into()))
        }
    }

    #[tokio::test]
    async fn test_refused_launch_inside_runtime_is_an_error() {
        // The unit's runtime is dropped here, on a thread that is already
        // driving a runtime.
        let (tx, _rx) = crossbeam_channel::unbounded();
        let recorder = Arc::new(Recorder { tx });
        let weak: Weak<dyn UnitEvents<u32>> = Arc::<Recorder>::downgrade(&recorder);

        let result = ExecutionUnit::<u32, ()>::spawn(4, Doubler, weak, &Refuse);
        assert!(matches!(result, Err(SpawnError::Refused(_))));
    }

    #[test]
    fn test_panic_is_reported_as_crash() {
        let (mut unit, _recorder, rx) = spawn_unit(3);

        unit.dispatch(1, 13, ()).map_err(|_| ()).expect("dispatch");
        match next(&rx) {
            Event::Exited(3, UnitExit::Crashed(reason)) => assert_eq!(reason, "unlucky payload"),
            other => panic!("unexpected event: {other:?}"),
        }

        // The thread is gone; a second dispatch hands the work back.
        unit.finish();
        assert!(unit.dispatch(2, 5, ()).is_err());
        assert_eq!(unit.snapshot().state, UnitState::Dead);
    }
}
