//! Tests for error types

use xivdye_worker_pool::core::{PoolError, SpawnError, TaskFailure};

#[test]
fn test_error_display() {
    assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
    assert_eq!(PoolError::Timeout.to_string(), "operation timed out");
    assert_eq!(
        PoolError::UnitCrash {
            unit: 3,
            reason: "index out of bounds".into(),
        }
        .to_string(),
        "execution unit 3 crashed: index out of bounds"
    );
    assert_eq!(
        PoolError::TaskFailed(TaskFailure::new("bad header")).to_string(),
        "task failed: bad header"
    );
    assert_eq!(
        PoolError::InvalidConfig("max_units must be greater than 0".into()).to_string(),
        "invalid configuration: max_units must be greater than 0"
    );
}

#[test]
fn test_spawn_error_conversion() {
    let spawn = SpawnError::Launch(std::io::Error::other("no threads left"));
    let err: PoolError = spawn.into();
    assert!(matches!(err, PoolError::Spawn(SpawnError::Launch(_))));
    assert!(err.to_string().contains("no threads left"));
    assert!(err.is_transient());
}

#[test]
fn test_task_failure_conversions() {
    assert_eq!(TaskFailure::from("plain").message(), "plain");
    assert_eq!(TaskFailure::from(String::from("owned")).message(), "owned");

    let err: PoolError = TaskFailure::new("boom").into();
    assert!(matches!(err, PoolError::TaskFailed(ref f) if f.message() == "boom"));
}
