//! Tests for configuration validation

use std::time::Duration;
use xivdye_worker_pool::config::{units_for_parallelism, WorkerPoolConfig, MAX_UNITS_CAP};

#[test]
fn test_default_config_is_valid() {
    let cfg = WorkerPoolConfig::default();
    assert!(cfg.validate().is_ok());
    assert!((1..=MAX_UNITS_CAP).contains(&cfg.max_units));
    assert_eq!(cfg.thread_name_prefix, "xivdye-unit");
    assert_eq!(cfg.shutdown_grace(), Duration::from_secs(2));
}

#[test]
fn test_units_for_parallelism() {
    assert_eq!(units_for_parallelism(0), 1);
    assert_eq!(units_for_parallelism(1), 1);
    assert_eq!(units_for_parallelism(2), 1);
    assert_eq!(units_for_parallelism(4), 3);
    assert_eq!(units_for_parallelism(5), 4);
    assert_eq!(units_for_parallelism(64), MAX_UNITS_CAP);
}

#[test]
fn test_config_invalid_max_units() {
    assert!(WorkerPoolConfig::new().with_max_units(0).validate().is_err());
    assert!(WorkerPoolConfig::new()
        .with_max_units(MAX_UNITS_CAP + 1)
        .validate()
        .is_err());
    assert!(WorkerPoolConfig::new()
        .with_max_units(MAX_UNITS_CAP)
        .validate()
        .is_ok());
}

#[test]
fn test_config_invalid_thread_settings() {
    assert!(WorkerPoolConfig::new().with_thread_stack_size(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_thread_name_prefix("").validate().is_err());
}

#[test]
fn test_config_from_json() {
    let cfg = WorkerPoolConfig::from_json_str(r#"{"max_units": 2, "shutdown_grace_ms": 500}"#)
        .expect("valid json");
    assert_eq!(cfg.max_units, 2);
    assert_eq!(cfg.shutdown_grace(), Duration::from_millis(500));
    assert_eq!(cfg.thread_stack_size, WorkerPoolConfig::default().thread_stack_size);

    let err = WorkerPoolConfig::from_json_str(r#"{"max_units": 9}"#).unwrap_err();
    assert!(err.contains("max_units"), "unexpected error: {err}");
    assert!(WorkerPoolConfig::from_json_str("{not json").is_err());
}

#[test]
fn test_config_serialization_roundtrip() {
    let cfg = WorkerPoolConfig::new()
        .with_max_units(3)
        .with_thread_name_prefix("dye");
    let json = serde_json::to_string(&cfg).expect("serialize");
    let back = WorkerPoolConfig::from_json_str(&json).expect("parse");
    assert_eq!(cfg, back);
}
