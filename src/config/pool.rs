//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard upper bound on execution units, regardless of host size.
pub const MAX_UNITS_CAP: usize = 4;

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const DEFAULT_THREAD_PREFIX: &str = "xivdye-unit";
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;

const ENV_MAX_UNITS: &str = "XIVDYE_POOL_MAX_UNITS";
const ENV_STACK_SIZE: &str = "XIVDYE_POOL_STACK_SIZE";
const ENV_THREAD_PREFIX: &str = "XIVDYE_POOL_THREAD_PREFIX";
const ENV_SHUTDOWN_GRACE_MS: &str = "XIVDYE_POOL_SHUTDOWN_GRACE_MS";

/// Number of execution units to use for a host with `parallelism` hardware
/// threads: one is left for the request loop, and the result is clamped to
/// `1..=MAX_UNITS_CAP`.
#[must_use]
pub fn units_for_parallelism(parallelism: usize) -> usize {
    parallelism.saturating_sub(1).clamp(1, MAX_UNITS_CAP)
}

/// Default unit count for the current host.
#[must_use]
pub fn default_max_units() -> usize {
    units_for_parallelism(num_cpus::get())
}

/// Configuration for a `WorkerPool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Maximum number of live execution units.
    pub max_units: usize,
    /// Stack size for each unit thread, in bytes.
    pub thread_stack_size: usize,
    /// Prefix for unit thread names; the unit id is appended.
    pub thread_name_prefix: String,
    /// Total time `shutdown()` waits for all units to exit, as one deadline
    /// shared by every unit; units still running after it are detached.
    pub shutdown_grace_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_units: default_max_units(),
            thread_stack_size: DEFAULT_STACK_SIZE,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with host-derived defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of execution units.
    #[must_use]
    pub const fn with_max_units(mut self, max_units: usize) -> Self {
        self.max_units = max_units;
        self
    }

    /// Set the unit thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the unit thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the total time `shutdown()` waits for units to exit.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Total time `shutdown()` waits for units to exit.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_units == 0 {
            return Err("max_units must be greater than 0".into());
        }
        if self.max_units > MAX_UNITS_CAP {
            return Err(format!(
                "max_units must not exceed {MAX_UNITS_CAP} (got {})",
                self.max_units
            ));
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate it.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading `.env`
    /// first if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unparseable, or if the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_MAX_UNITS) {
            cfg.max_units = parse_var(ENV_MAX_UNITS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STACK_SIZE) {
            cfg.thread_stack_size = parse_var(ENV_STACK_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_THREAD_PREFIX) {
            cfg.thread_name_prefix = raw;
        }
        if let Some(raw) = lookup(ENV_SHUTDOWN_GRACE_MS) {
            cfg.shutdown_grace_ms = parse_var(ENV_SHUTDOWN_GRACE_MS, &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}={raw:?} is invalid: {e}"))
}
