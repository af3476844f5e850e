//! Pool policy configuration with named profiles.
//!
//! All durations deserialize from millisecond fields so configs stay flat
//! and readable. Validation runs once at manager construction; out-of-range
//! values are rejected with a [`ConfigError`], never silently clamped.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Named configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Low concurrency, short timeouts, tight breaker threshold.
    /// Trips fast so local problems surface immediately.
    Development,
    /// Higher concurrency, longer timeouts, looser threshold and a
    /// longer cooldown to ride out transient backend blips.
    Production,
}

impl std::str::FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Profile::Development),
            "production" => Ok(Profile::Production),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

/// Connection pool policy configuration.
///
/// `max_connections` is a capacity ceiling used as the denominator for
/// utilization; physical enforcement lives in the query executor. The
/// timeouts are advisory pass-through values for the executor, not
/// enforced by this layer.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of logical connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle timeout passed through to the executor (milliseconds).
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Connection timeout passed through to the executor (milliseconds).
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Maximum retry attempts after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds).
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Whether the circuit breaker is active at all. When false the
    /// breaker is fully bypassed, not merely permissive.
    #[serde(default = "default_circuit_breaker_enabled")]
    pub circuit_breaker_enabled: bool,
    /// Consecutive failures before the breaker trips.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    /// Cooldown after the breaker trips (milliseconds).
    #[serde(default = "default_circuit_breaker_cooldown_ms")]
    pub circuit_breaker_cooldown_ms: u64,
    /// Whether the periodic metrics sampler runs.
    #[serde(default = "default_monitoring_enabled")]
    pub monitoring_enabled: bool,
    /// Interval between periodic metrics samples (milliseconds).
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Number of metrics samples retained, oldest evicted first.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_max_connections() -> usize {
    10
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_circuit_breaker_enabled() -> bool {
    true
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_cooldown_ms() -> u64 {
    30_000
}

fn default_monitoring_enabled() -> bool {
    true
}

fn default_sample_interval_ms() -> u64 {
    5_000
}

fn default_history_capacity() -> usize {
    100
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            idle_timeout_ms: default_idle_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            circuit_breaker_enabled: default_circuit_breaker_enabled(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_cooldown_ms: default_circuit_breaker_cooldown_ms(),
            monitoring_enabled: default_monitoring_enabled(),
            sample_interval_ms: default_sample_interval_ms(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl PoolConfig {
    /// Preset for local development: small pool, fast feedback.
    pub fn development() -> Self {
        Self {
            max_connections: 5,
            idle_timeout_ms: 10_000,
            connection_timeout_ms: 5_000,
            max_retries: 2,
            retry_base_delay_ms: 50,
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown_ms: 10_000,
            sample_interval_ms: 1_000,
            ..Self::default()
        }
    }

    /// Preset for production: larger pool, looser breaker, longer cooldown.
    pub fn production() -> Self {
        Self {
            max_connections: 20,
            idle_timeout_ms: 300_000,
            connection_timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 100,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_ms: 60_000,
            sample_interval_ms: 5_000,
            ..Self::default()
        }
    }

    /// Build the config for a named profile.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Development => Self::development(),
            Profile::Production => Self::production(),
        }
    }

    /// Validate once at construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections",
                reason: "must be greater than zero".into(),
            });
        }
        if self.circuit_breaker_enabled && self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "circuit_breaker_threshold",
                reason: "must be at least 1 when the breaker is enabled".into(),
            });
        }
        if self.history_capacity < 2 {
            return Err(ConfigError::InvalidValue {
                field: "history_capacity",
                reason: "must retain at least 2 samples".into(),
            });
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sample_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn circuit_breaker_cooldown(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_cooldown_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}
