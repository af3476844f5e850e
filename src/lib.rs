//! Poolguard - resilient connection access layer for async database clients.
//!
//! This crate wraps an arbitrary query executor with the policy concerns a
//! production database client needs but drivers rarely provide together:
//!
//! - **Admission control** - a three-state circuit breaker (closed, open,
//!   half-open) sheds load after repeated failures instead of hammering a
//!   struggling backend.
//! - **Retry orchestration** - bounded retries with exponential backoff,
//!   interruptible by shutdown.
//! - **Observability** - periodic metrics sampling into a bounded history,
//!   derived tri-level health status with actionable recommendations, and
//!   trend classification over the retained window.
//!
//! Physical connection management (sockets, keep-alive, statement caching)
//! stays behind the [`QueryExecutor`] trait; this layer only governs how
//! operations are admitted, retried and measured.
//!
//! # Modules
//!
//! - [`config`] - Pool policy configuration with `development`/`production` profiles
//! - [`error`] - Error types for the crate
//! - [`executor`] - The [`QueryExecutor`] trait and [`Rows`] result type
//! - [`breaker`] - Circuit breaker state machine
//! - [`metrics`] - Metrics snapshots and bounded history
//! - [`health`] - Derived health status and thresholds
//! - [`trends`] - Trend classification over the metrics history
//! - [`manager`] - The [`PoolManager`] tying everything together
//!
//! # Features
//!
//! - `testkit` - Mock executors for testing code built on this crate
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use poolguard::{PoolConfig, PoolManager, QueryExecutor, Result, Rows};
//!
//! struct MyDriver;
//!
//! #[async_trait]
//! impl QueryExecutor for MyDriver {
//!     async fn execute(&self, _query: &str) -> Result<Rows> {
//!         Ok(Rows::empty())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = PoolManager::new(MyDriver, PoolConfig::production())?;
//!     manager.start();
//!
//!     let rows = manager.query("SELECT 1").await?;
//!     println!("{} rows, health: {:?}", rows.len(), manager.health().status);
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod config;
pub mod error;
pub mod executor;
pub mod health;
pub mod manager;
pub mod metrics;
pub mod trends;

#[cfg(feature = "testkit")]
pub mod testkit;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::{PoolConfig, Profile};
pub use error::{ConfigError, Error, Result};
pub use executor::{QueryExecutor, Rows};
pub use health::{HealthLevel, HealthStatus, HealthThresholds};
pub use manager::{PoolManager, PoolStatistics};
pub use metrics::PoolMetrics;
pub use trends::{PoolTrends, TrendDirection};
