//! Pool manager: retry orchestration, admission control and observability.
//!
//! Ties the policy pieces together around an injected [`QueryExecutor`]:
//! the circuit breaker gates admission, the retry loop recovers transient
//! failures with exponential backoff, and a background sampler task feeds
//! the metrics history consumed by health and trend reporting.
//!
//! The manager is explicitly constructed and has an explicit lifecycle
//! ([`start`](PoolManager::start) / [`shutdown`](PoolManager::shutdown));
//! there is no ambient global instance.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::{PoolConfig, Profile};
use crate::error::{Error, Result};
use crate::executor::{QueryExecutor, Rows};
use crate::health::{self, HealthStatus, HealthThresholds};
use crate::metrics::{MetricsRecorder, PoolMetrics};
use crate::trends::{self, PoolTrends};

/// Combined report for stats endpoints: latest snapshot, retained history
/// and trend classification.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatistics {
    pub current: PoolMetrics,
    pub historical: Vec<PoolMetrics>,
    pub trends: PoolTrends,
}

/// State shared between callers and the sampler task.
///
/// Locks are held only for short synchronous sections, never across an
/// await point. The backoff sleep suspends with no lock held.
struct Shared {
    config: RwLock<PoolConfig>,
    breaker: Mutex<CircuitBreaker>,
    metrics: Mutex<MetricsRecorder>,
    thresholds: RwLock<HealthThresholds>,
    /// Operations currently inside the retry loop. This is the real
    /// active-connection gauge for this layer's logical slots; physical
    /// pool telemetry stays behind the executor.
    in_flight: AtomicUsize,
    shutting_down: AtomicBool,
    shutdown_notify: Notify,
}

/// Decrements the in-flight gauge when an operation leaves the retry loop,
/// whatever the outcome.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Resilient access layer around a [`QueryExecutor`].
pub struct PoolManager<E> {
    executor: Arc<E>,
    shared: Arc<Shared>,
    sampler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<E: QueryExecutor + 'static> PoolManager<E> {
    /// Create a manager around an executor. The config is validated here;
    /// a manager never exists with an invalid configuration.
    pub fn new(executor: E, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(
            config.circuit_breaker_enabled,
            config.circuit_breaker_threshold,
            config.circuit_breaker_cooldown(),
        );
        let metrics = MetricsRecorder::new(config.history_capacity);
        Ok(Self {
            executor: Arc::new(executor),
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                breaker: Mutex::new(breaker),
                metrics: Mutex::new(metrics),
                thresholds: RwLock::new(HealthThresholds::default()),
                in_flight: AtomicUsize::new(0),
                shutting_down: AtomicBool::new(false),
                shutdown_notify: Notify::new(),
            }),
            sampler: Mutex::new(None),
        })
    }

    /// Replace the default health thresholds (builder form).
    pub fn with_health_thresholds(self, thresholds: HealthThresholds) -> Self {
        self.set_health_thresholds(thresholds);
        self
    }

    /// Replace the health thresholds at any point in the manager's life.
    pub fn set_health_thresholds(&self, thresholds: HealthThresholds) {
        *self.shared.thresholds.write() = thresholds;
    }

    /// Start the periodic metrics sampler.
    ///
    /// Idempotent; does nothing when monitoring is disabled. The task runs
    /// until [`shutdown`](Self::shutdown).
    pub fn start(&self) {
        if !self.shared.config.read().monitoring_enabled {
            debug!("Monitoring disabled, sampler not started");
            return;
        }
        let mut slot = self.sampler.lock();
        if slot.is_some() {
            return;
        }
        let shared = self.shared.clone();
        *slot = Some(tokio::spawn(async move {
            debug!("Metrics sampler task starting");
            loop {
                // Re-read each tick so profile swaps take effect.
                let interval = shared.config.read().sample_interval();
                // Register for the shutdown notification before checking the
                // flag, so a notify_waiters landing in between is not lost.
                let notified = shared.shutdown_notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if shared.shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = &mut notified => break,
                }
                let active = shared.in_flight.load(Ordering::Relaxed);
                let max = shared.config.read().max_connections;
                let snapshot = shared.metrics.lock().sample(active, max);
                debug!(
                    active = snapshot.active_connections,
                    utilization = snapshot.utilization,
                    errors = snapshot.cumulative_errors,
                    "Sampled pool metrics"
                );
            }
            debug!("Metrics sampler task stopped");
        }));
    }

    /// Stop the sampler and abort any in-flight retry sleeps.
    ///
    /// Operations waiting in a backoff sleep return [`Error::Aborted`]
    /// promptly instead of completing the remaining delay.
    pub async fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        self.shared.shutdown_notify.notify_waiters();
        let handle = self.sampler.lock().take();
        if let Some(handle) = handle {
            if handle.await.is_err() {
                warn!("Sampler task panicked during shutdown");
            }
        }
        info!("Pool manager shut down");
    }

    /// Execute an operation with admission control and bounded retries.
    ///
    /// The breaker is consulted first: a denied operation fails fast with
    /// [`Error::CircuitOpen`], consuming no attempt. Otherwise the closure
    /// runs up to `max_retries + 1` times with exponential backoff
    /// (`retry_base_delay * 2^attempt`, zero-based) between attempts. Every
    /// attempt's latency and outcome feeds the metrics recorder, but only
    /// terminal exhaustion counts as a single failure event against the
    /// breaker; a retried-then-successful call reports success.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::Aborted {
                operation: operation.to_string(),
            });
        }
        if !self.shared.breaker.lock().can_execute() {
            debug!(operation, "Rejected by open circuit breaker");
            return Err(Error::CircuitOpen {
                operation: operation.to_string(),
            });
        }

        let (max_retries, base_delay) = {
            let config = self.shared.config.read();
            (config.max_retries, config.retry_base_delay())
        };

        self.shared.in_flight.fetch_add(1, Ordering::Relaxed);
        let _guard = InFlightGuard(&self.shared.in_flight);

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let result = op().await;
            let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;

            match result {
                Ok(value) => {
                    self.shared.metrics.lock().record_outcome(latency_ms, true);
                    self.shared.breaker.lock().on_success();
                    debug!(operation, attempt, latency_ms, "Operation succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    self.shared.metrics.lock().record_outcome(latency_ms, false);
                    if attempt < max_retries {
                        let delay = base_delay * 2u32.saturating_pow(attempt);
                        warn!(
                            operation,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Attempt failed, retrying after backoff"
                        );
                        // Register for the shutdown notification before
                        // checking the flag; notify_waiters only wakes
                        // already-registered waiters.
                        let notified = self.shared.shutdown_notify.notified();
                        tokio::pin!(notified);
                        notified.as_mut().enable();
                        if self.shared.shutting_down.load(Ordering::SeqCst) {
                            return Err(Error::Aborted {
                                operation: operation.to_string(),
                            });
                        }
                        tokio::select! {
                            _ = sleep(delay) => {}
                            _ = &mut notified => {
                                return Err(Error::Aborted {
                                    operation: operation.to_string(),
                                });
                            }
                        }
                        attempt += 1;
                    } else {
                        // One failure event per logical call, applied only
                        // when retries are exhausted.
                        self.shared.breaker.lock().on_failure();
                        warn!(
                            operation,
                            attempts = attempt + 1,
                            error = %err,
                            "Operation failed terminally"
                        );
                        return Err(Error::Operation {
                            operation: operation.to_string(),
                            attempts: attempt + 1,
                            source: Box::new(err),
                        });
                    }
                }
            }
        }
    }

    /// Run a query through the injected executor with full retry and
    /// breaker protection.
    pub async fn query(&self, sql: &str) -> Result<Rows> {
        let executor = self.executor.clone();
        self.execute("query", || {
            let executor = executor.clone();
            let sql = sql.to_string();
            async move { executor.execute(&sql).await }
        })
        .await
    }

    /// Current health report, recomputed on demand.
    pub fn health(&self) -> HealthStatus {
        let thresholds = self.shared.thresholds.read().clone();
        let (snapshot, error_rate) = {
            let metrics = self.shared.metrics.lock();
            let config = self.shared.config.read();
            let active = self.shared.in_flight.load(Ordering::Relaxed);
            (
                metrics.snapshot(active, config.max_connections),
                metrics.recent_error_rate(thresholds.error_window),
            )
        };
        let breaker_state = self.shared.breaker.lock().state();
        health::evaluate(snapshot, error_rate, breaker_state, &thresholds)
    }

    /// Current snapshot plus retained history and trend classification.
    pub fn statistics(&self) -> PoolStatistics {
        let (current, historical) = {
            let metrics = self.shared.metrics.lock();
            let config = self.shared.config.read();
            let active = self.shared.in_flight.load(Ordering::Relaxed);
            (
                metrics.snapshot(active, config.max_connections),
                metrics.history(),
            )
        };
        let trends = trends::analyze(&historical);
        PoolStatistics {
            current,
            historical,
            trends,
        }
    }

    /// Swap the active configuration for a named profile.
    ///
    /// The breaker keeps its current state and counters but adopts the new
    /// thresholds. The metrics history capacity is fixed at construction.
    pub fn configure_profile(&self, profile: Profile) {
        let config = PoolConfig::for_profile(profile);
        info!(?profile, "Swapping pool configuration profile");
        self.shared.breaker.lock().reconfigure(
            config.circuit_breaker_enabled,
            config.circuit_breaker_threshold,
            config.circuit_breaker_cooldown(),
        );
        *self.shared.config.write() = config;
    }

    /// Administrative override: force the breaker closed.
    pub fn reset_circuit_breaker(&self) {
        self.shared.breaker.lock().reset();
    }

    /// Current breaker state, for tests and operational tooling.
    pub fn circuit_state(&self) -> CircuitState {
        self.shared.breaker.lock().state()
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> PoolConfig {
        self.shared.config.read().clone()
    }

    /// Take one metrics sample immediately, outside the timer schedule.
    pub fn sample_now(&self) -> PoolMetrics {
        let active = self.shared.in_flight.load(Ordering::Relaxed);
        let max = self.shared.config.read().max_connections;
        self.shared.metrics.lock().sample(active, max)
    }
}
