//! End-to-end tests for the pool manager: breaker admission, retry
//! orchestration, lifecycle and reporting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use poolguard::testkit::ScriptedExecutor;
use poolguard::{
    CircuitState, Error, HealthLevel, HealthThresholds, PoolConfig, PoolManager, Profile, Rows,
    TrendDirection,
};

/// Route crate logs through the test writer; `RUST_LOG` controls verbosity.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with millisecond-scale delays for fast tests.
fn fast_config() -> PoolConfig {
    PoolConfig {
        max_connections: 5,
        max_retries: 0,
        retry_base_delay_ms: 1,
        circuit_breaker_threshold: 3,
        circuit_breaker_cooldown_ms: 60_000,
        monitoring_enabled: false,
        ..PoolConfig::default()
    }
}

#[tokio::test]
async fn successful_query_returns_rows() {
    init_tracing();
    let executor = ScriptedExecutor::new().with_results(vec![Ok(Rows::new(vec![
        serde_json::json!({"id": 1}),
        serde_json::json!({"id": 2}),
    ]))]);
    let manager = PoolManager::new(executor, fast_config()).unwrap();

    let rows = manager.query("SELECT id FROM orders").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(manager.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_rejects_without_executing() {
    let executor = ScriptedExecutor::always_failing();
    let counter = executor.counter();
    let manager = PoolManager::new(executor, fast_config()).unwrap();

    // Three terminal failures trip the threshold-3 breaker.
    for _ in 0..3 {
        let err = manager.query("SELECT 1").await.unwrap_err();
        assert!(matches!(err, Error::Operation { .. }));
    }
    assert_eq!(manager.circuit_state(), CircuitState::Open);

    // Fourth call fails fast; the executor is never invoked.
    let before = counter.load(std::sync::atomic::Ordering::SeqCst);
    let err = manager.query("SELECT 1").await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), before);
}

#[tokio::test]
async fn disabled_breaker_never_rejects() {
    let config = PoolConfig {
        circuit_breaker_enabled: false,
        circuit_breaker_threshold: 1,
        ..fast_config()
    };
    let executor = ScriptedExecutor::always_failing();
    let counter = executor.counter();
    let manager = PoolManager::new(executor, config).unwrap();

    for _ in 0..100 {
        let err = manager.query("SELECT 1").await.unwrap_err();
        assert!(!err.is_circuit_open());
    }
    // Every call reached the executor.
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 100);
    assert_eq!(manager.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn retry_recovers_and_backs_off_exponentially() {
    let config = PoolConfig {
        max_retries: 2,
        retry_base_delay_ms: 100,
        ..fast_config()
    };
    let executor = ScriptedExecutor::new().with_results(vec![
        Err(Error::Query("deadlock".into())),
        Err(Error::Query("deadlock".into())),
        Ok(Rows::empty()),
    ]);
    let counter = executor.counter();
    let manager = PoolManager::new(executor, config).unwrap();

    let started = Instant::now();
    let result = manager.query("UPDATE orders SET state = 'paid'").await;
    let elapsed = started.elapsed();

    assert!(result.is_ok());
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
    // Backoff slept 100ms then 200ms before the successful attempt.
    assert!(
        elapsed >= Duration::from_millis(300),
        "elapsed {elapsed:?} below expected backoff"
    );
    // The eventual success reported on_success, not on_failure.
    assert_eq!(manager.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn exhaustion_invokes_op_retries_plus_one_times_and_counts_once() {
    let config = PoolConfig {
        max_retries: 2,
        retry_base_delay_ms: 1,
        circuit_breaker_threshold: 2,
        ..fast_config()
    };
    let executor = ScriptedExecutor::always_failing();
    let counter = executor.counter();
    let manager = PoolManager::new(executor, config).unwrap();

    let err = manager.query("SELECT 1").await.unwrap_err();
    match err {
        Error::Operation { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected Operation error, got {other:?}"),
    }
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);

    // Three failed attempts counted as ONE breaker event: with threshold 2
    // the breaker is still closed after a single exhausted call and opens
    // after a second one.
    assert_eq!(manager.circuit_state(), CircuitState::Closed);
    let _ = manager.query("SELECT 1").await.unwrap_err();
    assert_eq!(manager.circuit_state(), CircuitState::Open);
}

#[tokio::test]
async fn half_open_probe_after_cooldown_closes_on_success() {
    let config = PoolConfig {
        circuit_breaker_threshold: 1,
        circuit_breaker_cooldown_ms: 20,
        ..fast_config()
    };
    let executor = ScriptedExecutor::new().with_results(vec![
        Err(Error::Query("boom".into())),
        Ok(Rows::empty()),
    ]);
    let manager = PoolManager::new(executor, config).unwrap();

    let _ = manager.query("SELECT 1").await.unwrap_err();
    assert_eq!(manager.circuit_state(), CircuitState::Open);
    assert!(manager
        .query("SELECT 1")
        .await
        .unwrap_err()
        .is_circuit_open());

    tokio::time::sleep(Duration::from_millis(25)).await;

    // Probe succeeds; breaker closes.
    manager.query("SELECT 1").await.unwrap();
    assert_eq!(manager.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn terminal_error_chains_underlying_cause() {
    let executor = ScriptedExecutor::new()
        .with_results(vec![Err(Error::Query("relation does not exist".into()))]);
    let manager = PoolManager::new(executor, fast_config()).unwrap();

    let err = manager.query("SELECT * FROM missing").await.unwrap_err();
    let source = std::error::Error::source(&err).expect("cause must be preserved");
    assert!(source.to_string().contains("relation does not exist"));
}

#[tokio::test]
async fn shutdown_aborts_inflight_backoff_promptly() {
    init_tracing();
    let config = PoolConfig {
        max_retries: 3,
        retry_base_delay_ms: 5_000,
        ..fast_config()
    };
    let manager = Arc::new(PoolManager::new(ScriptedExecutor::always_failing(), config).unwrap());

    let worker = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.query("SELECT 1").await })
    };

    // Let the first attempt fail and enter its 5s backoff sleep.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = Instant::now();
    manager.shutdown().await;

    let result = worker.await.unwrap();
    assert!(result.unwrap_err().is_aborted());
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "abort was not prompt"
    );
}

#[tokio::test]
async fn immediate_shutdown_is_not_lost_entering_backoff() {
    let config = PoolConfig {
        max_retries: 3,
        retry_base_delay_ms: 5_000,
        ..fast_config()
    };
    let manager = Arc::new(PoolManager::new(ScriptedExecutor::always_failing(), config).unwrap());

    // Several workers racing into their first backoff sleep.
    let mut workers = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        workers.push(tokio::spawn(async move { manager.query("SELECT 1").await }));
    }

    // Shutdown fires with no delay; a worker between its shutdown-flag
    // check and its first sleep poll must still see it.
    let started = Instant::now();
    manager.shutdown().await;

    for worker in workers {
        assert!(worker.await.unwrap().unwrap_err().is_aborted());
    }
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "abort was not prompt"
    );
}

#[tokio::test]
async fn execute_after_shutdown_is_aborted() {
    let manager = PoolManager::new(ScriptedExecutor::new(), fast_config()).unwrap();
    manager.shutdown().await;

    let err = manager.query("SELECT 1").await.unwrap_err();
    assert!(err.is_aborted());
}

#[tokio::test]
async fn sampler_appends_history_and_stops_on_shutdown() {
    let config = PoolConfig {
        monitoring_enabled: true,
        sample_interval_ms: 5,
        ..fast_config()
    };
    let manager = PoolManager::new(ScriptedExecutor::new(), config).unwrap();
    manager.start();
    manager.start(); // idempotent

    tokio::time::sleep(Duration::from_millis(40)).await;
    manager.shutdown().await;

    let stats = manager.statistics();
    assert!(
        stats.historical.len() >= 2,
        "expected samples, got {}",
        stats.historical.len()
    );
    for sample in &stats.historical {
        assert_eq!(
            sample.active_connections + sample.idle_connections,
            sample.total_connections
        );
    }
    // Idle pool: nothing moved, every series is flat.
    assert_eq!(stats.trends.utilization, TrendDirection::Stable);
    assert_eq!(stats.trends.errors, TrendDirection::Stable);
}

#[tokio::test]
async fn health_reflects_breaker_state() {
    let config = PoolConfig {
        circuit_breaker_threshold: 1,
        ..fast_config()
    };
    let manager = PoolManager::new(ScriptedExecutor::always_failing(), config).unwrap();

    assert_eq!(manager.health().status, HealthLevel::Healthy);

    let _ = manager.query("SELECT 1").await.unwrap_err();
    let report = manager.health();
    assert_eq!(report.status, HealthLevel::Critical);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("connectivity")));

    manager.reset_circuit_breaker();
    assert_eq!(manager.health().status, HealthLevel::Healthy);
}

#[tokio::test]
async fn health_thresholds_swap_applies_after_construction() {
    let config = PoolConfig {
        max_connections: 1,
        ..fast_config()
    };
    let executor = ScriptedExecutor::new().with_delay(Duration::from_millis(200));
    let manager = Arc::new(PoolManager::new(executor, config).unwrap());

    let worker = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.query("SELECT 1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // One in-flight query saturates the single-slot pool.
    assert_eq!(manager.health().status, HealthLevel::Critical);

    // Raising the utilization bands takes effect immediately, even with
    // the manager already running operations.
    manager.set_health_thresholds(HealthThresholds {
        utilization_critical: 2.0,
        utilization_warning: 2.0,
        ..HealthThresholds::default()
    });
    assert_eq!(manager.health().status, HealthLevel::Healthy);

    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn configure_profile_swaps_config_atomically() {
    let manager = PoolManager::new(ScriptedExecutor::new(), PoolConfig::development()).unwrap();
    assert_eq!(manager.config().max_connections, 5);

    manager.configure_profile(Profile::Production);
    let config = manager.config();
    assert_eq!(config.max_connections, 20);
    assert_eq!(config.circuit_breaker_threshold, 5);
}

#[tokio::test]
async fn statistics_serialize_to_json() {
    let manager = PoolManager::new(ScriptedExecutor::new(), fast_config()).unwrap();
    manager.query("SELECT 1").await.unwrap();
    manager.sample_now();

    let stats = manager.statistics();
    let json = serde_json::to_value(&stats).unwrap();
    assert!(json["current"]["total_connections"].is_u64());
    assert!(json["historical"].is_array());
    assert_eq!(json["trends"]["utilization"], "stable");

    let health = serde_json::to_value(manager.health()).unwrap();
    assert_eq!(health["status"], "healthy");
}
