//! Pool metrics snapshots and bounded history.
//!
//! The recorder keeps a rolling latency window and a monotonic error
//! counter, both fed by the retry executor after every attempt, and a
//! bounded FIFO history of snapshots produced by the periodic sampler.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How many recent attempt latencies feed the rolling average.
const LATENCY_WINDOW: usize = 50;

/// One point-in-time snapshot of pool state.
///
/// Invariant: `active_connections + idle_connections == total_connections`
/// and `utilization == active_connections / total_connections`.
#[derive(Debug, Clone, Serialize)]
pub struct PoolMetrics {
    pub timestamp: DateTime<Utc>,
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
    /// Monotonic running total across the manager's lifetime.
    pub cumulative_errors: u64,
    pub avg_connection_time_ms: f64,
    pub utilization: f64,
}

/// Rolling attempt state plus bounded snapshot history.
///
/// Owned exclusively by the manager behind a mutex; read access goes
/// through cloned-out snapshots.
#[derive(Debug)]
pub struct MetricsRecorder {
    latencies_ms: VecDeque<f64>,
    cumulative_errors: u64,
    history: VecDeque<PoolMetrics>,
    history_capacity: usize,
}

impl MetricsRecorder {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            latencies_ms: VecDeque::with_capacity(LATENCY_WINDOW),
            cumulative_errors: 0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    /// Record one attempt outcome. The only externally-driven mutation path.
    pub fn record_outcome(&mut self, latency_ms: f64, success: bool) {
        if self.latencies_ms.len() == LATENCY_WINDOW {
            self.latencies_ms.pop_front();
        }
        self.latencies_ms.push_back(latency_ms);
        if !success {
            self.cumulative_errors += 1;
        }
    }

    pub fn cumulative_errors(&self) -> u64 {
        self.cumulative_errors
    }

    /// Average latency over the rolling window, 0.0 with no attempts yet.
    pub fn avg_connection_time_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
    }

    /// Build a snapshot without touching the history.
    ///
    /// `active` is the manager's in-flight gauge, clamped to capacity so a
    /// burst of queued operations cannot report utilization above 1.0.
    pub fn snapshot(&self, active: usize, max_connections: usize) -> PoolMetrics {
        let active = active.min(max_connections);
        PoolMetrics {
            timestamp: Utc::now(),
            active_connections: active,
            idle_connections: max_connections - active,
            total_connections: max_connections,
            cumulative_errors: self.cumulative_errors,
            avg_connection_time_ms: self.avg_connection_time_ms(),
            utilization: active as f64 / max_connections as f64,
        }
    }

    /// Take a snapshot and append it, evicting the oldest at capacity.
    pub fn sample(&mut self, active: usize, max_connections: usize) -> PoolMetrics {
        let metrics = self.snapshot(active, max_connections);
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(metrics.clone());
        metrics
    }

    /// Clone out the history, most-recent-last.
    pub fn history(&self) -> Vec<PoolMetrics> {
        self.history.iter().cloned().collect()
    }

    /// Errors per sample over the last `window` samples.
    ///
    /// Computed as the cumulative-error delta across the window divided by
    /// the window length; 0.0 with fewer than two samples.
    pub fn recent_error_rate(&self, window: usize) -> f64 {
        let len = self.history.len();
        if len < 2 || window == 0 {
            return 0.0;
        }
        let take = window.min(len);
        let first = &self.history[len - take];
        let last = &self.history[len - 1];
        let delta = last.cumulative_errors.saturating_sub(first.cumulative_errors);
        delta as f64 / take as f64
    }
}
