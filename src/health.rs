//! Derived pool health status.
//!
//! Evaluation is a pure function of the latest metrics snapshot, the
//! recent error rate and the breaker state. Nothing is stored; callers
//! recompute on demand.

use serde::Serialize;

use crate::breaker::CircuitState;
use crate::metrics::PoolMetrics;

/// Tri-level health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

/// Overridable evaluation thresholds.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    /// Utilization above this is critical.
    pub utilization_critical: f64,
    /// Utilization above this (up to critical) is a warning.
    pub utilization_warning: f64,
    /// Recent errors-per-sample above this is at least a warning.
    pub error_rate_warning: f64,
    /// Samples considered for the recent error rate.
    pub error_window: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            utilization_critical: 0.95,
            utilization_warning: 0.8,
            error_rate_warning: 0.05,
            error_window: 10,
        }
    }
}

/// Health report for dashboards and health-check endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthLevel,
    pub message: String,
    pub metrics: PoolMetrics,
    pub recommendations: Vec<String>,
}

/// Evaluate health from a snapshot, the recent error rate and breaker state.
///
/// When several rules match, the highest severity wins and the
/// recommendations of every matching rule are concatenated, deduplicated.
pub fn evaluate(
    metrics: PoolMetrics,
    error_rate: f64,
    breaker_state: CircuitState,
    thresholds: &HealthThresholds,
) -> HealthStatus {
    let mut status = HealthLevel::Healthy;
    let mut messages: Vec<String> = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();

    let high_utilization = metrics.utilization > thresholds.utilization_warning;

    if metrics.utilization > thresholds.utilization_critical {
        status = status.max(HealthLevel::Critical);
        messages.push(format!(
            "pool utilization critical at {:.0}%",
            metrics.utilization * 100.0
        ));
        recommendations.push("increase max_connections to add capacity".into());
        recommendations.push("add result caching for hot queries".into());
        recommendations.push("audit slow queries holding connections".into());
    } else if high_utilization {
        status = status.max(HealthLevel::Warning);
        messages.push(format!(
            "pool utilization elevated at {:.0}%",
            metrics.utilization * 100.0
        ));
        recommendations.push("review pool capacity against current load".into());
    }

    if error_rate > thresholds.error_rate_warning {
        // Sustained errors alone warrant a warning; combined with pressure
        // on the pool the situation is critical.
        let level = if high_utilization {
            HealthLevel::Critical
        } else {
            HealthLevel::Warning
        };
        status = status.max(level);
        messages.push(format!(
            "error rate {:.2} per sample over recent window",
            error_rate
        ));
        recommendations.push("inspect recent query failures in logs".into());
    }

    if breaker_state == CircuitState::Open {
        status = status.max(HealthLevel::Critical);
        messages.push("circuit breaker open, operations are being rejected".into());
        recommendations.push("check database connectivity and recent deployments".into());
    }

    let message = if messages.is_empty() {
        "pool is healthy".into()
    } else {
        messages.join("; ")
    };

    dedup_preserving_order(&mut recommendations);

    HealthStatus {
        status,
        message,
        metrics,
        recommendations,
    }
}

/// Drop repeated recommendations wherever they appear, keeping first
/// occurrences in order.
fn dedup_preserving_order(recommendations: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    recommendations.retain(|r| seen.insert(r.clone()));
}
