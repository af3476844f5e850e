//! Trend classification over the metrics history.
//!
//! Splits the history into first and second halves by index and compares
//! per-half aggregates. A metric counts as increasing or decreasing when
//! the second half differs from the first by more than 5% relative change.

use serde::Serialize;

use crate::metrics::PoolMetrics;

/// Relative change beyond which a metric is no longer considered stable.
const STABILITY_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Direction of the three tracked series.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolTrends {
    pub utilization: TrendDirection,
    /// Based on new errors per half, not the monotonic running total.
    pub errors: TrendDirection,
    /// Based on average connection time; increasing means getting slower.
    pub performance: TrendDirection,
}

impl PoolTrends {
    fn stable() -> Self {
        Self {
            utilization: TrendDirection::Stable,
            errors: TrendDirection::Stable,
            performance: TrendDirection::Stable,
        }
    }
}

/// Classify trends over the history, most-recent-last.
///
/// Fewer than two samples is insufficient data and yields all-stable,
/// not an error.
pub fn analyze(history: &[PoolMetrics]) -> PoolTrends {
    if history.len() < 2 {
        return PoolTrends::stable();
    }

    let mid = history.len() / 2;
    let (first, second) = history.split_at(mid);

    let avg = |samples: &[PoolMetrics], f: fn(&PoolMetrics) -> f64| -> f64 {
        samples.iter().map(f).sum::<f64>() / samples.len() as f64
    };

    // Cumulative error counts only ever grow, so compare the delta each
    // half contributed instead of the raw totals.
    let errors_in = |samples: &[PoolMetrics]| -> f64 {
        let first = samples.first().map(|m| m.cumulative_errors).unwrap_or(0);
        let last = samples.last().map(|m| m.cumulative_errors).unwrap_or(0);
        last.saturating_sub(first) as f64
    };

    PoolTrends {
        utilization: classify(
            avg(first, |m| m.utilization),
            avg(second, |m| m.utilization),
        ),
        errors: classify(errors_in(first), errors_in(second)),
        performance: classify(
            avg(first, |m| m.avg_connection_time_ms),
            avg(second, |m| m.avg_connection_time_ms),
        ),
    }
}

fn classify(first: f64, second: f64) -> TrendDirection {
    if first == 0.0 {
        return if second > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Stable
        };
    }
    let relative = (second - first) / first;
    if relative > STABILITY_BAND {
        TrendDirection::Increasing
    } else if relative < -STABILITY_BAND {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}
