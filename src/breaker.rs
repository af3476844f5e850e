//! Circuit breaker state machine.
//!
//! Guards whether operations are admitted at all, based on consecutive
//! failure counting and a cooldown timer. Trips after too many consecutive
//! failures to avoid amplifying load on an already-struggling backend.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; requests are admitted.
    Closed,
    /// Too many consecutive failures; requests rejected until cooldown expires.
    Open,
    /// Probing state: one trial request decides whether to close or re-open.
    HalfOpen,
}

/// Three-state circuit breaker.
///
/// State transitions are internal bookkeeping, never errors; callers only
/// observe them through [`can_execute`](Self::can_execute) and the health
/// report. When constructed disabled, the breaker is fully bypassed:
/// `can_execute` is constantly true and outcome reporting is a no-op.
#[derive(Debug)]
pub struct CircuitBreaker {
    enabled: bool,
    threshold: u32,
    cooldown: Duration,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(enabled: bool, threshold: u32, cooldown: Duration) -> Self {
        Self {
            enabled,
            threshold,
            cooldown,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Current state, for health reporting.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether an operation may proceed.
    ///
    /// In `Open`, an elapsed cooldown transitions to `HalfOpen` as a side
    /// effect of the check and admits exactly that one probing request.
    pub fn can_execute(&mut self) -> bool {
        if !self.enabled {
            return true;
        }
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    info!("Circuit breaker cooldown expired, probing with one request");
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful operation.
    pub fn on_success(&mut self) {
        if !self.enabled {
            return;
        }
        self.consecutive_failures = 0;
        if self.state == CircuitState::HalfOpen {
            info!("Circuit breaker probe succeeded, closing");
            self.state = CircuitState::Closed;
            self.opened_at = None;
        }
    }

    /// Record a failed operation.
    ///
    /// From `HalfOpen` a single failure re-opens immediately with a fresh
    /// cooldown clock. From `Closed` the breaker trips once the consecutive
    /// failure count reaches the threshold.
    pub fn on_failure(&mut self) {
        if !self.enabled {
            return;
        }
        self.consecutive_failures += 1;
        match self.state {
            CircuitState::HalfOpen => {
                warn!("Circuit breaker probe failed, re-opening");
                self.trip();
            }
            CircuitState::Closed if self.consecutive_failures >= self.threshold => {
                warn!(
                    failures = self.consecutive_failures,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "Circuit breaker tripped"
                );
                self.trip();
            }
            _ => {}
        }
    }

    /// Administrative override: force `Closed`, zero failures, clear the
    /// cooldown clock. For manual recovery after a known-resolved incident.
    pub fn reset(&mut self) {
        info!("Circuit breaker manually reset");
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Adopt new settings while preserving current state and counters.
    /// Used when the active profile is swapped at runtime.
    pub fn reconfigure(&mut self, enabled: bool, threshold: u32, cooldown: Duration) {
        self.enabled = enabled;
        self.threshold = threshold;
        self.cooldown = cooldown;
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
    }
}
