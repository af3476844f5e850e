//! Mock [`QueryExecutor`] implementations for testing.
//!
//! [`ScriptedExecutor`] — pre-loaded per-call results with a shared call
//! counter. Best for: retry behavior, breaker transitions, error handling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::executor::{QueryExecutor, Rows};

/// A mock executor with a scripted queue of results.
///
/// Each call pops the next result from the queue; when the queue is
/// exhausted, calls return `Ok(Rows::empty())` — or a connection error if
/// built with [`always_failing`](Self::always_failing). An optional
/// per-call delay simulates query latency.
pub struct ScriptedExecutor {
    results: Mutex<VecDeque<Result<Rows>>>,
    call_count: Arc<AtomicU32>,
    delay: Option<Duration>,
    always_fail: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            call_count: Arc::new(AtomicU32::new(0)),
            delay: None,
            always_fail: false,
        }
    }

    /// Executor that fails every call with a connection error.
    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new()
        }
    }

    pub fn with_results(self, results: Vec<Result<Rows>>) -> Self {
        *self.results.lock() = results.into();
        self
    }

    /// Simulate per-query latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter for asserting how many times the executor ran.
    pub fn counter(&self) -> Arc<AtomicU32> {
        self.call_count.clone()
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, _query: &str) -> Result<Rows> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.results.lock().pop_front() {
            Some(result) => result,
            None if self.always_fail => Err(Error::Connection("scripted failure".to_string())),
            None => Ok(Rows::empty()),
        }
    }
}
