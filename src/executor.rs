//! Query executor abstraction.
//!
//! The pool manager never talks to a database directly; it wraps an
//! implementation of [`QueryExecutor`] and treats any non-success outcome
//! uniformly as a failure for breaker and metrics purposes, regardless of
//! the underlying error's semantic category.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Opaque query result rows.
///
/// This layer never inspects row contents; rows are carried through as
/// JSON values so any driver can adapt into them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rows(Vec<serde_json::Value>);

impl Rows {
    pub fn new(rows: Vec<serde_json::Value>) -> Self {
        Self(rows)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<serde_json::Value> {
        self.0
    }
}

/// Capability this layer depends on: execute a query, return rows or an
/// error. Physical connection management (sockets, keep-alive, statement
/// caching) lives behind this trait.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Rows>;
}
