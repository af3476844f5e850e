use thiserror::Error;

/// Configuration-related errors with structured variants.
///
/// Raised once at construction time; a manager never starts with an
/// invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The circuit breaker is open and the operation was rejected without
    /// being attempted. Distinguishable from a real backend failure so
    /// callers can tell "the database is erroring" apart from "we are
    /// shedding load on purpose".
    #[error("circuit breaker open, operation '{operation}' rejected")]
    CircuitOpen { operation: String },

    /// Terminal failure after all retry attempts were exhausted. The last
    /// underlying cause is chained, never swallowed.
    #[error("operation '{operation}' failed after {attempts} attempts: {source}")]
    Operation {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The manager shut down while the operation was waiting to retry.
    #[error("operation '{operation}' aborted by shutdown")]
    Aborted { operation: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the fast-fail rejection produced by an open breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// True when the operation was cancelled by shutdown.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}
