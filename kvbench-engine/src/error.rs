use std::time::Duration;

use thiserror::Error;

/// Errors returned by a [`StoreClient`](crate::store::StoreClient).
///
/// None of these are fatal to a worker: they are logged, recorded as failed operations and the
/// loop carries on.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The call did not complete within the store's command timeout.
    #[error("store call timed out")]
    Timeout,

    /// All connection slots are in use; the call was rejected without being sent.
    #[error("store connection pool at capacity")]
    AtCapacity,

    /// An I/O error talking to the store.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error reported by the store backend.
    #[error("store backend error: {context}")]
    Backend {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wraps a backend-specific error with a short description of the failed call.
    pub fn backend<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            context: context.into(),
            cause: Box::new(cause),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Invalid engine configuration, detected before anything touches the store.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A rate is outside of `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    /// Read and update rates add up to more than 100%.
    #[error("read rate {read} and update rate {update} add up to more than 1.0")]
    RatesExceedOne { read: f64, update: f64 },

    /// More permits than the window has nanoseconds, which would disable limiting.
    #[error("rate limit of {permits} permits per {window:?} is finer than one nanosecond")]
    RateLimitTooFine { permits: u32, window: Duration },

    /// The burst allowance does not fit into a duration.
    #[error("rate limit burst {0} is too large for the window")]
    BurstOverflow(u32),

    /// A pool or worker count of zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Errors that abort [`Engine::boot`](crate::boot::Engine::boot).
///
/// When boot fails, no workers have been launched.
#[derive(Debug, Error)]
pub enum BootError {
    /// The engine configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The initial key discovery could not reach the store.
    #[error("failed to scan existing keys: {0}")]
    Scan(#[source] StoreError),

    /// There is nothing to read or update: the store is empty and no keys were requested.
    #[error("keyspace is empty after preset")]
    EmptyKeyspace,
}
