//! A load-generation engine for key-value stores.
//!
//! The engine drives a configurable, rate-limited mixture of reads and updates against a remote
//! store and reports per-operation latency to a [`MetricsSink`]. A run has two phases:
//!
//! - *Preset*: the store is scanned and any keys missing to reach the target dataset size are
//!   written with bounded concurrency. See [`PresetCoordinator`].
//! - *Steady state*: a pool of [`Worker`]s repeatedly picks a random key and reads or updates it,
//!   each worker gated by a [`RateLimiter`]. This runs until stopped.
//!
//! The store itself is abstracted behind [`StoreClient`], so the engine does not depend on any
//! topology, protocol or connection pooling. [`Engine`] sequences both phases and returns a
//! [`RunningEngine`] handle for stopping the workers.
#![warn(missing_debug_implementations)]

pub mod boot;
pub mod error;
pub mod keyspace;
pub mod metrics;
pub mod payload;
pub mod preset;
pub mod rate_limit;
pub mod report;
pub mod store;
pub mod worker;

pub use crate::boot::{Engine, EngineConfig, RunningEngine};
pub use crate::error::{BootError, ConfigError, StoreError, StoreResult};
pub use crate::keyspace::{Keyspace, KeyspaceManager};
pub use crate::metrics::{MetricsSink, OperationKind, OperationRecord, Outcome};
pub use crate::preset::PresetCoordinator;
pub use crate::rate_limit::{RateLimit, RateLimiter};
pub use crate::store::{InMemoryStore, Key, StoreClient};
pub use crate::worker::{OperationMix, Worker, WorkerStats};
