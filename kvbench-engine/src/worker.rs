//! The steady-state operation loop.
//!
//! Each [`Worker`] repeatedly waits for a rate-limit permit, picks a random key from the shared
//! [`Keyspace`], decides between a read and an update according to the [`OperationMix`], calls
//! the store and reports the timed outcome to the [`MetricsSink`](crate::metrics::MetricsSink).
//!
//! Calls of a single worker never overlap. Workers don't coordinate with each other except
//! through the read-only keyspace and an optionally shared [`RateLimiter`].

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::keyspace::Keyspace;
use crate::metrics::{BoxedSink, OperationKind, OperationRecord, Outcome};
use crate::payload::PayloadGenerator;
use crate::rate_limit::RateLimiter;
use crate::store::BoxedStore;

/// Tolerance for rates that add up to slightly more than one due to float rounding.
const RATE_EPSILON: f64 = 1e-9;

/// What a worker does in one iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Choice {
    Read,
    Update,
    /// The probability mass not covered by reads and updates: no call is made.
    Idle,
}

/// The probabilities of issuing a read or an update in each iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OperationMix {
    read: f64,
    update: f64,
}

impl OperationMix {
    /// Creates a mix from read and update probabilities.
    ///
    /// Both must be within `[0, 1]` and add up to at most `1`. Whatever remains is the
    /// probability of an [`Choice::Idle`] iteration.
    pub fn new(read: f64, update: f64) -> Result<Self, ConfigError> {
        for (name, value) in [("read rate", read), ("update rate", update)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        if read + update > 1.0 + RATE_EPSILON {
            return Err(ConfigError::RatesExceedOne { read, update });
        }
        Ok(Self { read, update })
    }

    /// Probability of an iteration that neither reads nor updates.
    pub fn idle_rate(&self) -> f64 {
        (1.0 - self.read - self.update).max(0.0)
    }

    /// Maps a uniform sample from `[0, 1)` to a choice.
    pub fn choose(&self, sample: f64) -> Choice {
        if sample < self.read {
            Choice::Read
        } else if sample < self.read + self.update {
            Choice::Update
        } else {
            Choice::Idle
        }
    }
}

impl Default for OperationMix {
    fn default() -> Self {
        Self {
            read: 0.25,
            update: 0.75,
        }
    }
}

/// Counters of a single worker, returned when the worker stops.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WorkerStats {
    /// Store calls issued, successful or not.
    pub attempted: u64,
    /// Read calls issued.
    pub reads: u64,
    /// Update calls issued.
    pub updates: u64,
    /// Store calls that returned an error.
    pub failures: u64,
    /// Iterations skipped because no rate-limit permit was granted in time.
    pub throttled: u64,
    /// Iterations that drew the idle slice of the mix.
    pub idle: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &Self) {
        self.attempted += other.attempted;
        self.reads += other.reads;
        self.updates += other.updates;
        self.failures += other.failures;
        self.throttled += other.throttled;
        self.idle += other.idle;
    }
}

/// A single steady-state worker.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    store: BoxedStore,
    sink: BoxedSink,
    keyspace: Keyspace,
    limiter: Arc<RateLimiter>,
    mix: OperationMix,
    payload: PayloadGenerator,
    rng: SmallRng,
    stats: WorkerStats,
}

impl Worker {
    /// Creates a worker with the default mix, 1 KiB payloads and a random seed.
    pub fn new(
        id: usize,
        store: BoxedStore,
        sink: BoxedSink,
        keyspace: Keyspace,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let seed = rand::random();
        Self {
            id,
            store,
            sink,
            keyspace,
            limiter,
            mix: OperationMix::default(),
            payload: PayloadGenerator::new(1024, seed),
            rng: SmallRng::seed_from_u64(seed),
            stats: WorkerStats::default(),
        }
    }

    /// The ratio between reads, updates and idle iterations.
    pub fn mix(mut self, mix: OperationMix) -> Self {
        self.mix = mix;
        self
    }

    /// Size of the values written by updates.
    pub fn payload_size(mut self, size: usize) -> Self {
        self.payload = PayloadGenerator::new(size, self.rng.random());
        self
    }

    /// Seeds key selection, the read/update decision and payload contents.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self.payload = PayloadGenerator::new(self.payload.size(), seed.wrapping_add(1));
        self
    }

    /// Runs the loop until `cancel` is triggered.
    ///
    /// Cancellation is observed between operations: a call in flight always completes and is
    /// reported, and no call is started once cancellation has been observed.
    pub async fn run(mut self, cancel: CancellationToken) -> WorkerStats {
        tracing::debug!(worker = self.id, "worker started");

        while !cancel.is_cancelled() {
            let acquired = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                acquired = self.limiter.acquire() => acquired,
            };

            if !acquired {
                self.stats.throttled += 1;
                continue;
            }

            self.step().await;
        }

        tracing::debug!(worker = self.id, stats = ?self.stats, "worker stopped");
        self.stats
    }

    async fn step(&mut self) {
        let Some(key) = self.keyspace.choose(&mut self.rng).map(str::to_owned) else {
            self.stats.idle += 1;
            return;
        };

        match self.mix.choose(self.rng.random()) {
            Choice::Read => self.read(key).await,
            Choice::Update => self.update(key).await,
            Choice::Idle => self.stats.idle += 1,
        }
    }

    async fn read(&mut self, key: String) {
        self.stats.reads += 1;

        let start = Instant::now();
        let result = self.store.get(&key).await;
        let latency = start.elapsed();

        let (outcome, bytes) = match result {
            Ok(value) => (Outcome::Success, value.map_or(0, |v| v.len() as u64)),
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    worker = self.id,
                    key = %key,
                    "read failed"
                );
                (Outcome::Failure, 0)
            }
        };

        self.report(OperationKind::Read, key, latency, outcome, bytes);
    }

    async fn update(&mut self, key: String) {
        self.stats.updates += 1;

        let value = self.payload.next_value();
        let size = value.len() as u64;

        let start = Instant::now();
        let result = self.store.set(&key, value).await;
        let latency = start.elapsed();

        let (outcome, bytes) = match result {
            Ok(()) => (Outcome::Success, size),
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    worker = self.id,
                    key = %key,
                    "update failed"
                );
                (Outcome::Failure, 0)
            }
        };

        self.report(OperationKind::Update, key, latency, outcome, bytes);
    }

    fn report(
        &mut self,
        kind: OperationKind,
        key: String,
        latency: std::time::Duration,
        outcome: Outcome,
        bytes: u64,
    ) {
        self.stats.attempted += 1;
        if !outcome.is_success() {
            self.stats.failures += 1;
        }

        self.sink.record(&OperationRecord {
            kind,
            key,
            latency,
            outcome,
            bytes,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_respects_boundaries() {
        let mix = OperationMix::new(0.25, 0.5).unwrap();
        assert_eq!(mix.choose(0.0), Choice::Read);
        assert_eq!(mix.choose(0.2499), Choice::Read);
        assert_eq!(mix.choose(0.25), Choice::Update);
        assert_eq!(mix.choose(0.7499), Choice::Update);
        assert_eq!(mix.choose(0.75), Choice::Idle);
        assert_eq!(mix.choose(0.9999), Choice::Idle);
        assert!((mix.idle_rate() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn mix_converges_to_configured_rates() {
        let mix = OperationMix::new(0.25, 0.75).unwrap();
        let mut rng = SmallRng::seed_from_u64(1234);

        let iterations = 100_000;
        let (mut reads, mut updates, mut idle) = (0, 0, 0);
        for _ in 0..iterations {
            match mix.choose(rng.random()) {
                Choice::Read => reads += 1,
                Choice::Update => updates += 1,
                Choice::Idle => idle += 1,
            }
        }

        let read_ratio = reads as f64 / iterations as f64;
        let update_ratio = updates as f64 / iterations as f64;
        assert!((read_ratio - 0.25).abs() < 0.01, "read ratio {read_ratio}");
        assert!((update_ratio - 0.75).abs() < 0.01, "update ratio {update_ratio}");
        assert_eq!(idle, 0);
    }

    #[test]
    fn invalid_mixes_are_rejected() {
        assert_eq!(
            OperationMix::new(0.6, 0.6),
            Err(ConfigError::RatesExceedOne {
                read: 0.6,
                update: 0.6
            })
        );
        assert!(matches!(
            OperationMix::new(-0.1, 0.5),
            Err(ConfigError::RateOutOfRange { name: "read rate", .. })
        ));
        assert!(matches!(
            OperationMix::new(0.1, 1.5),
            Err(ConfigError::RateOutOfRange { name: "update rate", .. })
        ));
        assert!(matches!(
            OperationMix::new(0.5, f64::NAN),
            Err(ConfigError::RateOutOfRange { .. })
        ));

        // Float rounding must not reject mixes that add up to one.
        assert!(OperationMix::new(0.1, 0.9).is_ok());
        assert!(OperationMix::new(0.7, 0.3).is_ok());
    }

    #[test]
    fn stats_merge() {
        let mut total = WorkerStats::default();
        let one = WorkerStats {
            attempted: 3,
            reads: 1,
            updates: 2,
            failures: 1,
            throttled: 4,
            idle: 5,
        };
        total.merge(&one);
        total.merge(&one);
        assert_eq!(total.attempted, 6);
        assert_eq!(total.idle, 10);
    }
}
