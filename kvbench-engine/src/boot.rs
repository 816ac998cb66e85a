//! Sequencing of a benchmark run: discover, preset, launch, stop.
//!
//! [`Engine::boot`] runs the whole startup sequence:
//!
//! 1. Scan the store for keys that already exist.
//! 2. Compute how many keys are missing to reach the target dataset size.
//! 3. Generate and write the missing keys with bounded concurrency.
//! 4. Merge existing and newly written keys into an immutable [`Keyspace`].
//! 5. Launch one [`Worker`] per configured thread on that keyspace.
//!
//! The returned [`RunningEngine`] is the only handle to the workers. Dropping it without calling
//! [`RunningEngine::stop`] leaves them running until the runtime shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{BootError, ConfigError};
use crate::keyspace::{self, Keyspace, KeyspaceManager};
use crate::metrics::BoxedSink;
use crate::preset::PresetCoordinator;
use crate::rate_limit::{RateLimit, RateLimiter};
use crate::store::{BoxedStore, Key};
use crate::worker::{OperationMix, Worker, WorkerStats};

/// Parameters of a benchmark run.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of keys the keyspace should contain after boot.
    pub data_set_size: usize,
    /// Size in bytes of every value written by preset and update operations.
    pub data_size: usize,
    /// Number of steady-state workers.
    pub threads: usize,
    /// Maximum number of concurrent preset writes.
    pub preset_threads: usize,
    /// Throughput ceiling applied to each worker, or to all of them if `shared_rate_limit`.
    pub rate_limit: RateLimit,
    /// Share one rate limiter across all workers instead of one per worker.
    pub shared_rate_limit: bool,
    /// Probability of a read in each iteration.
    pub read_rate: f64,
    /// Probability of an update in each iteration.
    pub update_rate: f64,
    /// Prefix of generated keys.
    pub key_prefix: String,
    /// Number of keys requested per scan round trip.
    pub scan_count: usize,
    /// Re-scan the store after presetting and warn if the key count misses the target.
    pub verify_preset: bool,
    /// Seed for worker RNGs. Random if `None`.
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Checks the configuration and builds the operation mix.
    pub fn validate(&self) -> Result<OperationMix, ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Zero("threads"));
        }
        if self.preset_threads == 0 {
            return Err(ConfigError::Zero("preset threads"));
        }
        if self.scan_count == 0 {
            return Err(ConfigError::Zero("scan count"));
        }
        self.rate_limit.validate()?;
        OperationMix::new(self.read_rate, self.update_rate)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_set_size: 100_000,
            data_size: 1024,
            threads: 100,
            preset_threads: 100,
            rate_limit: RateLimit::default(),
            shared_rate_limit: false,
            read_rate: 0.25,
            update_rate: 0.75,
            key_prefix: keyspace::DEFAULT_KEY_PREFIX.to_owned(),
            scan_count: 1000,
            verify_preset: true,
            seed: None,
        }
    }
}

/// Drives a benchmark against one store.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    mix: OperationMix,
    store: BoxedStore,
    sink: BoxedSink,
    keys: KeyspaceManager,
}

impl Engine {
    /// Creates an engine, rejecting invalid configurations before anything touches the store.
    pub fn new(
        config: EngineConfig,
        store: BoxedStore,
        sink: BoxedSink,
    ) -> Result<Self, ConfigError> {
        let mix = config.validate()?;
        if mix.idle_rate() > 0.0 {
            tracing::warn!(
                idle_rate = mix.idle_rate(),
                "read and update rates leave an idle slice, those iterations make no store call"
            );
        }

        let keys = KeyspaceManager::new(config.key_prefix.clone());
        Ok(Self {
            config,
            mix,
            store,
            sink,
            keys,
        })
    }

    /// Brings the store up to the target dataset size and launches the workers.
    pub async fn boot(&self) -> Result<RunningEngine, BootError> {
        let keyspace = self.prepare_keyspace().await?;
        Ok(self.launch(keyspace))
    }

    /// Discovers existing keys, presets the missing ones and returns the merged keyspace.
    ///
    /// Only keys that exist are part of the keyspace: failed preset writes are left out.
    pub async fn prepare_keyspace(&self) -> Result<Keyspace, BootError> {
        tracing::info!(store = self.store.name(), "scanning existing keys");
        let observed = self
            .store
            .scan_all_keys(self.config.scan_count)
            .await
            .map_err(BootError::Scan)?;
        tracing::info!(keys = observed.len(), "current key count");
        tracing::debug!(?observed, "existing keys");

        let shortfall = keyspace::compute_shortfall(self.config.data_set_size, observed.len());
        let mut keys: Vec<Key> = Vec::with_capacity(observed.len() + shortfall);

        if shortfall > 0 {
            let missing = self.keys.generate_ids(shortfall, &observed);
            let coordinator = PresetCoordinator::new(
                Arc::clone(&self.store),
                Arc::clone(&self.sink),
                self.config.preset_threads,
                self.config.data_size,
            )?;
            let report = coordinator.preset_all(missing).await;
            keys.extend(report.written);

            if self.config.verify_preset {
                self.verify(observed.len() + keys.len()).await;
            }
        }

        keys.extend(observed);
        tracing::info!(keys = keys.len(), "keyspace ready");

        if keys.is_empty() {
            return Err(BootError::EmptyKeyspace);
        }
        Ok(Keyspace::from(keys))
    }

    async fn verify(&self, expected: usize) {
        match self.store.scan_all_keys(self.config.scan_count).await {
            Ok(found) if found.len() >= self.config.data_set_size => {
                tracing::debug!(keys = found.len(), "preset verified");
            }
            Ok(found) => tracing::warn!(
                found = found.len(),
                expected,
                target = self.config.data_set_size,
                "store holds fewer keys than the target after preset"
            ),
            Err(err) => tracing::warn!(
                error = &err as &dyn std::error::Error,
                "failed to verify preset"
            ),
        }
    }

    /// Spawns one worker per configured thread on the given keyspace.
    pub fn launch(&self, keyspace: Keyspace) -> RunningEngine {
        let cancel = CancellationToken::new();
        let shared = self
            .config
            .shared_rate_limit
            .then(|| Arc::new(RateLimiter::new(self.config.rate_limit)));

        let mut workers = JoinSet::new();
        for id in 0..self.config.threads {
            let limiter = shared
                .clone()
                .unwrap_or_else(|| Arc::new(RateLimiter::new(self.config.rate_limit)));

            let mut worker = Worker::new(
                id,
                Arc::clone(&self.store),
                Arc::clone(&self.sink),
                keyspace.clone(),
                limiter,
            )
            .mix(self.mix)
            .payload_size(self.config.data_size);
            if let Some(seed) = self.config.seed {
                worker = worker.seed(seed.wrapping_add(id as u64));
            }

            workers.spawn(worker.run(cancel.clone()));
        }

        tracing::info!(
            workers = self.config.threads,
            keys = keyspace.len(),
            "workers launched"
        );

        RunningEngine {
            cancel,
            workers,
            keyspace,
        }
    }
}

/// Handle to the workers of a booted engine.
#[derive(Debug)]
pub struct RunningEngine {
    cancel: CancellationToken,
    workers: JoinSet<WorkerStats>,
    keyspace: Keyspace,
}

impl RunningEngine {
    /// The keyspace the workers operate on.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Signals all workers to stop and waits for them to finish their in-flight calls.
    ///
    /// Returns the merged statistics of all workers.
    pub async fn stop(self) -> WorkerStats {
        self.cancel.cancel();
        self.join().await
    }

    /// Like [`stop`](Self::stop), but aborts workers that have not finished within `timeout`.
    ///
    /// Statistics of aborted workers are lost.
    pub async fn stop_timeout(mut self, timeout: Duration) -> WorkerStats {
        self.cancel.cancel();

        let mut total = WorkerStats::default();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = self.workers.join_next() => match joined {
                    Some(result) => merge_result(&mut total, result),
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        remaining = self.workers.len(),
                        "workers did not stop in time, aborting"
                    );
                    self.workers.abort_all();
                    while self.workers.join_next().await.is_some() {}
                    break;
                }
            }
        }

        total
    }

    async fn join(mut self) -> WorkerStats {
        let mut total = WorkerStats::default();
        while let Some(result) = self.workers.join_next().await {
            merge_result(&mut total, result);
        }
        total
    }
}

fn merge_result(total: &mut WorkerStats, result: Result<WorkerStats, tokio::task::JoinError>) {
    match result {
        Ok(stats) => total.merge(&stats),
        Err(err) => tracing::error!(error = &err as &dyn std::error::Error, "worker panicked"),
    }
}

