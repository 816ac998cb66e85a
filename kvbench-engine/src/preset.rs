//! Bulk population of missing keys before steady state begins.

use std::sync::Mutex;
use std::time::Instant;

use futures::StreamExt;

use crate::error::ConfigError;
use crate::metrics::{BoxedSink, OperationKind, OperationRecord, Outcome};
use crate::payload::PayloadGenerator;
use crate::store::{BoxedStore, Key};

/// Outcome of a preset batch.
#[derive(Debug, Default)]
pub struct PresetReport {
    /// Keys that were written successfully.
    pub written: Vec<Key>,
    /// Number of writes that failed.
    pub failed: usize,
}

/// Writes one value per key with bounded concurrency.
#[derive(Debug)]
pub struct PresetCoordinator {
    store: BoxedStore,
    sink: BoxedSink,
    concurrency: usize,
    payload_size: usize,
}

impl PresetCoordinator {
    pub fn new(
        store: BoxedStore,
        sink: BoxedSink,
        concurrency: usize,
        payload_size: usize,
    ) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::Zero("preset concurrency"));
        }

        Ok(Self {
            store,
            sink,
            concurrency,
            payload_size,
        })
    }

    /// Writes every key in `keys` and waits until all writes have completed or failed.
    ///
    /// At most `concurrency` writes are in flight at any time. A failed write is logged and
    /// reported but does not abort the batch.
    pub async fn preset_all(&self, keys: Vec<Key>) -> PresetReport {
        if keys.is_empty() {
            return PresetReport::default();
        }

        let total = keys.len();
        tracing::info!(keys = total, concurrency = self.concurrency, "presetting keys");

        let payloads = Mutex::new(PayloadGenerator::new(self.payload_size, rand::random()));
        let report = Mutex::new(PresetReport {
            written: Vec::with_capacity(total),
            failed: 0,
        });

        futures::stream::iter(keys)
            .for_each_concurrent(self.concurrency, |key| {
                let payloads = &payloads;
                let report = &report;
                async move {
                    let value = payloads.lock().unwrap().next_value();
                    let size = value.len() as u64;

                    let start = Instant::now();
                    let result = self.store.set(&key, value).await;
                    let latency = start.elapsed();

                    let (outcome, bytes) = match result {
                        Ok(()) => (Outcome::Success, size),
                        Err(err) => {
                            tracing::warn!(
                                error = &err as &dyn std::error::Error,
                                key = %key,
                                "preset write failed"
                            );
                            (Outcome::Failure, 0)
                        }
                    };

                    self.sink.record(&OperationRecord {
                        kind: OperationKind::Preset,
                        key: key.clone(),
                        latency,
                        outcome,
                        bytes,
                    });

                    let mut report = report.lock().unwrap();
                    match outcome {
                        Outcome::Success => report.written.push(key),
                        Outcome::Failure => report.failed += 1,
                    }
                }
            })
            .await;

        let report = report.into_inner().unwrap();
        tracing::info!(
            written = report.written.len(),
            failed = report.failed,
            "preset finished"
        );
        report
    }
}
