//! Emission of per-operation observations.
//!
//! Every store call made by the engine produces one [`OperationRecord`], handed to a
//! [`MetricsSink`] right after the call returns. Sinks must be cheap and must never block the
//! calling worker for longer than a short critical section.
//!
//! Two sinks are provided:
//!  - [`SketchSink`] aggregates latencies into [`DDSketch`]es in-process, for progress logs and
//!    the final summary.
//!  - [`MerniSink`] forwards every observation to the globally installed `merni` recorder.
//!
//! A pair of sinks `(A, B)` is itself a sink that forwards to both.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sketches_ddsketch::DDSketch;

/// The kind of store operation that was performed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperationKind {
    /// A `get` issued during steady state.
    Read,
    /// A `set` issued during steady state.
    Update,
    /// A `set` issued while populating missing keys.
    Preset,
}

impl OperationKind {
    /// Returns the lowercase name used for metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Update => "update",
            Self::Preset => "preset",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a store call succeeded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A single observed store call.
#[derive(Clone, Debug)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub key: String,
    pub latency: Duration,
    pub outcome: Outcome,
    /// Payload bytes moved by the call, zero for failed calls and missing reads.
    pub bytes: u64,
}

/// A destination for [`OperationRecord`]s.
pub trait MetricsSink: fmt::Debug + Send + Sync + 'static {
    /// Records one operation. Must not block indefinitely.
    fn record(&self, record: &OperationRecord);
}

/// A type-erased, shareable [`MetricsSink`].
pub type BoxedSink = Arc<dyn MetricsSink>;

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn record(&self, record: &OperationRecord) {
        (**self).record(record)
    }
}

impl<A: MetricsSink, B: MetricsSink> MetricsSink for (A, B) {
    fn record(&self, record: &OperationRecord) {
        self.0.record(record);
        self.1.record(record);
    }
}

/// Forwards observations to the `merni` recorder.
///
/// Emits an `op.latency` distribution for successful calls and an `op.count` counter for every
/// call, both tagged with `op` and `outcome`. Without an installed recorder this is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct MerniSink;

impl MetricsSink for MerniSink {
    fn record(&self, record: &OperationRecord) {
        let op = record.kind.as_str();
        let outcome = record.outcome.as_str();

        merni::counter!("op.count": 1, "op" => op, "outcome" => outcome);
        if record.outcome.is_success() {
            merni::distribution!("op.latency"@s: record.latency, "op" => op);
            merni::distribution!("op.size"@b: record.bytes, "op" => op);
        }
    }
}

/// Aggregated metrics for one [`OperationKind`].
#[derive(Clone, Default)]
pub struct OperationMetrics {
    /// Latencies of successful calls, in seconds.
    pub timing: DDSketch,
    /// Number of failed calls.
    pub failures: u64,
    /// Total payload bytes moved by successful calls.
    pub bytes: u64,
}

impl OperationMetrics {
    /// Number of successful calls.
    pub fn successes(&self) -> u64 {
        self.timing.count() as u64
    }

    fn merge(&mut self, other: &Self) {
        // Both sketches use the default config, so merging cannot fail.
        self.timing.merge(&other.timing).ok();
        self.failures += other.failures;
        self.bytes += other.bytes;
    }
}

impl fmt::Debug for OperationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationMetrics")
            .field("successes", &self.successes())
            .field("failures", &self.failures)
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// A point-in-time copy of everything a [`SketchSink`] has aggregated.
#[derive(Clone, Debug, Default)]
pub struct MetricsSnapshot {
    pub read: OperationMetrics,
    pub update: OperationMetrics,
    pub preset: OperationMetrics,
}

impl MetricsSnapshot {
    /// Returns the metrics of one operation kind.
    pub fn get(&self, kind: OperationKind) -> &OperationMetrics {
        match kind {
            OperationKind::Read => &self.read,
            OperationKind::Update => &self.update,
            OperationKind::Preset => &self.preset,
        }
    }

    fn get_mut(&mut self, kind: OperationKind) -> &mut OperationMetrics {
        match kind {
            OperationKind::Read => &mut self.read,
            OperationKind::Update => &mut self.update,
            OperationKind::Preset => &mut self.preset,
        }
    }

    /// Merges another snapshot into this one.
    pub fn merge(&mut self, other: &Self) {
        self.read.merge(&other.read);
        self.update.merge(&other.update);
        self.preset.merge(&other.preset);
    }
}

/// Number of independently locked partial aggregates in a [`SketchSink`].
const SHARDS: usize = 16;

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// The shard records from this thread go to. Threads are spread round-robin.
    static SHARD: usize = NEXT_SHARD.fetch_add(1, Ordering::Relaxed) % SHARDS;
}

/// Aggregates observations into latency sketches per operation kind.
///
/// Records are aggregated into one of several shards, picked by the recording thread, so
/// concurrent workers rarely contend on the same lock. Shards are merged when reading.
///
/// The sink is [`Clone`]; clones share the same underlying state.
#[derive(Clone, Debug, Default)]
pub struct SketchSink {
    shards: Arc<[Mutex<MetricsSnapshot>; SHARDS]>,
}

impl SketchSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current aggregates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for shard in self.shards.iter() {
            snapshot.merge(&shard.lock().unwrap());
        }
        snapshot
    }

    /// Returns the current aggregates and resets the sink.
    ///
    /// Every record ends up in exactly one call to `take`.
    pub fn take(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for shard in self.shards.iter() {
            let taken = std::mem::take(&mut *shard.lock().unwrap());
            snapshot.merge(&taken);
        }
        snapshot
    }
}

impl MetricsSink for SketchSink {
    fn record(&self, record: &OperationRecord) {
        let shard = SHARD.with(|shard| *shard);
        let mut inner = self.shards[shard].lock().unwrap();
        let metrics = inner.get_mut(record.kind);
        match record.outcome {
            Outcome::Success => {
                metrics.timing.add(record.latency.as_secs_f64());
                metrics.bytes += record.bytes;
            }
            Outcome::Failure => metrics.failures += 1,
        }
    }
}
