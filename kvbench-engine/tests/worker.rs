//! Blackbox tests for the steady-state worker loop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use kvbench_engine::metrics::SketchSink;
use kvbench_engine::{InMemoryStore, Keyspace, OperationMix, RateLimit, RateLimiter, Worker};
use tokio_util::sync::CancellationToken;

use common::{FlakyStore, GatedStore};

fn keyspace(size: usize) -> Keyspace {
    (0..size).map(|i| format!("key-{i}")).collect()
}

fn unlimited() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimit::unlimited()))
}

#[tokio::test]
async fn test_failures_do_not_stop_the_worker() {
    kvbench_test::tracing::init();

    const FAILURES: u64 = 5;
    const SUCCESSES: u64 = 20;

    let cancel = CancellationToken::new();
    let store = Arc::new(
        FlakyStore::new(InMemoryStore::with_keys(keyspace(4).iter().cloned()), FAILURES)
            .stop_after(FAILURES + SUCCESSES, cancel.clone()),
    );
    let sink = SketchSink::new();

    let worker = Worker::new(0, store.clone(), Arc::new(sink.clone()), keyspace(4), unlimited())
        .seed(7)
        .payload_size(8);
    let stats = worker.run(cancel).await;

    assert_eq!(stats.attempted, FAILURES + SUCCESSES);
    assert_eq!(stats.failures, FAILURES);
    assert_eq!(store.calls(), FAILURES + SUCCESSES);

    let snapshot = sink.snapshot();
    let successes = snapshot.read.successes() + snapshot.update.successes();
    let failures = snapshot.read.failures + snapshot.update.failures;
    assert_eq!(successes, SUCCESSES);
    assert_eq!(failures, FAILURES);
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_call() {
    let store = Arc::new(GatedStore::default());
    let sink = SketchSink::new();
    let cancel = CancellationToken::new();

    let worker = Worker::new(0, store.clone(), Arc::new(sink.clone()), keyspace(3), unlimited())
        .mix(OperationMix::new(1.0, 0.0).unwrap());
    let handle = tokio::spawn(worker.run(cancel.clone()));

    store.entered.notified().await;
    cancel.cancel();

    // The call is still blocked, so the worker cannot have finished.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.is_finished());

    store.release.notify_one();
    let stats = handle.await.unwrap();

    assert_eq!(stats.attempted, 1);
    assert_eq!(store.started(), 1);
    assert_eq!(store.completed(), 1);
    assert_eq!(sink.snapshot().read.successes(), 1);
}

#[tokio::test]
async fn test_cancelled_worker_makes_no_calls() {
    let store = InMemoryStore::with_keys(keyspace(3).iter().cloned());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let worker = Worker::new(
        0,
        Arc::new(store.clone()),
        Arc::new(SketchSink::new()),
        keyspace(3),
        unlimited(),
    );
    let stats = worker.run(cancel).await;

    assert_eq!(stats.attempted, 0);
    assert_eq!(store.get_calls() + store.set_calls(), 0);
}

#[tokio::test]
async fn test_mix_ratio() {
    const CALLS: u64 = 20_000;

    let cancel = CancellationToken::new();
    let store = Arc::new(
        FlakyStore::new(InMemoryStore::with_keys(keyspace(16).iter().cloned()), 0)
            .stop_after(CALLS, cancel.clone()),
    );

    let sink = Arc::new(SketchSink::new());
    let worker = Worker::new(0, store.clone(), sink, keyspace(16), unlimited())
        .mix(OperationMix::new(0.25, 0.75).unwrap())
        .payload_size(4)
        .seed(1);
    let stats = worker.run(cancel).await;

    assert_eq!(stats.attempted, CALLS);
    let read_ratio = stats.reads as f64 / CALLS as f64;
    assert!((read_ratio - 0.25).abs() < 0.02, "read ratio {read_ratio}");
    assert_eq!(stats.reads + stats.updates, CALLS);
    assert_eq!(store.inner.get_calls(), stats.reads);
    assert_eq!(store.inner.set_calls(), stats.updates);
}

#[tokio::test]
async fn test_idle_slice_makes_no_calls() {
    let store = InMemoryStore::with_keys(keyspace(2).iter().cloned());
    let cancel = CancellationToken::new();

    let worker = Worker::new(
        0,
        Arc::new(store.clone()),
        Arc::new(SketchSink::new()),
        keyspace(2),
        unlimited(),
    )
    .mix(OperationMix::new(0.0, 0.0).unwrap());
    let handle = tokio::spawn(worker.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    let stats = handle.await.unwrap();

    assert!(stats.idle > 0);
    assert_eq!(stats.attempted, 0);
    assert_eq!(store.get_calls() + store.set_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_worker() {
    let store = InMemoryStore::with_keys(keyspace(4).iter().cloned());
    let cancel = CancellationToken::new();
    let limiter = Arc::new(RateLimiter::new(RateLimit {
        permits: 10,
        window: Duration::from_secs(1),
        timeout: Duration::from_millis(2),
        burst: 0,
    }));

    let worker = Worker::new(
        0,
        Arc::new(store.clone()),
        Arc::new(SketchSink::new()),
        keyspace(4),
        limiter,
    );
    let handle = tokio::spawn(worker.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();
    let stats = handle.await.unwrap();

    // Permits are granted every 100ms, starting immediately.
    assert!((15..=16).contains(&stats.attempted), "{stats:?}");
    assert!(stats.throttled > 0);
    assert_eq!(store.get_calls() + store.set_calls(), stats.attempted);
}
