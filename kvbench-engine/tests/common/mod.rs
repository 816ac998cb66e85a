//! Store doubles shared by the engine integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use kvbench_engine::{InMemoryStore, Key, StoreClient, StoreError, StoreResult};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Wraps an [`InMemoryStore`] and fails the first `fail_first` calls to `get` and `set`.
///
/// Optionally cancels a token once a given number of calls has been made, which stops a worker
/// after a deterministic number of operations.
#[derive(Debug)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    calls: AtomicU64,
    fail_first: u64,
    stop_after: Option<(u64, CancellationToken)>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore, fail_first: u64) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
            fail_first,
            stop_after: None,
        }
    }

    pub fn stop_after(mut self, calls: u64, token: CancellationToken) -> Self {
        self.stop_after = Some((calls, token));
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> StoreResult<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, ref token)) = self.stop_after
            && n >= limit
        {
            token.cancel();
        }

        if n <= self.fail_first {
            Err(StoreError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl StoreClient for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn scan_all_keys(&self, batch_size: usize) -> StoreResult<HashSet<Key>> {
        self.inner.scan_all_keys(batch_size).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.call()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.call()?;
        self.inner.set(key, value).await
    }
}

/// A store whose calls block until released, to observe in-flight behavior.
#[derive(Debug, Default)]
pub struct GatedStore {
    pub entered: Notify,
    pub release: Notify,
    started: AtomicU64,
    completed: AtomicU64,
}

impl GatedStore {
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    async fn gate(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl StoreClient for GatedStore {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn scan_all_keys(&self, _batch_size: usize) -> StoreResult<HashSet<Key>> {
        Ok(HashSet::new())
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
        self.gate().await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes) -> StoreResult<()> {
        self.gate().await;
        Ok(())
    }
}

/// A store that cannot be reached at all.
#[derive(Debug, Default)]
pub struct UnreachableStore;

fn refused() -> StoreError {
    StoreError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
}

#[async_trait::async_trait]
impl StoreClient for UnreachableStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn scan_all_keys(&self, _batch_size: usize) -> StoreResult<HashSet<Key>> {
        Err(refused())
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
        Err(refused())
    }

    async fn set(&self, _key: &str, _value: Bytes) -> StoreResult<()> {
        Err(refused())
    }
}
