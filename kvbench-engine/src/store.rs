//! The contract between the engine and the key-value store under test.
//!
//! The engine never talks to a concrete store directly. It is handed a [`BoxedStore`] at
//! construction time and only ever calls the three operations of [`StoreClient`]. Topology,
//! authentication and connection pooling are the business of the implementation.
//!
//! [`InMemoryStore`] is a `HashMap`-backed implementation used by tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::StoreResult;

/// An opaque key identifier.
pub type Key = String;

/// A type-erased, shareable [`StoreClient`] instance.
pub type BoxedStore = Arc<dyn StoreClient>;

#[async_trait::async_trait]
pub trait StoreClient: Debug + Send + Sync + 'static {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Lists every key currently present in the store.
    ///
    /// `batch_size` is a hint for how many keys to fetch per round trip. Implementations must
    /// terminate even when keys are written concurrently.
    async fn scan_all_keys(&self, batch_size: usize) -> StoreResult<HashSet<Key>>;

    /// Reads the value stored at `key`, returning `None` if it does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Writes `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;
}

/// An in-process store backed by a `HashMap`.
///
/// The store is [`Clone`] so tests can hold a handle for direct inspection while the engine owns
/// a boxed copy.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<Key, Bytes>>>,
    gets: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already contains the given keys with empty values.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let entries = keys.into_iter().map(|k| (k.into(), Bytes::new())).collect();
        Self {
            entries: Arc::new(Mutex::new(entries)),
            ..Default::default()
        }
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if the store has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Returns a clone of the value stored at `key`, bypassing the [`StoreClient`] trait.
    pub fn get_stored(&self, key: &str) -> Option<Bytes> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Number of `get` calls served so far.
    pub fn get_calls(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `set` calls served so far.
    pub fn set_calls(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl StoreClient for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn scan_all_keys(&self, _batch_size: usize) -> StoreResult<HashSet<Key>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let store = InMemoryStore::new();
        store.set("a", Bytes::from_static(b"hello")).await.unwrap();

        let value = store.get("a").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"hello"[..]));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.set_calls(), 1);
        assert_eq!(store.get_calls(), 2);
    }

    #[tokio::test]
    async fn scan_lists_all_keys() {
        let store = InMemoryStore::with_keys(["a", "b", "c"]);
        let keys = store.scan_all_keys(1).await.unwrap();

        assert_eq!(keys.len(), 3);
        assert!(keys.contains("b"));
    }
}
