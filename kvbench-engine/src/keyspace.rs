//! Sizing and naming of the benchmark keyspace.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::store::Key;

/// Default prefix of generated keys.
pub const DEFAULT_KEY_PREFIX: &str = "kvbench-";

/// Zero-padding width of the numeric part of generated keys.
const KEY_WIDTH: usize = 12;

/// Returns how many keys must be created so that `observed` keys grow to `target`.
pub fn compute_shortfall(target: usize, observed: usize) -> usize {
    target.saturating_sub(observed)
}

/// Generates deterministic, non-colliding key identifiers.
///
/// Keys have the form `<prefix><sequence>`, where the sequence is zero-padded. The sequence
/// counter lives as long as the manager, so repeated calls never hand out the same id twice.
#[derive(Debug)]
pub struct KeyspaceManager {
    prefix: String,
    next: AtomicU64,
}

impl KeyspaceManager {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    /// Produces `count` distinct identifiers, skipping any that appear in `existing`.
    pub fn generate_ids(&self, count: usize, existing: &HashSet<Key>) -> Vec<Key> {
        let mut ids = Vec::with_capacity(count);
        while ids.len() < count {
            let seq = self.next.fetch_add(1, Ordering::Relaxed);
            let id = format!("{}{seq:0width$}", self.prefix, width = KEY_WIDTH);
            if !existing.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

impl Default for KeyspaceManager {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

/// An immutable snapshot of the keys known to exist in the store.
///
/// Cloning is cheap; all workers share the same underlying list.
#[derive(Clone, Debug, Default)]
pub struct Keyspace(Arc<[Key]>);

impl Keyspace {
    /// Picks a key uniformly at random, or `None` if the keyspace is empty.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.0.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..self.0.len());
        Some(&self.0[idx])
    }
}

impl Deref for Keyspace {
    type Target = [Key];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Key>> for Keyspace {
    fn from(keys: Vec<Key>) -> Self {
        Self(keys.into())
    }
}

impl FromIterator<Key> for Keyspace {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn shortfall_is_never_negative() {
        assert_eq!(compute_shortfall(10, 0), 10);
        assert_eq!(compute_shortfall(10, 4), 6);
        assert_eq!(compute_shortfall(10, 10), 0);
        assert_eq!(compute_shortfall(10, 25), 0);
        assert_eq!(compute_shortfall(0, 0), 0);
    }

    #[test]
    fn ids_are_distinct_and_deterministic() {
        let manager = KeyspaceManager::new("k-");
        let ids = manager.generate_ids(1000, &HashSet::new());

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 1000);
        assert_eq!(ids[0], "k-000000000000");
        assert_eq!(ids[999], "k-000000000999");
    }

    #[test]
    fn ids_do_not_repeat_across_calls() {
        let manager = KeyspaceManager::default();
        let first = manager.generate_ids(5, &HashSet::new());
        let second = manager.generate_ids(5, &HashSet::new());

        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[test]
    fn ids_skip_existing_keys() {
        let existing: HashSet<Key> = KeyspaceManager::new("k-")
            .generate_ids(3, &HashSet::new())
            .into_iter()
            .collect();

        let ids = KeyspaceManager::new("k-").generate_ids(3, &existing);
        assert_eq!(ids, ["k-000000000003", "k-000000000004", "k-000000000005"]);
    }

    #[test]
    fn choose_from_empty_keyspace() {
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(Keyspace::default().choose(&mut rng), None);

        let keyspace = Keyspace::from(vec!["only".to_owned()]);
        assert_eq!(keyspace.choose(&mut rng), Some("only"));
    }
}
