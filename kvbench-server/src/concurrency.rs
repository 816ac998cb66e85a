//! Concurrency ceiling for store commands.
//!
//! [`ConcurrencyLimiter`] caps the number of in-flight commands using a tokio semaphore. A command
//! that finds all permits taken fails right away with [`StoreError::AtCapacity`] instead of
//! queueing, which surfaces pool exhaustion as a failed call.

use std::sync::Arc;

use kvbench_engine::{StoreError, StoreResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits concurrent store commands and tracks the in-flight count.
///
/// Permits are acquired with [`try_acquire`](Self::try_acquire) and
/// automatically returned when the [`ConcurrencyPermit`] is dropped.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl ConcurrencyLimiter {
    /// Creates a new limiter with the given maximum number of permits.
    pub fn new(max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Tries to acquire a concurrency permit.
    ///
    /// Returns [`StoreError::AtCapacity`] when all permits are held.
    pub fn try_acquire(&self) -> StoreResult<ConcurrencyPermit> {
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| StoreError::AtCapacity)?;

        Ok(ConcurrencyPermit { _permit: permit })
    }

    /// Returns the number of permits currently held.
    pub fn used_permits(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }
}

/// RAII guard for a concurrency permit.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let limiter = ConcurrencyLimiter::new(2);
        assert_eq!(limiter.used_permits(), 0);

        let p1 = limiter.try_acquire().unwrap();
        let p2 = limiter.try_acquire().unwrap();
        assert_eq!(limiter.used_permits(), 2);

        drop(p1);
        assert_eq!(limiter.used_permits(), 1);

        drop(p2);
        assert_eq!(limiter.used_permits(), 0);
    }

    #[test]
    fn at_capacity_rejects() {
        let limiter = ConcurrencyLimiter::new(1);
        let permit = limiter.try_acquire().unwrap();

        assert!(matches!(limiter.try_acquire(), Err(StoreError::AtCapacity)));

        drop(permit);
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn clones_share_permits() {
        let limiter = ConcurrencyLimiter::new(1);
        let clone = limiter.clone();
        let _permit = limiter.try_acquire().unwrap();

        assert!(clone.try_acquire().is_err());
        assert_eq!(clone.used_permits(), 1);
    }
}
