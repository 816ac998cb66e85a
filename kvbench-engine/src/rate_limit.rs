//! Throughput ceiling for steady-state workers.
//!
//! A [`RateLimiter`] hands out at most `permits` operations per `window`. Permits are reserved
//! from a token bucket that emits one permit every `window / permits`; waiting for a reservation
//! is bounded by the configured timeout. Running into the limit never produces an error: the
//! caller is either delayed or told to skip the cycle.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ConfigError;

/// Configuration of a [`RateLimiter`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimit {
    /// Number of operations allowed per `window`. `0` disables limiting.
    pub permits: u32,
    /// Length of the window `permits` applies to.
    pub window: Duration,
    /// Maximum time [`RateLimiter::acquire`] waits for a permit.
    pub timeout: Duration,
    /// Number of permits that may be used back-to-back above the sustained rate.
    pub burst: u32,
}

impl RateLimit {
    /// A limit that never throttles.
    pub fn unlimited() -> Self {
        Self {
            permits: 0,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.permits == 0 {
            return Ok(());
        }
        if self.window.is_zero() {
            return Err(ConfigError::Zero("rate limit window"));
        }

        let interval = self.window / self.permits;
        if interval.is_zero() {
            return Err(ConfigError::RateLimitTooFine {
                permits: self.permits,
                window: self.window,
            });
        }
        if interval.checked_mul(self.burst).is_none() {
            return Err(ConfigError::BurstOverflow(self.burst));
        }
        Ok(())
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            permits: 100,
            window: Duration::from_secs(1),
            timeout: Duration::from_millis(2),
            burst: 0,
        }
    }
}

/// Caps the rate at which operations may be issued.
///
/// A limiter may be owned by one worker or shared by several behind an `Arc`; reservations are
/// taken under a short-lived lock and the wait happens outside of it.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Mutex<TokenBucket>>,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimit) -> Self {
        let bucket = (config.permits > 0)
            .then(|| Mutex::new(TokenBucket::new(config.permits, config.window, config.burst)));

        Self {
            bucket,
            timeout: config.timeout,
        }
    }

    /// Waits for a permit.
    ///
    /// Returns `true` once a permit has been granted. If the next permit is further away than the
    /// timeout, this waits for the timeout instead and returns `false`; the caller should skip
    /// this cycle rather than retry immediately.
    pub async fn acquire(&self) -> bool {
        let Some(ref bucket) = self.bucket else {
            // Still yield, so a worker driving an always-ready store cannot starve the runtime.
            tokio::task::yield_now().await;
            return true;
        };

        let now = Instant::now();
        // NB: A poisoned bucket means a panic while holding the lock, which we don't recover from.
        let reservation = bucket.lock().unwrap().reserve(now, self.timeout);

        match reservation {
            Some(at) if at > now => {
                tokio::time::sleep_until(at).await;
                true
            }
            Some(_) => {
                // An immediate grant must still suspend, otherwise a fast store keeps the worker
                // inside a single poll.
                tokio::task::yield_now().await;
                true
            }
            None => {
                tokio::time::sleep(self.timeout).await;
                false
            }
        }
    }
}

/// A reservation-based token bucket.
///
/// Permits are spaced `interval` apart. Up to `burst` permits may be taken early, so at most
/// `permits + burst` operations start in any window. Reservations are handed out in order, which
/// keeps waiting callers fair.
///
/// This implementation is not thread-safe on its own. Wrap in a `Mutex` for concurrent access.
#[derive(Debug)]
struct TokenBucket {
    interval: Duration,
    tolerance: Duration,
    next_free: Option<Instant>,
}

impl TokenBucket {
    fn new(permits: u32, window: Duration, burst: u32) -> Self {
        let interval = window / permits;
        Self {
            interval,
            tolerance: interval.checked_mul(burst).unwrap_or(Duration::MAX),
            next_free: None,
        }
    }

    /// Reserves the next permit if it becomes available within `timeout`.
    ///
    /// Returns the instant at which the permit may be used, or `None` if that is too far away.
    fn reserve(&mut self, now: Instant, timeout: Duration) -> Option<Instant> {
        let earliest = now.checked_sub(self.tolerance).unwrap_or(now);
        let slot = match self.next_free {
            Some(next) if next > earliest => next,
            _ => earliest,
        };

        let at = slot.max(now);
        if at.duration_since(now) > timeout {
            return None;
        }

        self.next_free = Some(slot + self.interval);
        Some(at)
    }
}
