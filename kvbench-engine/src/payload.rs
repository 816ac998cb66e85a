//! Randomized, fixed-size values written by preset and update operations.

use bytes::{Bytes, BytesMut};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

/// Produces values of a fixed size filled with pseudo-random bytes.
///
/// Each generator owns its RNG, so workers never contend on a shared source of randomness.
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    /// The length of every generated payload in bytes.
    size: usize,
    /// The RNG used to fill payloads.
    rng: SmallRng,
}

impl PayloadGenerator {
    pub fn new(size: usize, seed: u64) -> Self {
        Self {
            size,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Returns the size of generated payloads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Generates the next payload.
    pub fn next_value(&mut self) -> Bytes {
        let mut buf = BytesMut::zeroed(self.size);
        self.rng.fill_bytes(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_have_fixed_size() {
        let mut generator = PayloadGenerator::new(1024, 7);
        let a = generator.next_value();
        let b = generator.next_value();

        assert_eq!(a.len(), 1024);
        assert_eq!(b.len(), 1024);
        assert_ne!(a, b);
    }

    #[test]
    fn same_seed_same_payloads() {
        let mut a = PayloadGenerator::new(64, 42);
        let mut b = PayloadGenerator::new(64, 42);
        assert_eq!(a.next_value(), b.next_value());
    }

    #[test]
    fn empty_payloads() {
        assert!(PayloadGenerator::new(0, 1).next_value().is_empty());
    }
}
