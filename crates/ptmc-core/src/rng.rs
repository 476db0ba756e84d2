//! Deterministic RNG wrapper, uniform sources and seed-derivation helpers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Source of uniform draws consumed by a chain.
///
/// Every chain owns exactly one source; sources are never shared between
/// chains.
pub trait UniformSource {
    /// Returns a uniform draw in `[0, 1)`.
    fn next_uniform(&mut self) -> f64;

    /// Returns the natural logarithm of a uniform draw.
    fn next_log_uniform(&mut self) -> f64 {
        self.next_uniform().ln()
    }
}

/// Seeded `StdRng` owned by a single chain.
///
/// Ensembles give every chain its own substream: the seed is SipHash-1-3
/// (zero keys) of `(master_seed, substream)`.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Handle seeded directly from `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Handle for one substream of a master seed.
    pub fn from_substream(master_seed: u64, substream: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, substream))
    }
}

impl Default for RngHandle {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl UniformSource for RngHandle {
    fn next_uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Seed of `substream` under `master_seed`.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
