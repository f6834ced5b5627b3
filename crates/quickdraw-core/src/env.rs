//! Environment abstraction.
//!
//! The round coordinator needs a monotonic clock and a source of randomness
//! (tie-breaks, room codes). Both are supplied through [`Environment`] so the
//! protocol can run against a virtual clock and a seeded RNG in tests.

use std::time::Instant;

use rand::{Rng, RngCore};

/// Time and randomness provider.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// The environment's randomness as a [`RngCore`], for `rand` sampling.
    fn rng(&self) -> EnvRng<'_, Self> {
        EnvRng(self)
    }

    /// Uniform random index in `0..upper`. Returns 0 when `upper` is 0.
    fn random_below(&self, upper: usize) -> usize {
        if upper <= 1 {
            return 0;
        }
        self.rng().gen_range(0..upper)
    }
}

/// [`RngCore`] adapter over [`Environment::random_bytes`].
#[derive(Debug)]
pub struct EnvRng<'a, E>(&'a E);

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.0.random_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.0.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Production environment: system monotonic clock and thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
