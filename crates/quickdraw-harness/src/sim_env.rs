//! Simulated environment.
//!
//! Time is either a manually advanced virtual clock (scenario world) or the
//! tokio clock, which pauses and auto-advances under
//! `#[tokio::test(start_paused = true)]`. Randomness always comes from a
//! seeded `ChaCha8Rng`, so room codes and tie-breaks replay exactly.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use quickdraw_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
enum Clock {
    Manual(Arc<Mutex<Instant>>),
    Tokio,
}

/// Environment with simulated time and seeded randomness.
#[derive(Debug, Clone)]
pub struct SimEnv {
    clock: Clock,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Manually advanced clock starting now.
    pub fn with_seed(seed: u64) -> Self {
        Self::manual(seed, Instant::now())
    }

    /// Manually advanced clock starting at `start`.
    pub fn manual(seed: u64, start: Instant) -> Self {
        Self {
            clock: Clock::Manual(Arc::new(Mutex::new(start))),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Clock backed by tokio's (pausable) time source.
    pub fn tokio_clock(seed: u64) -> Self {
        Self { clock: Clock::Tokio, rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }

    /// Move a manual clock forward. No effect on the tokio clock, which is
    /// advanced with `tokio::time::advance`.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(now) = &self.clock {
            *now.lock().unwrap_or_else(PoisonError::into_inner) += by;
        }
    }

    /// Set a manual clock to `at` if that is later than the current time.
    pub fn advance_to(&self, at: Instant) {
        if let Clock::Manual(now) = &self.clock {
            let mut now = now.lock().unwrap_or_else(PoisonError::into_inner);
            if at > *now {
                *now = at;
            }
        }
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        match &self.clock {
            Clock::Manual(now) => *now.lock().unwrap_or_else(PoisonError::into_inner),
            Clock::Tokio => tokio::time::Instant::now().into_std(),
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bytes() {
        let a = SimEnv::with_seed(9);
        let b = SimEnv::with_seed(9);
        let (mut x, mut y) = ([0u8; 16], [0u8; 16]);
        a.random_bytes(&mut x);
        b.random_bytes(&mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn clones_share_clock_and_rng() {
        let env = SimEnv::with_seed(1);
        let clone = env.clone();
        let start = env.now();

        clone.advance(Duration::from_millis(40));
        assert_eq!(env.now() - start, Duration::from_millis(40));

        env.advance_to(start);
        assert_eq!(clone.now() - start, Duration::from_millis(40), "clock never goes back");
    }
}
