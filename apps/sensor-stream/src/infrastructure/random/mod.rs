//! Random Value Sources
//!
//! `rand`-backed adapters for the [`ValueSource`] port.
//!
//! - [`ThreadRandomSource`]: draws from the calling thread's generator
//!   (`rand::rng()`), the default in production.
//! - [`SeededRandomSource`]: a `StdRng` seeded explicitly, for reproducible
//!   runs and tests.
//!
//! [`RandomSourceFactory`] hands each subscription its own source. In
//! seeded mode the n-th subscription (counting from zero) is seeded with
//! `seed + n`, so two subscriptions never replay the same sequence.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::application::ports::{ValueSource, ValueSourceFactory};

/// Value source backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomSource;

impl ValueSource for ThreadRandomSource {
    fn sample(&mut self, range: Range<f64>) -> f64 {
        // ThreadRng is !Send, so it is fetched per call instead of stored.
        rand::rng().random_range(range)
    }
}

/// Value source backed by an explicitly seeded `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandomSource {
    rng: StdRng,
}

impl SeededRandomSource {
    /// Create a source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ValueSource for SeededRandomSource {
    fn sample(&mut self, range: Range<f64>) -> f64 {
        self.rng.random_range(range)
    }
}

/// Creates one random source per subscription.
#[derive(Debug, Default)]
pub struct RandomSourceFactory {
    seed: Option<u64>,
    created: AtomicU64,
}

impl RandomSourceFactory {
    /// Factory of thread-local sources.
    #[must_use]
    pub const fn thread_local() -> Self {
        Self {
            seed: None,
            created: AtomicU64::new(0),
        }
    }

    /// Factory of seeded sources derived from `seed`.
    #[must_use]
    pub const fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            created: AtomicU64::new(0),
        }
    }

    /// Factory from an optional seed: seeded if present, thread-local otherwise.
    #[must_use]
    pub const fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::thread_local(),
        }
    }
}

impl ValueSourceFactory for RandomSourceFactory {
    fn create(&self) -> Box<dyn ValueSource> {
        let n = self.created.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => Box::new(SeededRandomSource::new(seed.wrapping_add(n))),
            None => Box::new(ThreadRandomSource),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
