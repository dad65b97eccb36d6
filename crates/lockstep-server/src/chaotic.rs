//! Chaotic connection wrapper for fault injection testing
//!
//! Wraps a connection and randomly fails deliveries. The session advances
//! cursors regardless of delivery outcome, so this exercises the
//! accepted-loss path: a participant behind a lossy link sees a strictly
//! increasing subset of frames and never a duplicate.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use lockstep_core::{Connection, DeliveryError};
use lockstep_proto::Frame;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default seed for reproducible chaos.
const DEFAULT_SEED: u64 = 0x1234_5678_9ABC_DEF0;

/// Connection wrapper that randomly drops frames.
///
/// Clones share the RNG and counters.
#[derive(Clone, Debug)]
pub struct ChaoticConnection<C: Connection> {
    inner: C,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    dropped: Arc<AtomicU64>,
    forwarded: Arc<AtomicU64>,
}

impl<C: Connection> ChaoticConnection<C> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: C, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, DEFAULT_SEED)
    }

    /// Wrap `inner` with an explicit seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: C, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            dropped: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Frames dropped by fault injection so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames passed through to the inner connection so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Wrapped connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn should_fail(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_bool(self.failure_rate)
    }
}

impl<C: Connection> Connection for ChaoticConnection<C> {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        if self.should_fail() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(DeliveryError::Transport(format!(
                "injected fault dropping frame {}",
                frame.frame_id
            )));
        }

        self.inner.deliver(frame)?;
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
