// rules-engine/src/clock.rs
// ============================================================================
// Module: Clock
// Description: The `now()` injection point used throughout the engine.
// Purpose: Let the Fact Store, Rule Index, and Temporal Matchers share one
//          deterministic-testing seam (spec §4.3: "a now() injection point
//          for deterministic testing").
// Dependencies: std::time
// ============================================================================

//! ## Overview
//! Every timestamp in this engine is "monotonic milliseconds" (spec §3), not
//! a wall-clock instant. [`SystemClock`] measures elapsed time since process
//! start; [`FixedClock`] and [`ManualClock`] let tests pin or advance time
//! explicitly.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

/// Source of monotonic milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in monotonic milliseconds.
    fn now_ms(&self) -> u64;
}

/// Real-time clock backed by [`Instant::now`].
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Builds a clock whose epoch is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A clock a test can advance by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Builds a manual clock starting at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self { now: AtomicU64::new(start_ms) }
    }

    /// Advances the clock by `delta_ms` and returns the new time.
    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, at_ms: u64) {
        self.now.store(at_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A shared handle to any [`Clock`] implementation.
pub type SharedClock = Arc<dyn Clock>;
