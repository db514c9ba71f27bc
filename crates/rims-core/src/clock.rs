//! Monotonic time sources.
//!
//! The regulator never sleeps; it asks a [`Clock`] for the current time on
//! every tick. Milliseconds drive the SSR window, the PID sample period and
//! the session timer; microseconds timestamp flow-sensor pulses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic time source counting from an arbitrary origin.
pub trait Clock {
    /// Microseconds since the origin.
    fn micros(&self) -> u64;

    /// Milliseconds since the origin.
    fn millis(&self) -> u64 {
        self.micros() / 1_000
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn micros(&self) -> u64 {
        (**self).micros()
    }
}

/// Wall clock backed by [`Instant`], starting at zero on construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Hand-driven clock for simulations and tests.
///
/// Clones share the same counter, so a test can keep one handle and give
/// another to the component under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `ms` milliseconds.
    pub fn starting_at_ms(ms: u64) -> Self {
        let clock = Self::new();
        clock.set_ms(ms);
        clock
    }

    pub fn set_ms(&self, ms: u64) {
        self.micros.store(ms * 1_000, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1_000);
    }

    pub fn advance_us(&self, us: u64) {
        self.micros.fetch_add(us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn micros(&self) -> u64 {
        self.micros.load(Ordering::Relaxed)
    }
}
