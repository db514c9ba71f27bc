//! Sampled execution primitives for digital controllers.
//!
//! Controllers operate in sampled/digital mode with a configured period.
//! Between samples, controller outputs are held constant (zero-order hold).

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Sample configuration for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Sample period in milliseconds.
    pub period_ms: u64,
}

impl SampleConfig {
    /// Create a new sample configuration.
    ///
    /// # Errors
    ///
    /// Returns error if `period_ms` is zero.
    pub fn new(period_ms: u64) -> ControlResult<Self> {
        if period_ms == 0 {
            return Err(ControlError::InvalidArg {
                what: "sample period must be positive",
            });
        }
        Ok(Self { period_ms })
    }

    /// Sample period in seconds, the `Ts` of the discrete equations.
    pub fn period_s(&self) -> f64 {
        self.period_ms as f64 / 1_000.0
    }

    /// Get the sample frequency in Hz.
    pub fn frequency(&self) -> f64 {
        1.0 / self.period_s()
    }
}

/// Sample clock tracks when a controller should execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleClock {
    /// Sample configuration.
    pub config: SampleConfig,
    /// Time of next scheduled sample (ms).
    pub next_sample_ms: u64,
}

impl SampleClock {
    /// Create a new sample clock whose first sample is one period after `now_ms`.
    pub fn new(config: SampleConfig, now_ms: u64) -> Self {
        Self {
            config,
            next_sample_ms: now_ms + config.period_ms,
        }
    }

    /// Returns `true` if `now_ms >= next_sample_ms`.
    pub fn should_sample(&self, now_ms: u64) -> bool {
        now_ms >= self.next_sample_ms
    }

    /// Advance to the next sample time.
    pub fn advance(&mut self) {
        self.next_sample_ms += self.config.period_ms;
    }

    /// Advance past `now_ms`, dropping any samples a stalled loop missed.
    ///
    /// The schedule stays on the original grid so the long-run sample rate
    /// does not drift with loop jitter.
    pub fn advance_past(&mut self, now_ms: u64) {
        while self.next_sample_ms <= now_ms {
            self.advance();
        }
    }

    /// Reset the clock to a new time.
    pub fn reset(&mut self, now_ms: u64) {
        self.next_sample_ms = now_ms + self.config.period_ms;
    }
}
