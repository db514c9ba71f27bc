//! Time-proportioning output for the heater SSR.
//!
//! A duty value in milliseconds is turned into an on/off pattern over a fixed
//! window of several seconds: on for the first `duty` ms of each window, off
//! for the rest. The window start always advances by whole windows so loop
//! jitter never shifts the duty cycle.

use crate::error::{IoError, IoResult};
use embedded_hal::digital::{OutputPin, PinState};
use tracing::warn;

/// Window bookkeeping, independent of any pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeProportioning {
    window_ms: u64,
    window_start_ms: u64,
    duty_ms: u64,
}

impl TimeProportioning {
    pub fn new(window_ms: u64, now_ms: u64) -> IoResult<Self> {
        if window_ms == 0 {
            return Err(IoError::InvalidArg {
                what: "SSR window must be positive",
            });
        }
        Ok(Self {
            window_ms,
            window_start_ms: now_ms,
            duty_ms: 0,
        })
    }

    /// Set the duty (ms per window), clamped to `[0, window]`.
    pub fn set_duty(&mut self, duty_ms: f64) {
        self.duty_ms = if duty_ms.is_finite() {
            duty_ms.round().clamp(0.0, self.window_ms as f64) as u64
        } else {
            0
        };
    }

    /// Start a fresh window at `now_ms`.
    pub fn restart(&mut self, now_ms: u64) {
        self.window_start_ms = now_ms;
    }

    /// Roll the window forward and report whether the output is on.
    pub fn refresh(&mut self, now_ms: u64) -> bool {
        let behind = now_ms.saturating_sub(self.window_start_ms);
        if behind >= self.window_ms {
            self.window_start_ms += (behind / self.window_ms) * self.window_ms;
        }
        now_ms.saturating_sub(self.window_start_ms) < self.duty_ms
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn window_start_ms(&self) -> u64 {
        self.window_start_ms
    }

    pub fn duty_ms(&self) -> u64 {
        self.duty_ms
    }
}

/// Heater relay plus its indicator LED, driven from a [`TimeProportioning`] window.
#[derive(Debug)]
pub struct SsrDriver<H, L> {
    window: TimeProportioning,
    heater: H,
    indicator: L,
    asserted: bool,
}

impl<H: OutputPin, L: OutputPin> SsrDriver<H, L> {
    /// Build the driver with both outputs off.
    pub fn new(heater: H, indicator: L, window_ms: u64, now_ms: u64) -> IoResult<Self> {
        let mut driver = Self {
            window: TimeProportioning::new(window_ms, now_ms)?,
            heater,
            indicator,
            asserted: true,
        };
        driver.drive(false);
        Ok(driver)
    }

    pub fn set_duty(&mut self, duty_ms: f64) {
        self.window.set_duty(duty_ms);
    }

    /// Update both outputs for `now_ms`. Call on every loop iteration.
    pub fn refresh(&mut self, now_ms: u64) -> bool {
        let on = self.window.refresh(now_ms);
        self.drive(on);
        on
    }

    /// Zero the duty and switch both outputs off immediately.
    pub fn force_off(&mut self) {
        self.window.set_duty(0.0);
        self.drive(false);
    }

    /// Start a new window at `now_ms` (session start).
    pub fn restart(&mut self, now_ms: u64) {
        self.window.restart(now_ms);
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    pub fn window(&self) -> &TimeProportioning {
        &self.window
    }

    pub fn indicator_mut(&mut self) -> &mut L {
        &mut self.indicator
    }

    pub fn into_parts(self) -> (H, L) {
        (self.heater, self.indicator)
    }

    fn drive(&mut self, on: bool) {
        let state = PinState::from(on);
        if let Err(err) = self.heater.set_state(state) {
            warn!(?err, "heater SSR write failed");
        }
        if let Err(err) = self.indicator.set_state(state) {
            warn!(?err, "heater indicator write failed");
        }
        self.asserted = on;
    }
}
