//! Simulated board: ADC, digital pins and the recirculation pump.
//!
//! Handles are cheap clones sharing one value, so the runner keeps one copy
//! while the regulator owns another.

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use rims_io::{AnalogInput, FlowConfig, FlowPulses, ThermistorCalibration, raw_for_celsius};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

/// Thermistor divider driven from a temperature.
#[derive(Debug, Clone)]
pub struct SimAdc {
    raw: Arc<AtomicU16>,
    calibration: ThermistorCalibration,
}

impl SimAdc {
    pub fn new(calibration: ThermistorCalibration) -> Self {
        Self {
            raw: Arc::new(AtomicU16::new(calibration.saturation)),
            calibration,
        }
    }

    /// Present the sample the thermistor would give at `celsius`.
    pub fn set_celsius(&self, celsius: f64) {
        self.set_raw(raw_for_celsius(celsius, &self.calibration));
    }

    pub fn set_raw(&self, raw: u16) {
        self.raw.store(raw, Ordering::Relaxed);
    }

    /// Open circuit: the divider node sits at the rail.
    pub fn disconnect(&self) {
        self.set_raw(self.calibration.adc_max);
    }

    pub fn short(&self) {
        self.set_raw(0);
    }

    pub fn raw(&self) -> u16 {
        self.raw.load(Ordering::Relaxed)
    }
}

impl AnalogInput for SimAdc {
    type Error = Infallible;

    fn read(&mut self) -> Result<u16, Infallible> {
        Ok(self.raw())
    }
}

/// Digital pin usable as input or output.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set(true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.is_set())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_set())
    }
}

/// Recirculation pump feeding a hall-effect flow sensor.
///
/// Emits evenly spaced pulses into [`FlowPulses`] the way the sensor's
/// interrupt handler would.
#[derive(Debug, Clone)]
pub struct Pump {
    interval_us: Option<u64>,
    next_pulse_us: u64,
    scale: FlowConfig,
}

impl Pump {
    pub fn new(flow: &FlowConfig) -> Self {
        Self {
            interval_us: None,
            next_pulse_us: 0,
            scale: flow.clone(),
        }
    }

    /// Run at `lpm`; zero or negative stops the pump.
    pub fn set_flow(&mut self, lpm: f64, now_us: u64) {
        let was_running = self.interval_us.is_some();
        self.interval_us = self.scale.interval_for_lpm(lpm).filter(|&i| i > 0);
        if !was_running {
            self.next_pulse_us = now_us;
        }
    }

    pub fn stop(&mut self) {
        self.interval_us = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval_us.is_some()
    }

    /// Deliver every pulse due up to `now_us`.
    pub fn advance(&mut self, pulses: &FlowPulses, now_us: u64) {
        let Some(interval) = self.interval_us else {
            return;
        };
        while self.next_pulse_us <= now_us {
            pulses.record_pulse(self.next_pulse_us);
            self.next_pulse_us += interval;
        }
    }
}
