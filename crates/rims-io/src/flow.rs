//! Hall-effect flow meter.
//!
//! The sensor emits one pulse per fixed volume. The board's interrupt handler
//! calls [`FlowPulses::record_pulse`] on each rising edge; that is all the
//! handler does. The main loop polls [`FlowMeter::rate`], which turns the
//! interval between the last two pulses into litres per minute.
//!
//! [`FlowPulses`] is the only state shared between interrupt and main
//! context. It can live in a `static` and is handed by reference to both the
//! handler and the meter, so several meters can coexist.

use core::cell::Cell;
use critical_section::Mutex;
use serde::{Deserialize, Serialize};

/// Timestamps of the two most recent pulses (µs).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSample {
    pub last_pulse_us: Option<u64>,
    pub current_pulse_us: Option<u64>,
}

impl FlowSample {
    const EMPTY: Self = Self {
        last_pulse_us: None,
        current_pulse_us: None,
    };

    /// Interval between the two pulses, if both exist and are ordered.
    pub fn interval_us(&self) -> Option<u64> {
        match (self.last_pulse_us, self.current_pulse_us) {
            (Some(last), Some(current)) if current > last => Some(current - last),
            _ => None,
        }
    }
}

/// Pulse timestamps shared between the interrupt handler and the poller.
#[derive(Debug)]
pub struct FlowPulses {
    sample: Mutex<Cell<FlowSample>>,
}

impl FlowPulses {
    pub const fn new() -> Self {
        Self {
            sample: Mutex::new(Cell::new(FlowSample::EMPTY)),
        }
    }

    /// Record a rising edge at `now_us`. Interrupt context.
    ///
    /// Only shifts the previous timestamp forward; no arithmetic.
    pub fn record_pulse(&self, now_us: u64) {
        critical_section::with(|cs| {
            let cell = self.sample.borrow(cs);
            let previous = cell.get().current_pulse_us;
            cell.set(FlowSample {
                last_pulse_us: previous,
                current_pulse_us: Some(now_us),
            });
        });
    }

    /// Coherent copy of both timestamps.
    ///
    /// The copy happens inside a critical section so a pulse arriving
    /// mid-read cannot produce a torn pair.
    pub fn snapshot(&self) -> FlowSample {
        critical_section::with(|cs| self.sample.borrow(cs).get())
    }

    /// Forget all pulses, e.g. when a new session starts.
    pub fn clear(&self) {
        critical_section::with(|cs| self.sample.borrow(cs).set(FlowSample::EMPTY));
    }
}

impl Default for FlowPulses {
    fn default() -> Self {
        Self::new()
    }
}

/// Flow relative to the nominal recirculation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowLevel {
    Low,
    Nominal,
    High,
}

fn default_pulses_per_litre() -> f64 {
    450.0
}
fn default_stale_after_us() -> u64 {
    5_000_000
}
fn default_critical_lpm() -> f64 {
    1.0
}
fn default_low_bound_lpm() -> f64 {
    1.5
}
fn default_high_bound_lpm() -> f64 {
    2.0
}
fn default_display_max_lpm() -> f64 {
    99.9
}

/// Flow meter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Sensor constant (pulses per litre).
    #[serde(default = "default_pulses_per_litre")]
    pub pulses_per_litre: f64,
    /// Pulse intervals at or beyond this read as no flow (µs).
    #[serde(default = "default_stale_after_us")]
    pub stale_after_us: u64,
    /// At or below this rate heating is unsafe (L/min).
    #[serde(default = "default_critical_lpm")]
    pub critical_lpm: f64,
    /// Lower edge of the nominal band (L/min).
    #[serde(default = "default_low_bound_lpm")]
    pub low_bound_lpm: f64,
    /// Upper edge of the nominal band (L/min).
    #[serde(default = "default_high_bound_lpm")]
    pub high_bound_lpm: f64,
    /// Rates are clamped to `[0, display_max_lpm]`.
    #[serde(default = "default_display_max_lpm")]
    pub display_max_lpm: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pulses_per_litre: default_pulses_per_litre(),
            stale_after_us: default_stale_after_us(),
            critical_lpm: default_critical_lpm(),
            low_bound_lpm: default_low_bound_lpm(),
            high_bound_lpm: default_high_bound_lpm(),
            display_max_lpm: default_display_max_lpm(),
        }
    }
}

impl FlowConfig {
    /// `rate = scale / interval_us`, rate in L/min.
    pub fn scale(&self) -> f64 {
        60.0e6 / self.pulses_per_litre
    }

    /// Pulse interval (µs) that corresponds to `lpm`.
    pub fn interval_for_lpm(&self, lpm: f64) -> Option<u64> {
        (lpm > 0.0).then(|| (self.scale() / lpm).round() as u64)
    }
}

/// Polling side of the flow sensor.
#[derive(Debug, Clone)]
pub struct FlowMeter<'a> {
    pulses: &'a FlowPulses,
    config: FlowConfig,
}

impl<'a> FlowMeter<'a> {
    pub fn new(pulses: &'a FlowPulses, config: FlowConfig) -> Self {
        Self { pulses, config }
    }

    /// Instantaneous flow in L/min, `0.0` when no recent pulse pair exists.
    pub fn rate(&self, now_us: u64) -> f64 {
        let sample = self.pulses.snapshot();
        let (Some(current), Some(interval)) = (sample.current_pulse_us, sample.interval_us())
        else {
            return 0.0;
        };
        let stale = self.config.stale_after_us;
        if interval >= stale || now_us.saturating_sub(current) >= stale {
            return 0.0;
        }
        (self.config.scale() / interval as f64).clamp(0.0, self.config.display_max_lpm)
    }

    /// Flow low enough that the heater must be switched off.
    pub fn is_critical(&self, rate: f64) -> bool {
        rate <= self.config.critical_lpm
    }

    pub fn level(&self, rate: f64) -> FlowLevel {
        if rate < self.config.low_bound_lpm {
            FlowLevel::Low
        } else if rate > self.config.high_bound_lpm {
            FlowLevel::High
        } else {
            FlowLevel::Nominal
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn pulses(&self) -> &'a FlowPulses {
        self.pulses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meter(pulses: &FlowPulses) -> FlowMeter<'_> {
        FlowMeter::new(pulses, FlowConfig::default())
    }

    #[test]
    fn no_pulses_reads_zero() {
        let pulses = FlowPulses::new();
        assert_eq!(meter(&pulses).rate(1_000_000), 0.0);
    }

    #[test]
    fn single_pulse_reads_zero() {
        let pulses = FlowPulses::new();
        pulses.record_pulse(100_000);
        assert_eq!(meter(&pulses).rate(200_000), 0.0);
    }

    #[test]
    fn rate_from_interval() {
        let pulses = FlowPulses::new();
        let config = FlowConfig::default();
        let interval = config.interval_for_lpm(2.0).unwrap();
        pulses.record_pulse(1_000_000);
        pulses.record_pulse(1_000_000 + interval);
        let rate = meter(&pulses).rate(1_000_000 + interval + 10);
        assert!((rate - 2.0).abs() < 1e-3, "got {rate}");
    }

    #[test]
    fn handler_shifts_previous_timestamp() {
        let pulses = FlowPulses::new();
        pulses.record_pulse(10);
        pulses.record_pulse(25);
        pulses.record_pulse(40);
        assert_eq!(
            pulses.snapshot(),
            FlowSample {
                last_pulse_us: Some(25),
                current_pulse_us: Some(40),
            }
        );
        pulses.clear();
        assert_eq!(pulses.snapshot(), FlowSample::default());
    }

    #[test]
    fn stopped_pulses_read_zero() {
        let pulses = FlowPulses::new();
        pulses.record_pulse(0);
        pulses.record_pulse(50_000);
        let m = meter(&pulses);
        assert!(m.rate(100_000) > 0.0);
        // No pulse for 6 s with a 5 s staleness bound.
        assert_eq!(m.rate(50_000 + 6_000_000), 0.0);
    }

    #[test]
    fn slow_interval_reads_zero() {
        let pulses = FlowPulses::new();
        pulses.record_pulse(1_000_000);
        pulses.record_pulse(7_000_000);
        assert_eq!(meter(&pulses).rate(7_000_001), 0.0);
    }

    #[test]
    fn rate_is_clamped_for_display() {
        let pulses = FlowPulses::new();
        pulses.record_pulse(1_000);
        pulses.record_pulse(1_001);
        assert_eq!(meter(&pulses).rate(1_002), 99.9);
    }

    #[test]
    fn critical_and_levels() {
        let pulses = FlowPulses::new();
        let m = meter(&pulses);
        assert!(m.is_critical(0.0));
        assert!(m.is_critical(1.0));
        assert!(!m.is_critical(1.01));
        assert_eq!(m.level(0.5), FlowLevel::Low);
        assert_eq!(m.level(1.75), FlowLevel::Nominal);
        assert_eq!(m.level(3.0), FlowLevel::High);
    }

    #[test]
    fn static_pulses_are_shareable() {
        static PULSES: FlowPulses = FlowPulses::new();
        PULSES.record_pulse(5);
        PULSES.record_pulse(10);
        assert_eq!(PULSES.snapshot().interval_us(), Some(5));
    }
}
