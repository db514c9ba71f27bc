//! Thermistor linearization.
//!
//! The NTC thermistor sits on the low side of a divider with a reference
//! resistor to the supply rail, so
//!
//! ```text
//! R = R_ref * raw / (adc_max - raw)
//! 1/T = A + B ln R + C (ln R)^2 + D (ln R)^3      (Steinhart–Hart, T in K)
//! ```
//!
//! An open thermistor pulls the ADC to the rail (saturation, "disconnected");
//! a shorted one reads zero.

use crate::adc::AnalogInput;
use crate::error::{IoError, IoResult};
use rims_core::{k, to_celsius};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_adc_max() -> u16 {
    1023
}

/// Calibration of the thermistor divider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermistorCalibration {
    /// Steinhart–Hart constant term.
    pub a: f64,
    /// Coefficient of `ln R`.
    pub b: f64,
    /// Coefficient of `(ln R)^2`.
    pub c: f64,
    /// Coefficient of `(ln R)^3`.
    pub d: f64,
    /// Divider reference resistor (ohms).
    pub reference_ohms: f64,
    /// Fine-tune offset added to the result (°C).
    #[serde(default)]
    pub offset_c: f64,
    /// Full-scale ADC reading.
    #[serde(default = "default_adc_max")]
    pub adc_max: u16,
    /// Readings at or above this are treated as an open circuit.
    #[serde(default = "default_adc_max")]
    pub saturation: u16,
}

impl Default for ThermistorCalibration {
    /// Common 10 kΩ NTC with a 10 kΩ reference on a 10-bit ADC.
    fn default() -> Self {
        Self {
            a: 1.129_148e-3,
            b: 2.341_25e-4,
            c: 0.0,
            d: 8.767_41e-8,
            reference_ohms: 10_000.0,
            offset_c: 0.0,
            adc_max: 1023,
            saturation: 1023,
        }
    }
}

impl ThermistorCalibration {
    pub fn validate(&self) -> IoResult<()> {
        if ![self.a, self.b, self.c, self.d, self.offset_c]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(IoError::Calibration {
                what: "coefficients must be finite",
            });
        }
        if !(self.reference_ohms > 0.0 && self.reference_ohms.is_finite()) {
            return Err(IoError::Calibration {
                what: "reference resistor must be positive",
            });
        }
        if self.adc_max == 0 || self.saturation == 0 || self.saturation > self.adc_max {
            return Err(IoError::Calibration {
                what: "saturation must be in 1..=adc_max",
            });
        }
        Ok(())
    }

    /// Thermistor resistance for a raw sample, `None` at either rail.
    pub fn resistance(&self, raw: u16) -> Option<f64> {
        if raw == 0 || raw >= self.adc_max {
            return None;
        }
        let raw = f64::from(raw);
        Some(self.reference_ohms * raw / (f64::from(self.adc_max) - raw))
    }
}

/// Outcome of one thermistor sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermistorReading {
    /// Valid temperature in °C (offset applied).
    Celsius(f64),
    /// Sample at or above saturation: open circuit.
    Disconnected,
    /// Sample at zero: short circuit.
    Shorted,
}

impl ThermistorReading {
    pub fn celsius(&self) -> Option<f64> {
        match self {
            Self::Celsius(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::Celsius(_))
    }
}

/// Convert a raw sample to a reading. Pure; no side effects.
pub fn linearize(raw: u16, cal: &ThermistorCalibration) -> ThermistorReading {
    if raw >= cal.saturation {
        return ThermistorReading::Disconnected;
    }
    if raw == 0 {
        return ThermistorReading::Shorted;
    }
    let Some(ohms) = cal.resistance(raw) else {
        return ThermistorReading::Disconnected;
    };
    let ln_r = ohms.ln();
    let inv_t = cal.a + cal.b * ln_r + cal.c * ln_r.powi(2) + cal.d * ln_r.powi(3);
    let celsius = to_celsius(k(1.0 / inv_t)) + cal.offset_c;
    if celsius.is_finite() {
        ThermistorReading::Celsius(celsius)
    } else {
        ThermistorReading::Disconnected
    }
}

/// Raw sample whose linearized temperature is closest to `celsius`.
///
/// Inverse of [`linearize`] over the valid (non-fault) range; used to feed a
/// simulated ADC and to print calibration tables.
pub fn raw_for_celsius(celsius: f64, cal: &ThermistorCalibration) -> u16 {
    let top = cal.saturation.saturating_sub(1).max(1);
    let temp = |raw: u16| linearize(raw, cal).celsius().unwrap_or(f64::NEG_INFINITY);

    // Temperature falls as raw rises: find the first raw at or below target.
    let (mut lo, mut hi) = (1_u16, top);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if temp(mid) > celsius {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo > 1 && (temp(lo - 1) - celsius).abs() < (temp(lo) - celsius).abs() {
        lo - 1
    } else {
        lo
    }
}

/// Thermistor attached to an analog input.
#[derive(Debug)]
pub struct Thermistor<A> {
    input: A,
    calibration: ThermistorCalibration,
    last: ThermistorReading,
    last_raw: Option<u16>,
}

impl<A: AnalogInput> Thermistor<A> {
    pub fn new(input: A, calibration: ThermistorCalibration) -> IoResult<Self> {
        calibration.validate()?;
        Ok(Self {
            input,
            calibration,
            last: ThermistorReading::Disconnected,
            last_raw: None,
        })
    }

    /// Read and linearize one sample.
    ///
    /// A failed ADC read counts as a disconnected sensor.
    pub fn sample(&mut self) -> ThermistorReading {
        self.last = match self.input.read() {
            Ok(raw) => {
                self.last_raw = Some(raw);
                linearize(raw, &self.calibration)
            }
            Err(err) => {
                warn!(?err, "thermistor ADC read failed");
                self.last_raw = None;
                ThermistorReading::Disconnected
            }
        };
        self.last
    }

    pub fn reading(&self) -> ThermistorReading {
        self.last
    }

    /// Last sample was at or above saturation (or the read failed).
    pub fn is_disconnected(&self) -> bool {
        self.last == ThermistorReading::Disconnected
    }

    /// Last valid temperature; `None` while the sensor is faulted.
    pub fn temperature(&self) -> Option<f64> {
        self.last.celsius()
    }

    pub fn last_raw(&self) -> Option<u16> {
        self.last_raw
    }

    pub fn calibration(&self) -> &ThermistorCalibration {
        &self.calibration
    }

    pub fn input_mut(&mut self) -> &mut A {
        &mut self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct FixedAdc(u16);

    impl AnalogInput for FixedAdc {
        type Error = Infallible;

        fn read(&mut self) -> Result<u16, Infallible> {
            Ok(self.0)
        }
    }

    struct BrokenAdc;

    impl AnalogInput for BrokenAdc {
        type Error = &'static str;

        fn read(&mut self) -> Result<u16, &'static str> {
            Err("bus fault")
        }
    }

    #[test]
    fn mid_scale_is_room_temperature() {
        // Divider at mid-scale: R ≈ R_ref = 10 kΩ, i.e. ~25 °C for this NTC.
        let t = linearize(512, &ThermistorCalibration::default())
            .celsius()
            .unwrap();
        assert!((t - 25.0).abs() < 0.2, "got {t}");
    }

    #[test]
    fn saturation_is_disconnected() {
        let cal = ThermistorCalibration::default();
        assert_eq!(linearize(1023, &cal), ThermistorReading::Disconnected);

        let cal = ThermistorCalibration {
            saturation: 1000,
            ..ThermistorCalibration::default()
        };
        assert_eq!(linearize(1000, &cal), ThermistorReading::Disconnected);
        assert_eq!(linearize(1010, &cal), ThermistorReading::Disconnected);
        assert!(linearize(999, &cal).celsius().is_some());
    }

    #[test]
    fn zero_is_shorted() {
        assert_eq!(
            linearize(0, &ThermistorCalibration::default()),
            ThermistorReading::Shorted
        );
    }

    #[test]
    fn offset_is_added() {
        let base = ThermistorCalibration::default();
        let shifted = ThermistorCalibration {
            offset_c: 1.5,
            ..base.clone()
        };
        let t0 = linearize(300, &base).celsius().unwrap();
        let t1 = linearize(300, &shifted).celsius().unwrap();
        assert!((t1 - t0 - 1.5).abs() < 1e-12);
    }

    #[test]
    fn raw_for_celsius_inverts_linearize() {
        let cal = ThermistorCalibration::default();
        for target in [20.0, 45.0, 63.5, 68.0, 78.0] {
            let raw = raw_for_celsius(target, &cal);
            let t = linearize(raw, &cal).celsius().unwrap();
            // One ADC count near 70 °C is well under half a degree.
            assert!((t - target).abs() < 0.5, "target {target} got {t} (raw {raw})");
        }
    }

    #[test]
    fn sampler_tracks_faults() {
        let mut therm = Thermistor::new(FixedAdc(512), ThermistorCalibration::default()).unwrap();
        assert!(therm.sample().celsius().is_some());
        assert!(!therm.is_disconnected());
        assert_eq!(therm.last_raw(), Some(512));

        therm.input_mut().0 = 1023;
        assert_eq!(therm.sample(), ThermistorReading::Disconnected);
        assert!(therm.is_disconnected());
        assert!(therm.temperature().is_none());

        therm.input_mut().0 = 400;
        assert!(therm.sample().celsius().is_some());
        assert!(!therm.is_disconnected());
    }

    #[test]
    fn read_error_counts_as_disconnected() {
        let mut therm = Thermistor::new(BrokenAdc, ThermistorCalibration::default()).unwrap();
        assert_eq!(therm.sample(), ThermistorReading::Disconnected);
        assert!(therm.is_disconnected());
        assert_eq!(therm.last_raw(), None);
    }

    #[test]
    fn invalid_calibration_rejected() {
        let bad = ThermistorCalibration {
            reference_ohms: 0.0,
            ..ThermistorCalibration::default()
        };
        assert!(Thermistor::new(FixedAdc(0), bad).is_err());
        let bad = ThermistorCalibration {
            saturation: 2000,
            ..ThermistorCalibration::default()
        };
        assert!(bad.validate().is_err());
    }
}
