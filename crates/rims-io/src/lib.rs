//! Hardware edge of the RIMS regulator.
//!
//! - [`thermistor`]: ADC sample to temperature (Steinhart–Hart), open/short detection
//! - [`flow`]: interrupt-captured flow pulses to litres per minute
//! - [`ssr`]: time-proportioning (window PWM) drive of the heater relay
//! - [`pins`]: heater power sense, alarm output and a no-op pin
//!
//! Digital pins use the `embedded-hal` 1.0 traits; the analog input uses the
//! small [`AnalogInput`] trait since `embedded-hal` 1.0 has none.

pub mod adc;
pub mod error;
pub mod flow;
pub mod pins;
pub mod ssr;
pub mod thermistor;

pub use adc::AnalogInput;
pub use error::{IoError, IoResult};
pub use flow::{FlowConfig, FlowLevel, FlowMeter, FlowPulses, FlowSample};
pub use pins::{Alarm, NoPin, PowerSense};
pub use ssr::{SsrDriver, TimeProportioning};
pub use thermistor::{
    Thermistor, ThermistorCalibration, ThermistorReading, linearize, raw_for_celsius,
};
