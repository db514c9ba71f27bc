//! rims-regulator: the regulation state machine and its collaborators.
//!
//! [`Regulator`] owns the thermistor, flow meter, SSR driver, PID controller
//! and session timer and drives them from a single non-blocking
//! [`Regulator::tick`]. [`Identification`] is a sibling state machine that
//! reuses the same hardware to run an open-loop step test for tuning.
//!
//! The display/keypad and the telemetry store are external: they are reached
//! through the [`RegulatorUi`] and [`TelemetrySink`] traits.

pub mod board;
pub mod config;
pub mod error;
pub mod ident;
pub mod interlock;
pub mod regulator;
pub mod telemetry;
pub mod ui;

#[cfg(test)]
mod testing;

pub use board::Board;
pub use config::{RegulatorConfig, ValidationError, from_yaml_str, load_yaml, save_yaml};
pub use error::{RegulatorError, RegulatorResult};
pub use ident::{IdentSchedule, IdentState, IdentStatus, IdentStep, Identification};
pub use interlock::{Fault, Faults};
pub use regulator::{Regulator, RegulatorState, RegulatorStatus, Session};
pub use telemetry::{
    CsvTelemetry, JsonLinesTelemetry, TelemetryBuffer, TelemetryRecord, TelemetrySink,
};
pub use ui::{IdentUi, RegulatorUi};
