//! Error types for hardware configuration.

use thiserror::Error;

pub type IoResult<T> = Result<T, IoError>;

/// Errors raised while configuring hardware drivers.
///
/// Runtime read/write failures are never surfaced as errors: they are logged
/// and mapped to the safe interpretation (sensor fault, heater off).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IoError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid calibration: {what}")]
    Calibration { what: &'static str },
}
