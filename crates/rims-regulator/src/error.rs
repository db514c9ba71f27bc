//! Error types for regulator setup.

use crate::config::ValidationError;
use thiserror::Error;

pub type RegulatorResult<T> = Result<T, RegulatorError>;

/// Errors raised while loading configuration or wiring the regulator.
///
/// Once built, the regulator never returns errors: faults are handled by
/// switching the heater off and reporting them to the UI.
#[derive(Error, Debug)]
pub enum RegulatorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Control setup error: {0}")]
    Control(#[from] rims_controls::ControlError),

    #[error("Hardware setup error: {0}")]
    Hardware(#[from] rims_io::IoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
