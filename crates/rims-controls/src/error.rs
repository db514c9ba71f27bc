//! Error types for control configuration.

use thiserror::Error;

/// Result type for control configuration.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised while building controllers or registering profiles.
///
/// None of these can occur once a session is running.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Too many tuning profiles registered.
    #[error("Profile limit reached: at most {max} tuning profiles")]
    ProfileLimit { max: usize },

    /// Numeric problem reported by rims-core.
    #[error("Numeric error: {0}")]
    Numeric(#[from] rims_core::RimsError),
}
