use thiserror::Error;

pub type RimsResult<T> = Result<T, RimsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RimsError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
