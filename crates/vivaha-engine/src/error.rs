//! Error types for vivaha-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VivahaError {
    /// Malformed or missing fixed tables (ruler weights, aspect offsets, house sets).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input rejected before any computation (date ranges, degenerate chart data).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// A structural guarantee of the engine did not hold. Indicates a defect.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, VivahaError>;
