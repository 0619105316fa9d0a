//! Error types for the tsfeat crate

use thiserror::Error;

/// Result type alias for tsfeat operations
pub type Result<T> = std::result::Result<T, TsfeatError>;

/// Main error type for the tsfeat crate
///
/// Fatal variants (`ConfigError`, `PreconditionError`, `DataError`) abort the
/// run and carry the offending component and key. `CalculatorError` and
/// `StatisticalTestError` are recovered at the scheduler / tester boundary
/// and only surface directly when a single cell or feature is executed in
/// isolation.
#[derive(Error, Debug)]
pub enum TsfeatError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Calculator error: {calculator}[{parameters}]: {reason}")]
    CalculatorError {
        calculator: String,
        parameters: String,
        reason: String,
    },

    #[error("Precondition error: {0}")]
    PreconditionError(String),

    #[error("Statistical test error for feature {feature}: {reason}")]
    StatisticalTestError { feature: String, reason: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl From<ndarray::ShapeError> for TsfeatError {
    fn from(err: ndarray::ShapeError) -> Self {
        TsfeatError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TsfeatError {
    fn from(err: serde_json::Error) -> Self {
        TsfeatError::SerializationError(err.to_string())
    }
}
