//! Error taxonomy for the analytics engine
//!
//! Every failure is local and deterministic: the offending call returns an
//! `EngineError` and nothing is retried or partially applied.

use thiserror::Error;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Period name that the resolver does not know
    #[error("invalid period token: {0:?}")]
    InvalidPeriodToken(String),

    /// Amounts in different currencies were combined
    #[error("mixed currencies in {group}: expected {expected}, found {found}")]
    MixedCurrency {
        group: String,
        expected: String,
        found: String,
    },

    /// Input value outside its allowed domain (negative hours, bad date, ...)
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Decimal arithmetic exceeded the representable range
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// Reading records or configuration failed
    #[error("load error: {0}")]
    Load(String),
}

impl EngineError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Load(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Load(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Load(err.to_string())
    }
}

/// Result alias used across the crate
pub type EngineResult<T> = Result<T, EngineError>;
