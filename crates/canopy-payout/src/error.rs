//! Error types for canopy-payout.

use thiserror::Error;

/// Result type for payout operations.
pub type Result<T> = std::result::Result<T, PayoutError>;

/// Errors from amount parsing and arithmetic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayoutError {
    /// Amount string could not be parsed
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    /// Arithmetic left the representable range
    #[error("amount overflow")]
    Overflow,
}
