//! Error taxonomy for the trade path.

use thiserror::Error;

/// Structural problem with an inbound trade decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Missing or invalid 'intent' field")]
    InvalidIntent,
}

impl ValidationError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why the position sizer produced no size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("No {0} balance found")]
    BalanceUnavailable(String),

    #[error("{0} balance is zero")]
    ZeroBalance(String),

    #[error("Invalid stop loss distance: entry equals stop")]
    InvalidStopDistance,

    #[error("Invalid lot size: qty step must be positive")]
    InvalidLotSize,

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Arithmetic overflow while sizing")]
    Overflow,

    #[error("Computed quantity is zero")]
    ZeroQuantity,
}

/// Everything that can stop a trade from reaching the book.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to get symbol info for {symbol}: {reason}")]
    InstrumentUnavailable { symbol: String, reason: String },

    #[error("Failed to get account balance: {0}")]
    BalanceQuery(String),

    #[error("Failed to calculate position size: {0}")]
    Sizing(#[from] SizingError),

    #[error("Entry order rejected: {ret_code} - {message}")]
    GatewayRejection { ret_code: i64, message: String },

    #[error("Exchange request failed: {0}")]
    Transport(String),
}
