//! Error types for seafill-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown item type: {0}")]
    UnknownItemType(u8),

    #[error("Unknown order type: {0}")]
    UnknownOrderType(u8),

    #[error("Invalid item at {side}[{index}]: {reason}")]
    InvalidItem {
        side: &'static str,
        index: usize,
        reason: String,
    },

    #[error("Order has no {0} items")]
    EmptyItems(&'static str),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
