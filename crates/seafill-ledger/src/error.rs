//! Ledger error types.

use thiserror::Error;

use crate::revert::RevertReason;

#[derive(Debug, Error, Clone)]
pub enum LedgerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Execution reverted: {0}")]
    Reverted(RevertReason),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Revert payload, if this error is a revert.
    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            Self::Reverted(reason) => Some(reason),
            _ => None,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
