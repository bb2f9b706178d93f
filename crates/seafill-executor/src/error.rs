//! Engine error types.
//!
//! Every failure names the [`Step`] it happened in. Protocol-level failures
//! keep the decoded revert reason untouched.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use seafill_ledger::{LedgerError, RevertReason, TxReceipt};
use serde::Serialize;
use thiserror::Error;

/// Stage of a trade flow that submitted or read something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SharedProxy,
    Channel,
    Deposit,
    Approve,
    BuildOrder,
    Fulfill,
    Holdings,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharedProxy => "shared_proxy",
            Self::Channel => "channel",
            Self::Deposit => "deposit",
            Self::Approve => "approve",
            Self::BuildOrder => "build_order",
            Self::Fulfill => "fulfill",
            Self::Holdings => "holdings",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A permission grant was refused or did not take effect.
    #[error("Authorization failed at {step} for {account}: {reason}")]
    Authorization {
        step: Step,
        account: Address,
        reason: String,
    },

    /// A balance or allowance could not be brought to its target.
    #[error("Funding failed at {step} for {account} (asset {asset}, amount {amount}): {reason}")]
    Funding {
        step: Step,
        account: Address,
        asset: Address,
        amount: U256,
        reason: String,
    },

    /// Order inputs rejected before anything was submitted.
    #[error("Validation failed at {step}: {reason}")]
    Validation { step: Step, reason: String },

    /// The exchange rejected the fulfillment.
    #[error("Settlement failed at {step} for {account}: {reason}")]
    Settlement {
        step: Step,
        account: Address,
        tx_hash: Option<B256>,
        reason: RevertReason,
        receipt: Option<Box<TxReceipt>>,
    },

    /// The ledger refused the sequence number.
    #[error("Sequencing failed at {step} for {account}: {reason}")]
    Sequencing {
        step: Step,
        account: Address,
        reason: String,
    },

    /// Submitted but not confirmed (timeout or cancellation). The transaction
    /// may still be mined.
    #[error("Status unknown at {step} for {account}: transaction {tx_hash} not confirmed")]
    StatusUnknown {
        step: Step,
        account: Address,
        tx_hash: B256,
    },

    #[error("Ledger error at {step}: {source}")]
    Ledger {
        step: Step,
        #[source]
        source: LedgerError,
    },
}

impl EngineError {
    pub fn step(&self) -> Step {
        match self {
            Self::Authorization { step, .. }
            | Self::Funding { step, .. }
            | Self::Validation { step, .. }
            | Self::Settlement { step, .. }
            | Self::Sequencing { step, .. }
            | Self::StatusUnknown { step, .. }
            | Self::Ledger { step, .. } => *step,
        }
    }

    /// Revert reason of a settlement failure.
    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            Self::Settlement { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub(crate) fn ledger(step: Step) -> impl FnOnce(LedgerError) -> Self {
        move |source| Self::Ledger { step, source }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
