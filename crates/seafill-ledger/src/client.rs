//! Ledger client trait and transaction records.
//!
//! The trait is dyn-compatible (boxed futures) so that sessions and gates can
//! share one `Arc<dyn LedgerClient>` regardless of backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};

use crate::error::LedgerResult;
use crate::revert::RevertReason;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only call (`eth_call`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Target + calldata + attached value, produced by the typed contract clients.
///
/// A `ContractCall` has no sender and no sequencing; an `AccountSession`
/// turns it into a [`TransactionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl ContractCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Fully specified transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: Option<u64>,
    pub gas_price: Option<U256>,
    pub gas: Option<u64>,
}

impl TransactionRequest {
    pub fn from_call(from: Address, call: ContractCall) -> Self {
        Self {
            from,
            to: call.to,
            data: call.data,
            value: call.value,
            nonce: None,
            gas_price: None,
            gas: None,
        }
    }

    /// View this transaction as a read-only call (used to replay for reasons).
    pub fn as_call(&self) -> CallRequest {
        CallRequest {
            from: Some(self.from),
            to: self.to,
            data: self.data.clone(),
            value: self.value,
        }
    }
}

/// Log emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// `true` if execution succeeded, `false` if it reverted.
    pub status: bool,
    pub gas_used: u64,
    pub effective_gas_price: U256,
    pub logs: Vec<LogEntry>,
}

impl TxReceipt {
    /// Native currency spent on gas.
    pub fn cost(&self) -> U256 {
        U256::from(self.gas_used) * self.effective_gas_price
    }
}

/// Access to a ledger node.
pub trait LedgerClient: Send + Sync {
    fn chain_id(&self) -> BoxFuture<'_, LedgerResult<u64>>;

    /// Timestamp of the latest block, in seconds.
    fn block_timestamp(&self) -> BoxFuture<'_, LedgerResult<u64>>;

    fn gas_price(&self) -> BoxFuture<'_, LedgerResult<U256>>;

    /// Next sequence number for `account`, including pending transactions.
    fn transaction_count(&self, account: Address) -> BoxFuture<'_, LedgerResult<u64>>;

    fn native_balance(&self, account: Address) -> BoxFuture<'_, LedgerResult<U256>>;

    /// Execute a read-only call against the latest state.
    fn call(&self, call: CallRequest) -> BoxFuture<'_, LedgerResult<Bytes>>;

    /// Submit a transaction; resolves once the node accepted it.
    fn send_transaction(&self, tx: TransactionRequest) -> BoxFuture<'_, LedgerResult<B256>>;

    /// `None` while the transaction is pending.
    fn transaction_receipt(&self, hash: B256) -> BoxFuture<'_, LedgerResult<Option<TxReceipt>>>;

    /// Revert payload of a mined, failed transaction.
    fn revert_reason(&self, hash: B256) -> BoxFuture<'_, LedgerResult<Option<RevertReason>>>;
}

/// Arc wrapper for LedgerClient trait objects.
pub type DynLedger = Arc<dyn LedgerClient>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_cost() {
        let receipt = TxReceipt {
            transaction_hash: B256::ZERO,
            block_number: 1,
            status: true,
            gas_used: 21_000,
            effective_gas_price: U256::from(2_000_000_000u64),
            logs: vec![],
        };
        assert_eq!(receipt.cost(), U256::from(42_000_000_000_000u64));
    }

    #[test]
    fn test_transaction_from_call_keeps_value() {
        let call = ContractCall::new(Address::repeat_byte(1), vec![0xd0, 0xe3, 0x0d, 0xb0])
            .with_value(U256::from(5u8));
        let tx = TransactionRequest::from_call(Address::repeat_byte(2), call);
        assert_eq!(tx.value, U256::from(5u8));
        assert_eq!(tx.nonce, None);
        assert_eq!(tx.as_call().from, Some(Address::repeat_byte(2)));
    }
}
