//! Per-account submission session.
//!
//! An [`AccountSession`] is the only owner of its account's sequence counter.
//! Submissions are serialized inside the session, so concurrent trade flows
//! that share an account never reuse a sequence number.
//!
//! # Flow
//! 1. Lazy sync of the counter from the ledger's pending transaction count
//! 2. Fee price resolved from the session's [`FeePolicy`]
//! 3. Sequence number reserved, transaction sent
//! 4. On failure: counter re-synced to the ledger's observed value
//! 5. On success: recorded in [`PendingSubmissions`] until confirmed

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use seafill_ledger::{ContractCall, DynLedger, LedgerError, RevertReason, TransactionRequest, TxReceipt};
use seafill_telemetry::Metrics;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::confirm::{Confirmation, PendingTransaction, WaitOptions};
use crate::error::{EngineError, EngineResult, Step};
use crate::fee::FeePolicy;
use crate::keys::{AccountKey, KeyError};
use crate::sequence::SequenceCounter;

/// Outcome of a transaction that reached a final state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined and succeeded.
    Mined(TxReceipt),
    /// Rejected by the contract. `tx_hash` and `receipt` are absent when the
    /// node refused the transaction at submission.
    Reverted {
        tx_hash: Option<B256>,
        reason: RevertReason,
        receipt: Option<Box<TxReceipt>>,
    },
}

impl TxOutcome {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::Mined(receipt) => Some(receipt.transaction_hash),
            Self::Reverted { tx_hash, .. } => *tx_hash,
        }
    }

    pub fn is_mined(&self) -> bool {
        matches!(self, Self::Mined(_))
    }
}

/// Submission accepted by the node and not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub step: Step,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub submitted_at: DateTime<Utc>,
}

/// Outstanding submissions of one session, keyed by transaction hash.
#[derive(Debug, Default)]
pub struct PendingSubmissions {
    entries: DashMap<B256, SubmissionRecord>,
}

impl PendingSubmissions {
    fn insert(&self, tx_hash: B256, record: SubmissionRecord) {
        self.entries.insert(tx_hash, record);
    }

    fn remove(&self, tx_hash: &B256) -> Option<SubmissionRecord> {
        self.entries.remove(tx_hash).map(|(_, record)| record)
    }

    pub fn get(&self, tx_hash: &B256) -> Option<SubmissionRecord> {
        self.entries.get(tx_hash).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, tx_hash: &B256) -> bool {
        self.entries.contains_key(tx_hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hashes ordered by sequence number.
    pub fn hashes(&self) -> Vec<B256> {
        let mut entries: Vec<(u64, B256)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().nonce, *entry.key()))
            .collect();
        entries.sort_unstable();
        entries.into_iter().map(|(_, hash)| hash).collect()
    }
}

fn error_kind(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::Transport(_) => "transport",
        LedgerError::Rpc { .. } => "rpc",
        LedgerError::NonceTooLow(_) => "nonce_too_low",
        LedgerError::Reverted(_) => "reverted",
        LedgerError::Decode(_) => "decode",
    }
}

fn reason_label(reason: &RevertReason) -> &str {
    reason.name.as_deref().unwrap_or("unknown")
}

/// One party's signing identity, sequence counter and fee policy.
pub struct AccountSession {
    key: AccountKey,
    ledger: DynLedger,
    fee_policy: FeePolicy,
    sequence: SequenceCounter,
    /// Serializes reserve + send so sequence numbers reach the node in order.
    submit_lock: Mutex<()>,
    pending: PendingSubmissions,
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSession")
            .field("address", &self.key.address())
            .field("fee_policy", &self.fee_policy)
            .field("next_sequence", &self.sequence.peek())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl AccountSession {
    pub fn new(key: AccountKey, ledger: DynLedger, fee_policy: FeePolicy) -> Self {
        Self {
            key,
            ledger,
            fee_policy,
            sequence: SequenceCounter::new(),
            submit_lock: Mutex::new(()),
            pending: PendingSubmissions::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn ledger(&self) -> &DynLedger {
        &self.ledger
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fee_policy
    }

    /// Sequence number the next submission will use, if already synced.
    pub fn next_sequence(&self) -> Option<u64> {
        self.sequence.is_synced().then(|| self.sequence.peek())
    }

    pub fn pending_submissions(&self) -> &PendingSubmissions {
        &self.pending
    }

    /// Sign a typed-data digest with this account's key.
    pub async fn sign_digest(&self, digest: B256) -> Result<Bytes, KeyError> {
        self.key.sign_digest(digest).await
    }

    async fn resync(&self) {
        match self.ledger.transaction_count(self.address()).await {
            Ok(observed) => self.sequence.reset(observed),
            Err(e) => {
                warn!(account = %self.address(), error = %e, "Sequence resync failed, will retry on next submission");
                self.sequence.invalidate();
            }
        }
    }

    async fn submit(&self, step: Step, call: ContractCall) -> Result<PendingTransaction, LedgerError> {
        let _guard = self.submit_lock.lock().await;
        let account = self.address();

        if !self.sequence.is_synced() {
            let observed = self.ledger.transaction_count(account).await?;
            self.sequence.sync(observed);
        }
        let gas_price = self.fee_policy.resolve(self.ledger.as_ref()).await?;
        let nonce = self.sequence.reserve();

        let to = call.to;
        let value = call.value;
        let mut request = TransactionRequest::from_call(account, call);
        request.nonce = Some(nonce);
        request.gas_price = Some(gas_price);

        match self.ledger.send_transaction(request).await {
            Ok(tx_hash) => {
                self.pending.insert(
                    tx_hash,
                    SubmissionRecord {
                        step,
                        nonce,
                        to,
                        value,
                        submitted_at: Utc::now(),
                    },
                );
                Metrics::submission(step.as_str());
                info!(
                    %account,
                    %step,
                    nonce,
                    %to,
                    %value,
                    %gas_price,
                    %tx_hash,
                    "Transaction submitted"
                );
                Ok(PendingTransaction::new(self.ledger.clone(), tx_hash, account, nonce, step))
            }
            Err(e) => {
                Metrics::submission_error(step.as_str(), error_kind(&e));
                warn!(%account, %step, nonce, error = %e, "Submission rejected");
                self.resync().await;
                Err(e)
            }
        }
    }

    /// Submit `call` and wait until it reaches a final state.
    ///
    /// Contract rejections come back as [`TxOutcome::Reverted`]; the caller
    /// decides which error kind that is for its step.
    ///
    /// # Errors
    /// - `Sequencing` if the ledger reports the sequence number as used
    /// - `StatusUnknown` if the wait timed out or was cancelled
    /// - `Ledger` for any other transport or node failure
    pub async fn execute(&self, step: Step, call: ContractCall, wait: &WaitOptions) -> EngineResult<TxOutcome> {
        let account = self.address();
        let pending = match self.submit(step, call).await {
            Ok(pending) => pending,
            Err(LedgerError::Reverted(reason)) => {
                Metrics::reverted(step.as_str(), reason_label(&reason));
                return Ok(TxOutcome::Reverted {
                    tx_hash: None,
                    reason,
                    receipt: None,
                });
            }
            Err(LedgerError::NonceTooLow(reason)) => {
                return Err(EngineError::Sequencing { step, account, reason });
            }
            Err(source) => return Err(EngineError::Ledger { step, source }),
        };
        self.settle(&pending, wait).await
    }

    async fn settle(&self, pending: &PendingTransaction, wait: &WaitOptions) -> EngineResult<TxOutcome> {
        let step = pending.step();
        let tx_hash = pending.tx_hash();
        let confirmation = pending.confirm(wait).await.map_err(EngineError::ledger(step))?;

        let receipt = match confirmation {
            Confirmation::Confirmed(receipt) => receipt,
            Confirmation::Unknown { tx_hash, .. } | Confirmation::Abandoned { tx_hash } => {
                return Err(EngineError::StatusUnknown {
                    step,
                    account: pending.account(),
                    tx_hash,
                });
            }
        };

        self.pending.remove(&tx_hash);
        Metrics::confirmed(step.as_str(), pending.elapsed().as_secs_f64() * 1000.0);

        if receipt.status {
            debug!(%tx_hash, %step, gas_used = receipt.gas_used, "Transaction mined");
            return Ok(TxOutcome::Mined(receipt));
        }

        let reason = match self.ledger.revert_reason(tx_hash).await {
            Ok(Some(reason)) => reason,
            Ok(None) => RevertReason::from_message("transaction reverted"),
            Err(e) => {
                warn!(%tx_hash, error = %e, "Could not fetch revert reason");
                RevertReason::from_message("transaction reverted")
            }
        };
        Metrics::reverted(step.as_str(), reason_label(&reason));
        warn!(%tx_hash, %step, reason = %reason, "Transaction reverted");
        Ok(TxOutcome::Reverted {
            tx_hash: Some(tx_hash),
            reason,
            receipt: Some(Box::new(receipt)),
        })
    }
}

/// Sessions by account address.
///
/// Every flow that touches an account must go through the session registered
/// here, so the account has exactly one sequence owner.
pub struct SessionRegistry {
    ledger: DynLedger,
    fee_policy: FeePolicy,
    sessions: DashMap<Address, Arc<AccountSession>>,
}

impl SessionRegistry {
    pub fn new(ledger: DynLedger, fee_policy: FeePolicy) -> Self {
        Self {
            ledger,
            fee_policy,
            sessions: DashMap::new(),
        }
    }

    pub fn ledger(&self) -> &DynLedger {
        &self.ledger
    }

    /// Session for `key`'s account, creating it on first use.
    pub fn register(&self, key: AccountKey) -> Arc<AccountSession> {
        self.sessions
            .entry(key.address())
            .or_insert_with(|| {
                Arc::new(AccountSession::new(key, self.ledger.clone(), self.fee_policy))
            })
            .value()
            .clone()
    }

    pub fn get(&self, account: &Address) -> Option<Arc<AccountSession>> {
        self.sessions.get(account).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
