//! Waiting for submitted transactions.
//!
//! Waiting is optional-timeout and cancellable. Neither a timeout nor a
//! cancellation voids the submission: the transaction stays outstanding and
//! may still be mined.

use std::time::{Duration, Instant};

use alloy::primitives::{Address, B256};
use seafill_ledger::{DynLedger, LedgerResult, TxReceipt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Step;

/// Default receipt polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How to wait for a receipt.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub cancel: Option<CancellationToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Result of waiting for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Mined; the receipt says whether it succeeded.
    Confirmed(TxReceipt),
    /// Timed out; still outstanding.
    Unknown { tx_hash: B256, waited: Duration },
    /// Caller cancelled the wait; still outstanding.
    Abandoned { tx_hash: B256 },
}

/// A transaction accepted by the node but not yet known to be mined.
#[derive(Clone)]
pub struct PendingTransaction {
    ledger: DynLedger,
    tx_hash: B256,
    account: Address,
    nonce: u64,
    step: Step,
    submitted_at: Instant,
}

impl std::fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("tx_hash", &self.tx_hash)
            .field("account", &self.account)
            .field("nonce", &self.nonce)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl PendingTransaction {
    pub(crate) fn new(ledger: DynLedger, tx_hash: B256, account: Address, nonce: u64, step: Step) -> Self {
        Self {
            ledger,
            tx_hash,
            account,
            nonce,
            step,
            submitted_at: Instant::now(),
        }
    }

    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Time since the node accepted the transaction.
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    async fn poll_receipt(&self, poll_interval: Duration) -> LedgerResult<TxReceipt> {
        loop {
            if let Some(receipt) = self.ledger.transaction_receipt(self.tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Wait for the receipt.
    ///
    /// # Errors
    /// Only transport errors while polling; timeouts and cancellation are
    /// reported as [`Confirmation::Unknown`] / [`Confirmation::Abandoned`].
    pub async fn confirm(&self, options: &WaitOptions) -> LedgerResult<Confirmation> {
        let cancelled = async {
            match &options.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match options.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let started = Instant::now();
        tokio::select! {
            biased;
            receipt = self.poll_receipt(options.poll_interval) => {
                let receipt = receipt?;
                debug!(
                    tx_hash = %self.tx_hash,
                    step = %self.step,
                    status = receipt.status,
                    block = receipt.block_number,
                    "Transaction confirmed"
                );
                Ok(Confirmation::Confirmed(receipt))
            }
            () = cancelled => {
                warn!(tx_hash = %self.tx_hash, step = %self.step, "Confirmation wait abandoned");
                Ok(Confirmation::Abandoned { tx_hash: self.tx_hash })
            }
            () = deadline => {
                let waited = started.elapsed();
                warn!(
                    tx_hash = %self.tx_hash,
                    step = %self.step,
                    waited_ms = waited.as_millis() as u64,
                    "Confirmation timed out"
                );
                Ok(Confirmation::Unknown { tx_hash: self.tx_hash, waited })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use seafill_ledger::{ContractCall, LedgerClient, SimLedger, TransactionRequest};
    use std::sync::Arc;

    fn sender() -> Address {
        Address::repeat_byte(0x42)
    }

    async fn submit(sim: &Arc<SimLedger>) -> PendingTransaction {
        sim.fund_native(sender(), U256::from(10u64).pow(U256::from(18u8)));
        let call = ContractCall::new(Address::repeat_byte(0x77), Vec::<u8>::new());
        let hash = sim
            .send_transaction(TransactionRequest::from_call(sender(), call))
            .await
            .unwrap();
        PendingTransaction::new(sim.clone(), hash, sender(), 0, Step::Deposit)
    }

    fn fast() -> WaitOptions {
        WaitOptions::default().with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_confirmed() {
        let sim = Arc::new(SimLedger::default());
        let pending = submit(&sim).await;
        let confirmation = pending.confirm(&fast()).await.unwrap();
        match confirmation {
            Confirmation::Confirmed(receipt) => {
                assert!(receipt.status);
                assert_eq!(receipt.transaction_hash, pending.tx_hash());
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_unknown() {
        let sim = Arc::new(SimLedger::default());
        sim.hold_receipts(true);
        let pending = submit(&sim).await;
        let confirmation = pending
            .confirm(&fast().with_timeout(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(matches!(confirmation, Confirmation::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_cancel_is_abandoned() {
        let sim = Arc::new(SimLedger::default());
        sim.hold_receipts(true);
        let pending = submit(&sim).await;

        let token = CancellationToken::new();
        let options = fast().with_cancel(token.clone());
        let waiter = tokio::spawn(async move { pending.confirm(&options).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let confirmation = waiter.await.unwrap().unwrap();
        assert!(matches!(confirmation, Confirmation::Abandoned { .. }));
    }

    #[tokio::test]
    async fn test_late_receipt_after_release() {
        let sim = Arc::new(SimLedger::default());
        sim.hold_receipts(true);
        let pending = submit(&sim).await;

        let release = {
            let sim = sim.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                sim.hold_receipts(false);
            }
        };
        let policy = fast();
        let (confirmation, ()) = tokio::join!(pending.confirm(&policy), release);
        assert!(matches!(confirmation.unwrap(), Confirmation::Confirmed(_)));
    }
}
