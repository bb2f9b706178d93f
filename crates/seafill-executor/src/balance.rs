//! Pre-trade funding of the wrapped native token.

use alloy::primitives::{Address, B256, U256};
use seafill_ledger::{FungibleTokenContract, LedgerError};
use serde::Serialize;
use tracing::{debug, info};

use crate::confirm::WaitOptions;
use crate::error::{EngineError, EngineResult, Step};
use crate::session::{AccountSession, TxOutcome};

/// Result of [`BalanceReconciler::ensure_balance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceOutcome {
    #[serde(serialize_with = "crate::serde_hex::u256")]
    pub balance: U256,
    /// Zero when no deposit was needed.
    #[serde(serialize_with = "crate::serde_hex::u256")]
    pub deposited: U256,
    #[serde(serialize_with = "crate::serde_hex::opt_b256")]
    pub tx_hash: Option<B256>,
}

/// Result of [`BalanceReconciler::ensure_allowance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllowanceOutcome {
    #[serde(serialize_with = "crate::serde_hex::u256")]
    pub allowance: U256,
    #[serde(serialize_with = "crate::serde_hex::opt_b256")]
    pub tx_hash: Option<B256>,
}

/// Brings fungible balances and allowances up to a target.
///
/// Never withdraws: a balance above target is left alone.
pub struct BalanceReconciler {
    token: FungibleTokenContract,
    wait: WaitOptions,
}

impl BalanceReconciler {
    pub fn new(token: FungibleTokenContract, wait: WaitOptions) -> Self {
        Self { token, wait }
    }

    pub fn token(&self) -> Address {
        self.token.address()
    }

    fn funding(&self, step: Step, account: Address, amount: U256, reason: impl Into<String>) -> EngineError {
        EngineError::Funding {
            step,
            account,
            asset: self.token.address(),
            amount,
            reason: reason.into(),
        }
    }

    // Node-side refusals (insufficient funds for gas, etc.) are funding
    // failures here; transport problems stay ledger errors.
    fn map_submission(&self, step: Step, account: Address, amount: U256, err: EngineError) -> EngineError {
        match err {
            EngineError::Ledger {
                source: LedgerError::Rpc { message, .. },
                ..
            } => self.funding(step, account, amount, message),
            other => other,
        }
    }

    /// Make sure `session`'s account holds at least `target` of the token,
    /// depositing native currency for the shortfall.
    ///
    /// # Errors
    /// `Funding` if the account lacks the native currency, the deposit
    /// reverts, or the balance is still short afterwards.
    pub async fn ensure_balance(&self, session: &AccountSession, target: U256) -> EngineResult<BalanceOutcome> {
        let step = Step::Deposit;
        let account = session.address();
        let current = self
            .token
            .balance_of(account)
            .await
            .map_err(EngineError::ledger(step))?;
        if current >= target {
            debug!(%account, %current, %target, "Balance already sufficient");
            return Ok(BalanceOutcome {
                balance: current,
                deposited: U256::ZERO,
                tx_hash: None,
            });
        }

        let shortfall = target - current;
        let native = session
            .ledger()
            .native_balance(account)
            .await
            .map_err(EngineError::ledger(step))?;
        if native < shortfall {
            return Err(self.funding(
                step,
                account,
                shortfall,
                format!("native balance {native} below required deposit {shortfall}"),
            ));
        }

        info!(%account, %current, %target, %shortfall, "Depositing");
        let outcome = session
            .execute(step, self.token.deposit(shortfall), &self.wait)
            .await
            .map_err(|e| self.map_submission(step, account, shortfall, e))?;
        let tx_hash = match outcome {
            TxOutcome::Mined(receipt) => receipt.transaction_hash,
            TxOutcome::Reverted { reason, .. } => {
                return Err(self.funding(step, account, shortfall, reason.to_string()));
            }
        };

        let balance = self
            .token
            .balance_of(account)
            .await
            .map_err(EngineError::ledger(step))?;
        if balance < target {
            return Err(self.funding(
                step,
                account,
                shortfall,
                format!("balance {balance} still below target {target} after {tx_hash}"),
            ));
        }

        info!(%account, %balance, %tx_hash, "Deposit confirmed");
        Ok(BalanceOutcome {
            balance,
            deposited: shortfall,
            tx_hash: Some(tx_hash),
        })
    }

    /// Make sure `spender` may move at least `amount` of the token for
    /// `session`'s account. Approves exactly `amount` when short.
    ///
    /// # Errors
    /// `Funding` if the approval reverts or does not take effect.
    pub async fn ensure_allowance(
        &self,
        session: &AccountSession,
        spender: Address,
        amount: U256,
    ) -> EngineResult<AllowanceOutcome> {
        let step = Step::Approve;
        let account = session.address();
        let current = self
            .token
            .allowance(account, spender)
            .await
            .map_err(EngineError::ledger(step))?;
        if current >= amount {
            debug!(%account, %spender, %current, "Allowance already sufficient");
            return Ok(AllowanceOutcome {
                allowance: current,
                tx_hash: None,
            });
        }

        info!(%account, %spender, %amount, "Approving");
        let outcome = session
            .execute(step, self.token.approve(spender, amount), &self.wait)
            .await
            .map_err(|e| self.map_submission(step, account, amount, e))?;
        let tx_hash = match outcome {
            TxOutcome::Mined(receipt) => receipt.transaction_hash,
            TxOutcome::Reverted { reason, .. } => {
                return Err(self.funding(step, account, amount, reason.to_string()));
            }
        };

        let allowance = self
            .token
            .allowance(account, spender)
            .await
            .map_err(EngineError::ledger(step))?;
        if allowance < amount {
            return Err(self.funding(
                step,
                account,
                amount,
                format!("allowance {allowance} below {amount} after {tx_hash}"),
            ));
        }
        Ok(AllowanceOutcome {
            allowance,
            tx_hash: Some(tx_hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeePolicy;
    use crate::keys::AccountKey;
    use seafill_core::{parse_units, NATIVE_DECIMALS};
    use seafill_ledger::SimLedger;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn units(value: rust_decimal::Decimal) -> U256 {
        parse_units(value, NATIVE_DECIMALS).unwrap()
    }

    fn setup(native: U256) -> (Arc<SimLedger>, AccountSession, BalanceReconciler) {
        let sim = Arc::new(SimLedger::default());
        let key = AccountKey::random();
        sim.fund_native(key.address(), native);
        let session = AccountSession::new(key, sim.clone(), FeePolicy::Network);
        let token = FungibleTokenContract::new(sim.clone(), sim.config().fungible);
        let wait = WaitOptions::default().with_poll_interval(Duration::from_millis(5));
        (sim, session, BalanceReconciler::new(token, wait))
    }

    #[tokio::test]
    async fn test_tops_up_exact_shortfall() {
        let (sim, session, reconciler) = setup(units(dec!(1)));
        sim.set_fungible_balance(session.address(), units(dec!(0.05)));

        let outcome = reconciler
            .ensure_balance(&session, units(dec!(0.2)))
            .await
            .unwrap();
        assert_eq!(outcome.balance, units(dec!(0.2)));
        assert_eq!(outcome.deposited, units(dec!(0.15)));
        assert!(outcome.tx_hash.is_some());
    }

    #[tokio::test]
    async fn test_no_transaction_when_target_met() {
        let (sim, session, reconciler) = setup(units(dec!(1)));
        sim.set_fungible_balance(session.address(), units(dec!(0.5)));

        let outcome = reconciler
            .ensure_balance(&session, units(dec!(0.2)))
            .await
            .unwrap();
        // Never decreases.
        assert_eq!(outcome.balance, units(dec!(0.5)));
        assert_eq!(outcome.deposited, U256::ZERO);
        assert_eq!(outcome.tx_hash, None);
        assert!(sim.transactions_from(session.address()).is_empty());
    }

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let (sim, session, reconciler) = setup(units(dec!(1)));
        let target = units(dec!(0.3));

        reconciler.ensure_balance(&session, target).await.unwrap();
        let again = reconciler.ensure_balance(&session, target).await.unwrap();
        assert_eq!(again.tx_hash, None);
        assert_eq!(sim.transactions_from(session.address()).len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_native_is_funding_error() {
        let (sim, session, reconciler) = setup(units(dec!(0.01)));
        let err = reconciler
            .ensure_balance(&session, units(dec!(0.2)))
            .await
            .unwrap_err();
        match err {
            EngineError::Funding {
                step, asset, amount, ..
            } => {
                assert_eq!(step, Step::Deposit);
                assert_eq!(asset, sim.config().fungible);
                assert_eq!(amount, units(dec!(0.2)));
            }
            other => panic!("expected Funding, got {other:?}"),
        }
        assert!(sim.transactions_from(session.address()).is_empty());
    }

    #[tokio::test]
    async fn test_gas_shortfall_is_funding_error() {
        // Enough for the deposit itself but not for the fee on top.
        let (_sim, session, reconciler) = setup(units(dec!(0.2)));
        let err = reconciler
            .ensure_balance(&session, units(dec!(0.2)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Funding { .. }));
    }

    #[tokio::test]
    async fn test_ensure_allowance() {
        let (sim, session, reconciler) = setup(units(dec!(1)));
        let spender = sim.config().exchange;
        let amount = units(dec!(0.1));

        let first = reconciler
            .ensure_allowance(&session, spender, amount)
            .await
            .unwrap();
        assert_eq!(first.allowance, amount);
        assert!(first.tx_hash.is_some());
        assert_eq!(sim.allowance_of(session.address(), spender), amount);

        let second = reconciler
            .ensure_allowance(&session, spender, amount)
            .await
            .unwrap();
        assert_eq!(second.tx_hash, None);
    }
}
