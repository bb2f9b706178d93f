//! Multi-asset holdings snapshot for a set of accounts and token ids.

use alloy::primitives::{Address, U256};
use seafill_ledger::MultiAssetContract;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{EngineError, EngineResult, Step};

/// Balances of one token id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRow {
    pub token_id: U256,
    pub creator: Address,
    /// Same order as [`HoldingsReport::accounts`].
    pub balances: Vec<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingsReport {
    pub asset_contract: Address,
    pub accounts: Vec<Address>,
    pub rows: Vec<HoldingRow>,
}

impl HoldingsReport {
    /// Read `creator(id)` and `balanceOf(account, id)` for every pair.
    pub async fn collect(
        contract: &MultiAssetContract,
        accounts: &[Address],
        token_ids: &[U256],
    ) -> EngineResult<Self> {
        let step = Step::Holdings;
        let mut rows = Vec::with_capacity(token_ids.len());
        for &token_id in token_ids {
            let creator = contract
                .creator(token_id)
                .await
                .map_err(EngineError::ledger(step))?;
            let mut balances = Vec::with_capacity(accounts.len());
            for &account in accounts {
                let balance = contract
                    .balance_of(account, token_id)
                    .await
                    .map_err(EngineError::ledger(step))?;
                debug!(%token_id, %account, %balance, "Holding");
                balances.push(balance);
            }
            rows.push(HoldingRow {
                token_id,
                creator,
                balances,
            });
        }
        Ok(Self {
            asset_contract: contract.address(),
            accounts: accounts.to_vec(),
            rows,
        })
    }

    /// Balance of `account` for `token_id`, if both are in the report.
    pub fn balance(&self, account: Address, token_id: U256) -> Option<U256> {
        let column = self.accounts.iter().position(|a| *a == account)?;
        self.rows
            .iter()
            .find(|row| row.token_id == token_id)
            .map(|row| row.balances[column])
    }

    pub fn to_json(&self) -> Value {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let balances: serde_json::Map<String, Value> = self
                    .accounts
                    .iter()
                    .zip(&row.balances)
                    .map(|(account, balance)| {
                        (account.to_checksum(None), Value::String(balance.to_string()))
                    })
                    .collect();
                json!({
                    "token_id": row.token_id.to_string(),
                    "creator": row.creator.to_checksum(None),
                    "balances": balances,
                })
            })
            .collect();
        json!({
            "asset_contract": self.asset_contract.to_checksum(None),
            "holdings": rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seafill_ledger::SimLedger;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_reports_every_pair() {
        let sim = Arc::new(SimLedger::default());
        let creator = Address::repeat_byte(0x0c);
        let buyer = Address::repeat_byte(0x0b);
        sim.mint_multi(creator, creator, U256::from(42u64), U256::from(5u64));
        sim.mint_multi(creator, buyer, U256::from(42u64), U256::from(1u64));

        let contract = MultiAssetContract::new(sim.clone(), sim.config().asset_contract);
        let ids = [U256::from(42u64), U256::from(43u64)];
        let report = HoldingsReport::collect(&contract, &[creator, buyer], &ids)
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].creator, creator);
        assert_eq!(report.rows[1].creator, Address::ZERO);
        assert_eq!(report.balance(creator, U256::from(42u64)), Some(U256::from(5u64)));
        assert_eq!(report.balance(buyer, U256::from(42u64)), Some(U256::from(1u64)));
        assert_eq!(report.balance(buyer, U256::from(43u64)), Some(U256::ZERO));
        assert_eq!(report.balance(Address::ZERO, U256::from(42u64)), None);

        let json = report.to_json();
        assert_eq!(json["holdings"][0]["token_id"], "42");
        assert_eq!(json["holdings"][0]["balances"][buyer.to_checksum(None)], "1");
    }
}
