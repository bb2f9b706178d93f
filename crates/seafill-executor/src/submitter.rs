//! Order fulfillment.
//!
//! One `fulfillOrder` transaction per call, never retried. A rejection keeps
//! the exchange's revert reason untouched so callers can tell
//! `OrderAlreadyFilled` from `InvalidTime` and the rest.

use alloy::primitives::{Address, B256, U256};
use seafill_ledger::abi;
use seafill_ledger::{ExchangeContract, FulfilledEvent, TransferLeg, TxReceipt};
use seafill_telemetry::Metrics;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::builder::BuiltOrder;
use crate::confirm::WaitOptions;
use crate::error::{EngineError, EngineResult, Step};
use crate::session::{AccountSession, TxOutcome};

/// Settlement of a successful fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: U256,
    /// Fee paid, `gas_used * effective_gas_price`.
    pub cost: U256,
    pub order_hash: B256,
    pub value: U256,
    pub fulfiller: Address,
    pub events: Vec<FulfilledEvent>,
}

impl SettlementReceipt {
    fn from_receipt(
        receipt: &TxReceipt,
        built: &BuiltOrder,
        fulfiller: Address,
        events: Vec<FulfilledEvent>,
    ) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            success: receipt.status,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            cost: receipt.cost(),
            order_hash: built.order_hash,
            value: built.value,
            fulfiller,
            events,
        }
    }

    /// JSON rendering with hex hashes and decimal amounts.
    pub fn to_json(&self) -> Value {
        json!({
            "tx_hash": format!("0x{}", hex::encode(self.tx_hash)),
            "success": self.success,
            "block_number": self.block_number,
            "gas_used": self.gas_used,
            "effective_gas_price": self.effective_gas_price.to_string(),
            "cost": self.cost.to_string(),
            "order_hash": format!("0x{}", hex::encode(self.order_hash)),
            "value": self.value.to_string(),
            "fulfiller": self.fulfiller.to_checksum(None),
            "events": self.events.iter().map(event_json).collect::<Vec<_>>(),
        })
    }
}

fn leg_json(leg: &TransferLeg) -> Value {
    json!({
        "item_type": leg.item_type.to_string(),
        "token": leg.token.to_checksum(None),
        "identifier": leg.identifier.to_string(),
        "amount": leg.amount.to_string(),
        "recipient": leg.recipient.to_checksum(None),
    })
}

fn event_json(event: &FulfilledEvent) -> Value {
    json!({
        "order_hash": format!("0x{}", hex::encode(event.order_hash)),
        "offerer": event.offerer.to_checksum(None),
        "zone": event.zone.to_checksum(None),
        "recipient": event.recipient.to_checksum(None),
        "offer": event.offer.iter().map(leg_json).collect::<Vec<_>>(),
        "consideration": event.consideration.iter().map(leg_json).collect::<Vec<_>>(),
    })
}

/// Submits signed orders to the exchange.
pub struct FulfillmentSubmitter {
    exchange: ExchangeContract,
    wait: WaitOptions,
}

impl FulfillmentSubmitter {
    pub fn new(exchange: ExchangeContract, wait: WaitOptions) -> Self {
        Self { exchange, wait }
    }

    /// Fulfill `built` from `session`'s account, attaching `built.value`.
    ///
    /// # Errors
    /// - `Settlement` if the exchange rejects the order, at submission or
    ///   when mined
    /// - `StatusUnknown` if the wait timed out or was cancelled
    pub async fn fulfill(
        &self,
        session: &AccountSession,
        built: &BuiltOrder,
        fulfiller_conduit_key: B256,
    ) -> EngineResult<SettlementReceipt> {
        let step = Step::Fulfill;
        let account = session.address();
        let call = self.exchange.fulfill_order(
            abi::Order::from(&built.order),
            fulfiller_conduit_key,
            built.value,
        );

        info!(
            fulfiller = %account,
            order_hash = %built.order_hash,
            value = %built.value,
            "Submitting fulfillment"
        );
        let outcome = match session.execute(step, call, &self.wait).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let label = match e {
                    EngineError::StatusUnknown { .. } => "unknown",
                    _ => "error",
                };
                Metrics::fulfillment(label);
                return Err(e);
            }
        };

        match outcome {
            TxOutcome::Mined(receipt) => {
                let events = self
                    .exchange
                    .decode_fulfilled(&receipt.logs)
                    .map_err(EngineError::ledger(step))?;
                Metrics::fulfillment("filled");
                let settlement = SettlementReceipt::from_receipt(&receipt, built, account, events);
                info!(
                    tx_hash = %settlement.tx_hash,
                    order_hash = %settlement.order_hash,
                    gas_used = settlement.gas_used,
                    cost = %settlement.cost,
                    events = settlement.events.len(),
                    "Order fulfilled"
                );
                Ok(settlement)
            }
            TxOutcome::Reverted {
                tx_hash,
                reason,
                receipt,
            } => {
                Metrics::fulfillment("reverted");
                error!(
                    fulfiller = %account,
                    order_hash = %built.order_hash,
                    reason = %reason,
                    "Fulfillment rejected"
                );
                Err(EngineError::Settlement {
                    step,
                    account,
                    tx_hash,
                    reason,
                    receipt,
                })
            }
        }
    }
}
