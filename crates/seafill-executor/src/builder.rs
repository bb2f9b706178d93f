//! Order construction and signing.
//!
//! # Flow
//! 1. Validate item lists and the native value sum (no network access
//!    before this passes)
//! 2. Fresh random salt unless supplied; offerer counter from the exchange
//!    unless supplied
//! 3. Order hash = EIP-712 struct hash of `OrderComponents`
//! 4. Optional cross-check against the exchange's `getOrderHash`
//! 5. Cancelled orders are refused
//! 6. Offerer signs `keccak256(0x1901 || domainSeparator || orderHash)`

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use seafill_core::{
    ConsiderationItem, OfferItem, Order, OrderParameters, OrderType, TimeWindow,
};
use seafill_ledger::abi::{self, exchange_domain, OrderComponents};
use seafill_ledger::ExchangeContract;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult, Step};
use crate::session::AccountSession;

/// Whether to cross-check the locally computed order hash with the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashCheck {
    /// Trust the local hash; a mismatch surfaces as a failed fulfillment.
    #[default]
    Off,
    /// Call `getOrderHash` and refuse to sign on mismatch.
    Verify,
}

/// Caller input for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub offer: Vec<OfferItem>,
    pub consideration: Vec<ConsiderationItem>,
    pub zone: Address,
    pub order_type: OrderType,
    pub window: TimeWindow,
    pub zone_hash: B256,
    pub conduit_key: B256,
    /// Random when `None`.
    pub salt: Option<U256>,
    /// Read from the exchange when `None`.
    pub counter: Option<U256>,
}

impl OrderRequest {
    pub fn new(offer: Vec<OfferItem>, consideration: Vec<ConsiderationItem>) -> Self {
        Self {
            offer,
            consideration,
            zone: Address::ZERO,
            order_type: OrderType::default(),
            window: TimeWindow::default(),
            zone_hash: B256::ZERO,
            conduit_key: B256::ZERO,
            salt: None,
            counter: None,
        }
    }

    #[must_use]
    pub fn with_zone(mut self, zone: Address, zone_hash: B256) -> Self {
        self.zone = zone;
        self.zone_hash = zone_hash;
        self
    }

    #[must_use]
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_conduit_key(mut self, conduit_key: B256) -> Self {
        self.conduit_key = conduit_key;
        self
    }

    #[must_use]
    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = Some(salt);
        self
    }

    #[must_use]
    pub fn with_counter(mut self, counter: U256) -> Self {
        self.counter = Some(counter);
        self
    }
}

/// A signed order ready for fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltOrder {
    pub order: Order,
    pub order_hash: B256,
    /// Native currency the fulfiller attaches.
    pub value: U256,
    pub counter: U256,
    pub components: OrderComponents,
}

/// Order hash of `parameters` under `counter`.
pub fn order_hash(parameters: &OrderParameters, counter: U256) -> B256 {
    components(parameters, counter).eip712_hash_struct()
}

fn components(parameters: &OrderParameters, counter: U256) -> OrderComponents {
    OrderComponents::from_parameters(&abi::OrderParameters::from(parameters), counter)
}

fn random_salt() -> U256 {
    U256::from_be_bytes(rand::random::<[u8; 32]>())
}

/// Builds and signs orders for one exchange deployment.
pub struct OrderBuilder {
    exchange: ExchangeContract,
    domain: Eip712Domain,
    hash_check: HashCheck,
}

impl OrderBuilder {
    pub fn new(exchange: ExchangeContract, version: &str, chain_id: u64, hash_check: HashCheck) -> Self {
        let domain = exchange_domain(version, chain_id, exchange.address());
        Self {
            exchange,
            domain,
            hash_check,
        }
    }

    pub fn exchange(&self) -> Address {
        self.exchange.address()
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn hash_check(&self) -> HashCheck {
        self.hash_check
    }

    /// Digest the offerer signs for `components`.
    pub fn signing_digest(&self, components: &OrderComponents) -> B256 {
        components.eip712_signing_hash(&self.domain)
    }

    /// Build and sign an order offered by `session`'s account.
    ///
    /// # Errors
    /// - `Validation` for malformed items, an overflowing native value, a
    ///   hash mismatch under [`HashCheck::Verify`], a cancelled order, or a
    ///   key that cannot sign
    /// - `Ledger` if the counter or status read fails
    pub async fn build(&self, session: &AccountSession, request: OrderRequest) -> EngineResult<BuiltOrder> {
        let step = Step::BuildOrder;
        let offerer = session.address();
        let total_original = U256::from(request.consideration.len());

        let parameters = OrderParameters {
            offerer,
            zone: request.zone,
            offer: request.offer,
            consideration: request.consideration,
            order_type: request.order_type,
            window: request.window,
            zone_hash: request.zone_hash,
            salt: request.salt.unwrap_or_else(random_salt),
            conduit_key: request.conduit_key,
            total_original_consideration_items: total_original,
        };
        let invalid = |e: seafill_core::CoreError| EngineError::Validation {
            step,
            reason: e.to_string(),
        };
        parameters.validate().map_err(invalid)?;
        let value = parameters.native_value().map_err(invalid)?;

        let counter = match request.counter {
            Some(counter) => counter,
            None => self
                .exchange
                .counter(offerer)
                .await
                .map_err(EngineError::ledger(step))?,
        };

        let components = components(&parameters, counter);
        let order_hash = components.eip712_hash_struct();
        debug!(%offerer, %counter, %order_hash, "Order hash computed");

        if self.hash_check == HashCheck::Verify {
            let remote = self
                .exchange
                .order_hash(&components)
                .await
                .map_err(EngineError::ledger(step))?;
            if remote != order_hash {
                return Err(EngineError::Validation {
                    step,
                    reason: format!("order hash mismatch: local {order_hash}, exchange {remote}"),
                });
            }
        }

        let status = self
            .exchange
            .order_status(order_hash)
            .await
            .map_err(EngineError::ledger(step))?;
        if status.is_cancelled {
            return Err(EngineError::Validation {
                step,
                reason: format!("order {order_hash} is cancelled"),
            });
        }

        let digest = self.signing_digest(&components);
        let signature = session
            .sign_digest(digest)
            .await
            .map_err(|e| EngineError::Validation {
                step,
                reason: format!("offerer {offerer} cannot sign: {e}"),
            })?;

        info!(
            %offerer,
            %order_hash,
            %counter,
            %value,
            offer_items = parameters.offer.len(),
            consideration_items = parameters.consideration.len(),
            "Order built"
        );

        Ok(BuiltOrder {
            order: Order {
                parameters,
                signature,
            },
            order_hash,
            value,
            counter,
            components,
        })
    }
}
