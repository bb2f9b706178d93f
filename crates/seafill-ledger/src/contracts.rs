//! Typed clients for the consumed contract interfaces.
//!
//! Reads go straight to the ledger. Writes only encode: they return a
//! [`ContractCall`] that the caller submits through its account session, so
//! sequencing stays in one place.

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use seafill_core::ItemType;
use tracing::trace;

use crate::abi::{
    IAssetContractShared, IConduitController, ISeaport, IWrappedNative, Order, OrderComponents,
};
use crate::client::{CallRequest, ContractCall, DynLedger, LogEntry};
use crate::error::{LedgerError, LedgerResult};

async fn read<C: SolCall>(ledger: &DynLedger, to: Address, call: C) -> LedgerResult<C::Return> {
    trace!(%to, signature = C::SIGNATURE, "contract read");
    let data = ledger
        .call(CallRequest {
            from: None,
            to,
            data: call.abi_encode().into(),
            value: U256::ZERO,
        })
        .await?;
    C::abi_decode_returns(&data, true)
        .map_err(|e| LedgerError::Decode(format!("{}: {e}", C::SIGNATURE)))
}

fn write<C: SolCall>(to: Address, call: C) -> ContractCall {
    ContractCall::new(to, call.abi_encode())
}

/// On-chain status of an order hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderStatus {
    pub is_validated: bool,
    pub is_cancelled: bool,
    pub total_filled: U256,
    pub total_size: U256,
}

impl OrderStatus {
    /// Fully filled orders cannot be fulfilled again.
    pub fn is_filled(&self) -> bool {
        !self.total_size.is_zero() && self.total_filled >= self.total_size
    }
}

/// One asset movement reported by an `OrderFulfilled` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLeg {
    pub item_type: ItemType,
    pub token: Address,
    pub identifier: U256,
    pub amount: U256,
    pub recipient: Address,
}

/// Decoded `OrderFulfilled` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledEvent {
    pub order_hash: B256,
    pub offerer: Address,
    pub zone: Address,
    /// Fulfiller; receives the offer legs.
    pub recipient: Address,
    pub offer: Vec<TransferLeg>,
    pub consideration: Vec<TransferLeg>,
}

fn item_type(raw: u8) -> LedgerResult<ItemType> {
    ItemType::from_u8(raw).map_err(|e| LedgerError::Decode(e.to_string()))
}

impl FulfilledEvent {
    fn from_event(event: ISeaport::OrderFulfilled) -> LedgerResult<Self> {
        let offer = event
            .offer
            .iter()
            .map(|spent| {
                Ok(TransferLeg {
                    item_type: item_type(spent.itemType)?,
                    token: spent.token,
                    identifier: spent.identifier,
                    amount: spent.amount,
                    recipient: event.recipient,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        let consideration = event
            .consideration
            .iter()
            .map(|received| {
                Ok(TransferLeg {
                    item_type: item_type(received.itemType)?,
                    token: received.token,
                    identifier: received.identifier,
                    amount: received.amount,
                    recipient: received.recipient,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(Self {
            order_hash: event.orderHash,
            offerer: event.offerer,
            zone: event.zone,
            recipient: event.recipient,
            offer,
            consideration,
        })
    }
}

/// Client for the exchange contract.
#[derive(Clone)]
pub struct ExchangeContract {
    ledger: DynLedger,
    address: Address,
}

impl ExchangeContract {
    pub fn new(ledger: DynLedger, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Current counter of `offerer`; part of every order hash.
    pub async fn counter(&self, offerer: Address) -> LedgerResult<U256> {
        let ret = read(&self.ledger, self.address, ISeaport::getCounterCall { offerer }).await?;
        Ok(ret.counter)
    }

    /// Order hash as computed by the exchange itself.
    pub async fn order_hash(&self, components: &OrderComponents) -> LedgerResult<B256> {
        let call = ISeaport::getOrderHashCall {
            order: components.clone(),
        };
        Ok(read(&self.ledger, self.address, call).await?.orderHash)
    }

    pub async fn order_status(&self, order_hash: B256) -> LedgerResult<OrderStatus> {
        let ret = read(
            &self.ledger,
            self.address,
            ISeaport::getOrderStatusCall {
                orderHash: order_hash,
            },
        )
        .await?;
        Ok(OrderStatus {
            is_validated: ret.isValidated,
            is_cancelled: ret.isCancelled,
            total_filled: ret.totalFilled,
            total_size: ret.totalSize,
        })
    }

    /// Encode `fulfillOrder(order, fulfillerConduitKey)` with `value` attached.
    pub fn fulfill_order(&self, order: Order, fulfiller_conduit_key: B256, value: U256) -> ContractCall {
        write(
            self.address,
            ISeaport::fulfillOrderCall {
                order,
                fulfillerConduitKey: fulfiller_conduit_key,
            },
        )
        .with_value(value)
    }

    /// Decode every `OrderFulfilled` event this exchange emitted in `logs`.
    pub fn decode_fulfilled(&self, logs: &[LogEntry]) -> LedgerResult<Vec<FulfilledEvent>> {
        logs.iter()
            .filter(|log| {
                log.address == self.address
                    && log.topics.first() == Some(&ISeaport::OrderFulfilled::SIGNATURE_HASH)
            })
            .map(|log| {
                let event = ISeaport::OrderFulfilled::decode_raw_log(
                    log.topics.iter().copied(),
                    &log.data,
                    true,
                )
                .map_err(|e| LedgerError::Decode(format!("OrderFulfilled: {e}")))?;
                FulfilledEvent::from_event(event)
            })
            .collect()
    }
}

/// Client for the conduit controller.
#[derive(Clone)]
pub struct ConduitControllerContract {
    ledger: DynLedger,
    address: Address,
}

impl ConduitControllerContract {
    pub fn new(ledger: DynLedger, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn channel_status(&self, conduit: Address, channel: Address) -> LedgerResult<bool> {
        let ret = read(
            &self.ledger,
            self.address,
            IConduitController::getChannelStatusCall { conduit, channel },
        )
        .await?;
        Ok(ret.isOpen)
    }

    /// Only the conduit owner may submit this.
    pub fn update_channel(&self, conduit: Address, channel: Address, open: bool) -> ContractCall {
        write(
            self.address,
            IConduitController::updateChannelCall {
                conduit,
                channel,
                isOpen: open,
            },
        )
    }
}

/// Client for the wrapped native fungible token.
#[derive(Clone)]
pub struct FungibleTokenContract {
    ledger: DynLedger,
    address: Address,
}

impl FungibleTokenContract {
    pub fn new(ledger: DynLedger, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, account: Address) -> LedgerResult<U256> {
        let ret = read(&self.ledger, self.address, IWrappedNative::balanceOfCall { account }).await?;
        Ok(ret.balance)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> LedgerResult<U256> {
        let ret = read(
            &self.ledger,
            self.address,
            IWrappedNative::allowanceCall { owner, spender },
        )
        .await?;
        Ok(ret.remaining)
    }

    /// Wrap `amount` of native currency.
    pub fn deposit(&self, amount: U256) -> ContractCall {
        write(self.address, IWrappedNative::depositCall {}).with_value(amount)
    }

    pub fn approve(&self, spender: Address, amount: U256) -> ContractCall {
        write(self.address, IWrappedNative::approveCall { spender, amount })
    }
}

/// Client for the shared multi-asset (ERC1155) contract.
#[derive(Clone)]
pub struct MultiAssetContract {
    ledger: DynLedger,
    address: Address,
}

impl MultiAssetContract {
    pub fn new(ledger: DynLedger, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, account: Address, id: U256) -> LedgerResult<U256> {
        let ret = read(
            &self.ledger,
            self.address,
            IAssetContractShared::balanceOfCall { account, id },
        )
        .await?;
        Ok(ret.balance)
    }

    pub async fn creator(&self, id: U256) -> LedgerResult<Address> {
        let ret = read(&self.ledger, self.address, IAssetContractShared::creatorCall { id }).await?;
        Ok(ret.owner)
    }

    pub async fn is_shared_proxy(&self, proxy: Address) -> LedgerResult<bool> {
        let ret = read(
            &self.ledger,
            self.address,
            IAssetContractShared::sharedProxyAddressesCall { proxy },
        )
        .await?;
        Ok(ret.registered)
    }

    /// Only the contract admin may submit this.
    pub fn add_shared_proxy(&self, proxy: Address) -> ContractCall {
        write(
            self.address,
            IAssetContractShared::addSharedProxyAddressCall { proxy },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{ReceivedItem, SpentItem};
    use crate::sim::SimLedger;
    use std::sync::Arc;

    #[test]
    fn test_order_status_filled() {
        let mut status = OrderStatus::default();
        assert!(!status.is_filled());
        status.total_size = U256::from(1u8);
        status.total_filled = U256::from(1u8);
        assert!(status.is_filled());
    }

    #[test]
    fn test_deposit_attaches_value() {
        let ledger: DynLedger = Arc::new(SimLedger::default());
        let token = FungibleTokenContract::new(ledger, Address::repeat_byte(0x0a));
        let call = token.deposit(U256::from(5u8));
        assert_eq!(call.value, U256::from(5u8));
        assert_eq!(&call.data[..4], &IWrappedNative::depositCall::SELECTOR);
    }

    #[test]
    fn test_decode_fulfilled_filters_by_address() {
        let exchange_addr = Address::repeat_byte(0xee);
        let ledger: DynLedger = Arc::new(SimLedger::default());
        let exchange = ExchangeContract::new(ledger, exchange_addr);

        let event = ISeaport::OrderFulfilled {
            orderHash: B256::repeat_byte(0x01),
            offerer: Address::repeat_byte(0x02),
            zone: Address::ZERO,
            recipient: Address::repeat_byte(0x03),
            offer: vec![SpentItem {
                itemType: 1,
                token: Address::repeat_byte(0x0a),
                identifier: U256::ZERO,
                amount: U256::from(100u8),
            }],
            consideration: vec![ReceivedItem {
                itemType: 3,
                token: Address::repeat_byte(0x0b),
                identifier: U256::from(42u8),
                amount: U256::from(1u8),
                recipient: Address::repeat_byte(0x02),
            }],
        };
        let log_data = event.encode_log_data();
        let log = LogEntry {
            address: exchange_addr,
            topics: log_data.topics().to_vec(),
            data: log_data.data.clone(),
        };
        let foreign = LogEntry {
            address: Address::repeat_byte(0x99),
            ..log.clone()
        };

        let decoded = exchange.decode_fulfilled(&[foreign, log]).unwrap();
        assert_eq!(decoded.len(), 1);
        let fulfilled = &decoded[0];
        assert_eq!(fulfilled.order_hash, B256::repeat_byte(0x01));
        assert_eq!(fulfilled.offer[0].item_type, ItemType::Erc20);
        assert_eq!(fulfilled.offer[0].recipient, Address::repeat_byte(0x03));
        assert_eq!(fulfilled.consideration[0].identifier, U256::from(42u8));
        assert_eq!(fulfilled.consideration[0].recipient, Address::repeat_byte(0x02));
    }
}
