//! Solidity declarations of the consumed contract interfaces.
//!
//! Struct layouts and the `OrderComponents` field order must match the
//! exchange exactly: the EIP-712 type string derived from them is what the
//! exchange hashes, and any divergence invalidates every signature.

use std::borrow::Cow;

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::Eip712Domain;
use seafill_core::{ConsiderationItem as CoreConsiderationItem, OfferItem as CoreOfferItem};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct OfferItem {
        uint8 itemType;
        address token;
        uint256 identifierOrCriteria;
        uint256 startAmount;
        uint256 endAmount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ConsiderationItem {
        uint8 itemType;
        address token;
        uint256 identifierOrCriteria;
        uint256 startAmount;
        uint256 endAmount;
        address recipient;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct OrderComponents {
        address offerer;
        address zone;
        OfferItem[] offer;
        ConsiderationItem[] consideration;
        uint8 orderType;
        uint256 startTime;
        uint256 endTime;
        bytes32 zoneHash;
        uint256 salt;
        bytes32 conduitKey;
        uint256 counter;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct OrderParameters {
        address offerer;
        address zone;
        OfferItem[] offer;
        ConsiderationItem[] consideration;
        uint8 orderType;
        uint256 startTime;
        uint256 endTime;
        bytes32 zoneHash;
        uint256 salt;
        bytes32 conduitKey;
        uint256 totalOriginalConsiderationItems;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Order {
        OrderParameters parameters;
        bytes signature;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SpentItem {
        uint8 itemType;
        address token;
        uint256 identifier;
        uint256 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ReceivedItem {
        uint8 itemType;
        address token;
        uint256 identifier;
        uint256 amount;
        address recipient;
    }

    interface ISeaport {
        function getCounter(address offerer) external view returns (uint256 counter);
        function getOrderHash(OrderComponents calldata order) external view returns (bytes32 orderHash);
        function getOrderStatus(bytes32 orderHash) external view returns (bool isValidated, bool isCancelled, uint256 totalFilled, uint256 totalSize);
        function fulfillOrder(Order calldata order, bytes32 fulfillerConduitKey) external payable returns (bool fulfilled);

        event OrderFulfilled(bytes32 orderHash, address indexed offerer, address indexed zone, address recipient, SpentItem[] offer, ReceivedItem[] consideration);

        error InvalidTime(uint256 startTime, uint256 endTime);
        error OrderAlreadyFilled(bytes32 orderHash);
        error OrderIsCancelled(bytes32 orderHash);
        error InsufficientNativeTokensSupplied();
        error InvalidSigner();
        error MissingOriginalConsiderationItems();
        error InvalidConduit(bytes32 conduitKey, address conduit);
    }

    interface IConduitController {
        function getChannelStatus(address conduit, address channel) external view returns (bool isOpen);
        function updateChannel(address conduit, address channel, bool isOpen) external;

        error CallerIsNotOwner(address conduit);
    }

    interface IWrappedNative {
        function balanceOf(address account) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function deposit() external payable;
        function approve(address spender, uint256 amount) external returns (bool success);
    }

    interface IAssetContractShared {
        function balanceOf(address account, uint256 id) external view returns (uint256 balance);
        function creator(uint256 id) external view returns (address owner);
        function sharedProxyAddresses(address proxy) external view returns (bool registered);
        function addSharedProxyAddress(address proxy) external;
    }
}

impl From<&CoreOfferItem> for OfferItem {
    fn from(item: &CoreOfferItem) -> Self {
        Self {
            itemType: item.asset.item_type.as_u8(),
            token: item.asset.token,
            identifierOrCriteria: item.asset.identifier_or_criteria,
            startAmount: item.start_amount,
            endAmount: item.end_amount,
        }
    }
}

impl From<&CoreConsiderationItem> for ConsiderationItem {
    fn from(item: &CoreConsiderationItem) -> Self {
        Self {
            itemType: item.asset.item_type.as_u8(),
            token: item.asset.token,
            identifierOrCriteria: item.asset.identifier_or_criteria,
            startAmount: item.start_amount,
            endAmount: item.end_amount,
            recipient: item.recipient,
        }
    }
}

impl From<&seafill_core::OrderParameters> for OrderParameters {
    fn from(p: &seafill_core::OrderParameters) -> Self {
        Self {
            offerer: p.offerer,
            zone: p.zone,
            offer: p.offer.iter().map(OfferItem::from).collect(),
            consideration: p.consideration.iter().map(ConsiderationItem::from).collect(),
            orderType: p.order_type.as_u8(),
            startTime: p.window.start_time,
            endTime: p.window.end_time,
            zoneHash: p.zone_hash,
            salt: p.salt,
            conduitKey: p.conduit_key,
            totalOriginalConsiderationItems: p.total_original_consideration_items,
        }
    }
}

impl From<&seafill_core::Order> for Order {
    fn from(order: &seafill_core::Order) -> Self {
        Self {
            parameters: OrderParameters::from(&order.parameters),
            signature: order.signature.clone(),
        }
    }
}

impl OrderComponents {
    /// Hashable components: the parameters with `counter` in place of the
    /// original consideration count.
    pub fn from_parameters(p: &OrderParameters, counter: U256) -> Self {
        Self {
            offerer: p.offerer,
            zone: p.zone,
            offer: p.offer.clone(),
            consideration: p.consideration.clone(),
            orderType: p.orderType,
            startTime: p.startTime,
            endTime: p.endTime,
            zoneHash: p.zoneHash,
            salt: p.salt,
            conduitKey: p.conduitKey,
            counter,
        }
    }
}

/// Zero `bytes32`, the default zone hash and conduit key.
pub const ZERO_KEY: B256 = B256::ZERO;

/// EIP-712 domain name of the exchange.
pub const EXCHANGE_DOMAIN_NAME: &str = "Seaport";

/// Signing domain of the exchange deployed at `exchange` on `chain_id`.
pub fn exchange_domain(version: &str, chain_id: u64, exchange: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(EXCHANGE_DOMAIN_NAME)),
        Some(Cow::Owned(version.to_string())),
        Some(U256::from(chain_id)),
        Some(exchange),
        None,
    )
}
