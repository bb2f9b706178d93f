//! Order records and identifiers.
//!
//! `OrderParameters` carries every field that feeds the order hash except the
//! offerer's counter, which is read from the exchange at build time.

use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::item::{ConsiderationItem, OfferItem};

/// Order type, encoded on the wire as `uint8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OrderType {
    /// No partial fills, anyone can fulfill.
    FullOpen = 0,
    /// Partial fills supported, anyone can fulfill.
    #[default]
    PartialOpen = 1,
    /// No partial fills, only offerer or zone can fulfill.
    FullRestricted = 2,
    /// Partial fills supported, only offerer or zone can fulfill.
    PartialRestricted = 3,
}

impl OrderType {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::FullOpen),
            1 => Ok(Self::PartialOpen),
            2 => Ok(Self::FullRestricted),
            3 => Ok(Self::PartialRestricted),
            other => Err(CoreError::UnknownOrderType(other)),
        }
    }

    #[inline]
    pub fn is_restricted(self) -> bool {
        matches!(self, Self::FullRestricted | Self::PartialRestricted)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullOpen => write!(f, "full_open"),
            Self::PartialOpen => write!(f, "partial_open"),
            Self::FullRestricted => write!(f, "full_restricted"),
            Self::PartialRestricted => write!(f, "partial_restricted"),
        }
    }
}

/// End time used for orders that never expire in practice.
pub fn open_ended_end_time() -> U256 {
    U256::from(0xffu8) << 104
}

/// Validity window in ledger seconds: `start_time <= now < end_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_time: U256,
    pub end_time: U256,
}

impl TimeWindow {
    pub fn new(start_time: U256, end_time: U256) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// Whether the window is active at ledger time `now`.
    pub fn contains(&self, now: u64) -> bool {
        let now = U256::from(now);
        self.start_time <= now && now < self.end_time
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            start_time: U256::ZERO,
            end_time: open_ended_end_time(),
        }
    }
}

/// Everything the exchange needs to validate an order, minus the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParameters {
    pub offerer: Address,
    pub zone: Address,
    pub offer: Vec<OfferItem>,
    pub consideration: Vec<ConsiderationItem>,
    pub order_type: OrderType,
    pub window: TimeWindow,
    pub zone_hash: B256,
    pub salt: U256,
    pub conduit_key: B256,
    pub total_original_consideration_items: U256,
}

impl OrderParameters {
    /// Validate item lists: both non-empty and every item well-formed.
    pub fn validate(&self) -> Result<()> {
        if self.offer.is_empty() {
            return Err(CoreError::EmptyItems("offer"));
        }
        if self.consideration.is_empty() {
            return Err(CoreError::EmptyItems("consideration"));
        }
        for (i, item) in self.offer.iter().enumerate() {
            item.validate(i)?;
        }
        for (i, item) in self.consideration.iter().enumerate() {
            item.validate(i)?;
        }
        Ok(())
    }

    /// Native currency the fulfiller must attach.
    pub fn native_value(&self) -> Result<U256> {
        required_native_value(&self.consideration)
    }
}

/// Sum of native consideration amounts (upper bound for decaying items).
///
/// # Errors
/// Returns `CoreError::InvalidAmount` if the sum overflows `U256`.
pub fn required_native_value(consideration: &[ConsiderationItem]) -> Result<U256> {
    consideration
        .iter()
        .filter(|item| item.asset.item_type.is_native())
        .try_fold(U256::ZERO, |acc, item| {
            acc.checked_add(item.max_amount()).ok_or_else(|| {
                CoreError::InvalidAmount("native consideration overflows 256 bits".to_string())
            })
        })
}

/// Signed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub parameters: OrderParameters,
    /// 65-byte `r || s || v` signature, v in {27, 28}.
    pub signature: Bytes,
}

/// Encode a numeric key as a left-padded `bytes32` (conduit / fulfiller key).
pub fn to_key(value: u64) -> B256 {
    B256::from(U256::from(value))
}

/// Correlation id for one trade flow, used in logs and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeId(String);

impl TradeId {
    /// Format: `trade_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("trade_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::AssetRef;

    fn recipient() -> Address {
        Address::repeat_byte(0x22)
    }

    fn params(consideration: Vec<ConsiderationItem>) -> OrderParameters {
        OrderParameters {
            offerer: Address::repeat_byte(0x01),
            zone: Address::ZERO,
            offer: vec![OfferItem::fixed(
                AssetRef::erc20(Address::repeat_byte(0x33)),
                U256::from(10u8),
            )],
            total_original_consideration_items: U256::from(consideration.len()),
            consideration,
            order_type: OrderType::PartialOpen,
            window: TimeWindow::default(),
            zone_hash: B256::ZERO,
            salt: U256::from(1u8),
            conduit_key: B256::ZERO,
        }
    }

    #[test]
    fn test_native_value_sums_only_native() {
        let p = params(vec![
            ConsiderationItem::fixed(AssetRef::native(), U256::from(70u8), recipient()),
            ConsiderationItem::fixed(
                AssetRef::erc1155(Address::repeat_byte(0x44), U256::from(42u8)),
                U256::from(1u8),
                recipient(),
            ),
            ConsiderationItem::fixed(AssetRef::native(), U256::from(30u8), Address::repeat_byte(0x55)),
        ]);
        assert_eq!(p.native_value(), Ok(U256::from(100u8)));
    }

    #[test]
    fn test_native_value_zero_without_native_items() {
        let p = params(vec![ConsiderationItem::fixed(
            AssetRef::erc1155(Address::repeat_byte(0x44), U256::from(42u8)),
            U256::from(1u8),
            recipient(),
        )]);
        assert_eq!(p.native_value(), Ok(U256::ZERO));
    }

    #[test]
    fn test_native_value_overflow_is_error() {
        let p = params(vec![
            ConsiderationItem::fixed(AssetRef::native(), U256::MAX, recipient()),
            ConsiderationItem::fixed(AssetRef::native(), U256::from(1u8), recipient()),
        ]);
        assert!(matches!(p.native_value(), Err(CoreError::InvalidAmount(_))));
    }

    #[test]
    fn test_validate_rejects_empty_sides() {
        let p = params(vec![]);
        assert_eq!(p.validate(), Err(CoreError::EmptyItems("consideration")));

        let mut p = params(vec![ConsiderationItem::fixed(
            AssetRef::native(),
            U256::from(1u8),
            recipient(),
        )]);
        p.offer.clear();
        assert_eq!(p.validate(), Err(CoreError::EmptyItems("offer")));
    }

    #[test]
    fn test_time_window() {
        let window = TimeWindow::new(U256::from(100u64), U256::from(200u64));
        assert!(!window.contains(99));
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
        assert!(TimeWindow::default().contains(1_700_000_000));
    }

    #[test]
    fn test_to_key_left_pads() {
        let key = to_key(1);
        assert_eq!(key.as_slice()[31], 1);
        assert!(key.as_slice()[..31].iter().all(|b| *b == 0));
        assert_eq!(to_key(0), B256::ZERO);
    }

    #[test]
    fn test_order_type_wire_values() {
        assert_eq!(OrderType::default(), OrderType::PartialOpen);
        assert_eq!(OrderType::PartialOpen.as_u8(), 1);
        assert_eq!(OrderType::from_u8(3).unwrap(), OrderType::PartialRestricted);
        assert!(OrderType::from_u8(9).is_err());
    }

    #[test]
    fn test_trade_id_unique() {
        let a = TradeId::new();
        let b = TradeId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("trade_"));
    }
}
