//! Offer and consideration items.
//!
//! An item names an asset (kind, token contract, identifier) and the amount
//! moved. Offer items are what the offerer gives up; consideration items are
//! what must be delivered, and to whom.

use std::fmt;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Asset kind, encoded on the wire as `uint8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ItemType {
    /// Native currency of the ledger.
    Native = 0,
    /// Fungible token.
    Erc20 = 1,
    /// Non-fungible token.
    Erc721 = 2,
    /// Multi-asset token.
    Erc1155 = 3,
    /// Any ERC721 id in a merkle criteria set.
    Erc721WithCriteria = 4,
    /// Any ERC1155 id in a merkle criteria set.
    Erc1155WithCriteria = 5,
}

impl ItemType {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode from the wire value.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Native),
            1 => Ok(Self::Erc20),
            2 => Ok(Self::Erc721),
            3 => Ok(Self::Erc1155),
            4 => Ok(Self::Erc721WithCriteria),
            5 => Ok(Self::Erc1155WithCriteria),
            other => Err(CoreError::UnknownItemType(other)),
        }
    }

    #[inline]
    pub fn is_native(self) -> bool {
        matches!(self, Self::Native)
    }

    /// Native and ERC20 carry no identifier.
    #[inline]
    pub fn is_fungible(self) -> bool {
        matches!(self, Self::Native | Self::Erc20)
    }

    #[inline]
    pub fn is_criteria(self) -> bool {
        matches!(self, Self::Erc721WithCriteria | Self::Erc1155WithCriteria)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Erc20 => write!(f, "erc20"),
            Self::Erc721 => write!(f, "erc721"),
            Self::Erc1155 => write!(f, "erc1155"),
            Self::Erc721WithCriteria => write!(f, "erc721_criteria"),
            Self::Erc1155WithCriteria => write!(f, "erc1155_criteria"),
        }
    }
}

/// Asset identifier: (kind, token contract, identifier or criteria root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetRef {
    pub item_type: ItemType,
    pub token: Address,
    pub identifier_or_criteria: U256,
}

impl AssetRef {
    /// The native currency (zero token address, zero identifier).
    pub fn native() -> Self {
        Self {
            item_type: ItemType::Native,
            token: Address::ZERO,
            identifier_or_criteria: U256::ZERO,
        }
    }

    pub fn erc20(token: Address) -> Self {
        Self {
            item_type: ItemType::Erc20,
            token,
            identifier_or_criteria: U256::ZERO,
        }
    }

    pub fn erc721(token: Address, id: U256) -> Self {
        Self {
            item_type: ItemType::Erc721,
            token,
            identifier_or_criteria: id,
        }
    }

    pub fn erc1155(token: Address, id: U256) -> Self {
        Self {
            item_type: ItemType::Erc1155,
            token,
            identifier_or_criteria: id,
        }
    }

    fn validate(&self, side: &'static str, index: usize) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidItem {
            side,
            index,
            reason: reason.to_string(),
        };
        if self.item_type.is_native() && !self.token.is_zero() {
            return Err(invalid("native item must use the zero token address"));
        }
        if !self.item_type.is_native() && self.token.is_zero() {
            return Err(invalid("token address is zero"));
        }
        if self.item_type.is_fungible() && !self.identifier_or_criteria.is_zero() {
            return Err(invalid("fungible item must have a zero identifier"));
        }
        Ok(())
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.item_type.is_fungible() {
            write!(f, "{}:{}", self.item_type, self.token)
        } else {
            write!(
                f,
                "{}:{}#{}",
                self.item_type, self.token, self.identifier_or_criteria
            )
        }
    }
}

fn validate_amounts(
    item_type: ItemType,
    start: U256,
    end: U256,
    side: &'static str,
    index: usize,
) -> Result<()> {
    if start.is_zero() && end.is_zero() {
        return Err(CoreError::InvalidItem {
            side,
            index,
            reason: "amount is zero".to_string(),
        });
    }
    if item_type == ItemType::Erc721 && (start != U256::from(1u8) || end != U256::from(1u8)) {
        return Err(CoreError::InvalidItem {
            side,
            index,
            reason: "erc721 amount must be exactly 1".to_string(),
        });
    }
    Ok(())
}

/// What the offerer gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferItem {
    pub asset: AssetRef,
    pub start_amount: U256,
    pub end_amount: U256,
}

impl OfferItem {
    /// Fixed-price item (start == end).
    pub fn fixed(asset: AssetRef, amount: U256) -> Self {
        Self {
            asset,
            start_amount: amount,
            end_amount: amount,
        }
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.start_amount == self.end_amount
    }

    /// Upper bound of the amount across the order lifetime.
    #[inline]
    pub fn max_amount(&self) -> U256 {
        self.start_amount.max(self.end_amount)
    }

    /// Validate shape constraints for the item at `index`.
    pub fn validate(&self, index: usize) -> Result<()> {
        self.asset.validate("offer", index)?;
        validate_amounts(
            self.asset.item_type,
            self.start_amount,
            self.end_amount,
            "offer",
            index,
        )
    }
}

/// What must be delivered, and to whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsiderationItem {
    pub asset: AssetRef,
    pub start_amount: U256,
    pub end_amount: U256,
    pub recipient: Address,
}

impl ConsiderationItem {
    /// Fixed-price item (start == end).
    pub fn fixed(asset: AssetRef, amount: U256, recipient: Address) -> Self {
        Self {
            asset,
            start_amount: amount,
            end_amount: amount,
            recipient,
        }
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.start_amount == self.end_amount
    }

    #[inline]
    pub fn max_amount(&self) -> U256 {
        self.start_amount.max(self.end_amount)
    }

    pub fn validate(&self, index: usize) -> Result<()> {
        self.asset.validate("consideration", index)?;
        validate_amounts(
            self.asset.item_type,
            self.start_amount,
            self.end_amount,
            "consideration",
            index,
        )?;
        if self.recipient.is_zero() {
            return Err(CoreError::InvalidItem {
                side: "consideration",
                index,
                reason: "recipient is the zero address".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn test_item_type_roundtrip_wire_values() {
        for v in 0u8..=5 {
            assert_eq!(ItemType::from_u8(v).unwrap().as_u8(), v);
        }
        assert_eq!(ItemType::from_u8(6), Err(CoreError::UnknownItemType(6)));
    }

    #[test]
    fn test_item_type_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ItemType,
        }
        let parsed: Wrapper = toml::from_str(r#"kind = "erc1155""#).unwrap();
        assert_eq!(parsed.kind, ItemType::Erc1155);
    }

    #[test]
    fn test_native_requires_zero_token() {
        let mut asset = AssetRef::native();
        asset.token = token();
        let item = OfferItem::fixed(asset, U256::from(1u8));
        assert!(matches!(
            item.validate(0),
            Err(CoreError::InvalidItem { side: "offer", index: 0, .. })
        ));
    }

    #[test]
    fn test_fungible_rejects_identifier() {
        let mut asset = AssetRef::erc20(token());
        asset.identifier_or_criteria = U256::from(42u8);
        let item = OfferItem::fixed(asset, U256::from(1u8));
        assert!(item.validate(3).is_err());
    }

    #[test]
    fn test_erc721_amount_must_be_one() {
        let item = OfferItem::fixed(AssetRef::erc721(token(), U256::from(7u8)), U256::from(2u8));
        assert!(item.validate(0).is_err());
        let item = OfferItem::fixed(AssetRef::erc721(token(), U256::from(7u8)), U256::from(1u8));
        assert!(item.validate(0).is_ok());
    }

    #[test]
    fn test_consideration_requires_recipient() {
        let item = ConsiderationItem::fixed(
            AssetRef::erc1155(token(), U256::from(42u8)),
            U256::from(1u8),
            Address::ZERO,
        );
        assert!(item.validate(1).is_err());
    }

    #[test]
    fn test_max_amount_for_decaying_item() {
        let item = OfferItem {
            asset: AssetRef::erc20(token()),
            start_amount: U256::from(100u64),
            end_amount: U256::from(40u64),
        };
        assert!(!item.is_fixed());
        assert_eq!(item.max_amount(), U256::from(100u64));
    }

    #[test]
    fn test_asset_display() {
        let asset = AssetRef::erc1155(Address::with_last_byte(1), U256::from(42u8));
        assert!(asset.to_string().starts_with("erc1155:"));
        assert!(asset.to_string().ends_with("#42"));
    }
}
