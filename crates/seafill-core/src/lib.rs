//! Core domain types for the seafill trading engine.
//!
//! This crate provides the protocol-level vocabulary used throughout the workspace:
//! - `ItemType`, `AssetRef`: what kind of asset an order item moves
//! - `OfferItem`, `ConsiderationItem`: the two sides of a trade
//! - `OrderParameters`, `Order`: canonical order records fed into the order hash
//! - `parse_units` / `format_units`: exact conversion between decimal input and
//!   smallest-denomination integers

pub mod amount;
pub mod error;
pub mod item;
pub mod order;

pub use amount::{format_units, parse_units, NATIVE_DECIMALS};
pub use error::{CoreError, Result};
pub use item::{AssetRef, ConsiderationItem, ItemType, OfferItem};
pub use order::{
    open_ended_end_time, required_native_value, to_key, Order, OrderParameters, OrderType,
    TimeWindow, TradeId,
};
