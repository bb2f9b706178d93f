//! Decoding of revert payloads.
//!
//! Recognises `Error(string)`, `Panic(uint256)` and the custom errors of the
//! exchange and conduit controller. Anything else keeps its raw bytes and is
//! rendered as hex.

use std::fmt;

use alloy::primitives::Bytes;
use alloy::sol_types::{Panic, Revert, SolError, SolInterface};

use crate::abi::{IConduitController, ISeaport};

/// Revert payload plus its decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertReason {
    /// Raw revert data as returned by the node (empty when unavailable).
    pub raw: Bytes,
    /// Protocol error name, e.g. `OrderAlreadyFilled`. `None` if unrecognised.
    pub name: Option<String>,
    /// Human-readable rendering.
    pub message: String,
}

impl RevertReason {
    /// Decode raw revert data.
    pub fn decode(raw: impl Into<Bytes>) -> Self {
        let raw: Bytes = raw.into();
        let (name, message) = decode_parts(&raw);
        Self { raw, name, message }
    }

    /// Reason known only from a node message (no revert data available).
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            raw: Bytes::new(),
            name: None,
            message: message.into(),
        }
    }

    /// Whether this is the named protocol error.
    pub fn is(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn decode_parts(raw: &[u8]) -> (Option<String>, String) {
    if raw.is_empty() {
        return (None, "reverted without data".to_string());
    }
    if let Ok(revert) = Revert::abi_decode(raw, true) {
        return (Some("Error".to_string()), revert.reason);
    }
    if let Ok(panic) = Panic::abi_decode(raw, true) {
        return (Some("Panic".to_string()), format!("panic code 0x{:x}", panic.code));
    }
    if let Ok(err) = ISeaport::ISeaportErrors::abi_decode(raw, true) {
        return seaport_error(err);
    }
    if let Ok(err) = IConduitController::CallerIsNotOwner::abi_decode(raw, true) {
        return (
            Some("CallerIsNotOwner".to_string()),
            format!("CallerIsNotOwner(conduit={})", err.conduit),
        );
    }
    (None, format!("0x{}", hex::encode(raw)))
}

fn seaport_error(err: ISeaport::ISeaportErrors) -> (Option<String>, String) {
    use ISeaport::ISeaportErrors as E;

    let (name, message) = match err {
        E::InvalidTime(e) => (
            "InvalidTime",
            format!("InvalidTime(start={}, end={})", e.startTime, e.endTime),
        ),
        E::OrderAlreadyFilled(e) => (
            "OrderAlreadyFilled",
            format!("OrderAlreadyFilled(0x{})", hex::encode(e.orderHash)),
        ),
        E::OrderIsCancelled(e) => (
            "OrderIsCancelled",
            format!("OrderIsCancelled(0x{})", hex::encode(e.orderHash)),
        ),
        E::InsufficientNativeTokensSupplied(_) => (
            "InsufficientNativeTokensSupplied",
            "InsufficientNativeTokensSupplied()".to_string(),
        ),
        E::InvalidSigner(_) => ("InvalidSigner", "InvalidSigner()".to_string()),
        E::MissingOriginalConsiderationItems(_) => (
            "MissingOriginalConsiderationItems",
            "MissingOriginalConsiderationItems()".to_string(),
        ),
        E::InvalidConduit(e) => (
            "InvalidConduit",
            format!(
                "InvalidConduit(key=0x{}, conduit={})",
                hex::encode(e.conduitKey),
                e.conduit
            ),
        ),
    };
    (Some(name.to_string()), message)
}
