//! `serialize_with` helpers for ledger primitives in reports.
//!
//! Hashes are `0x`-prefixed hex; amounts are decimal strings so JSON
//! consumers never lose precision.

use alloy::primitives::{B256, U256};
use serde::Serializer;

pub fn b256<S: Serializer>(value: &B256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(value)))
}

pub fn opt_b256<S: Serializer>(value: &Option<B256>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => b256(value, serializer),
        None => serializer.serialize_none(),
    }
}

pub fn u256<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Row {
        #[serde(serialize_with = "u256")]
        amount: U256,
        #[serde(serialize_with = "opt_b256")]
        tx_hash: Option<B256>,
    }

    #[test]
    fn test_amounts_and_hashes_render_as_strings() {
        let row = Row {
            amount: U256::MAX,
            tx_hash: Some(B256::repeat_byte(0xab)),
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "amount": U256::MAX.to_string(),
                "tx_hash": format!("0x{}", "ab".repeat(32)),
            })
        );

        let empty = Row {
            amount: U256::ZERO,
            tx_hash: None,
        };
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            json!({ "amount": "0", "tx_hash": null })
        );
    }
}
