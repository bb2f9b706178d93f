//! JSON-RPC 2.0 ledger client over HTTP.
//!
//! Transactions are submitted with `eth_sendTransaction`, so the node holds the
//! account keys; the engine only decides sequence numbers and fee prices.
//! Quantities are hex strings on the wire and are parsed by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::client::{
    BoxFuture, CallRequest, LedgerClient, LogEntry, TransactionRequest, TxReceipt,
};
use crate::error::{LedgerError, LedgerResult};
use crate::revert::RevertReason;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Ledger client speaking JSON-RPC to a single node.
pub struct RpcLedger {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Create a new client for the node at `url`.
    pub fn new(url: impl Into<String>) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(id, method, "RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::Transport(format!("HTTP {status}: {text}")));
        }

        let mut reply: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("Failed to parse response: {e}")))?;

        if let Some(error) = reply.get("error") {
            return Err(map_rpc_error(error));
        }
        Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }
}

/// Map a JSON-RPC error object onto the ledger error taxonomy.
fn map_rpc_error(error: &Value) -> LedgerError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let lower = message.to_lowercase();

    if lower.contains("nonce too low") {
        return LedgerError::NonceTooLow(message);
    }

    let data = error.get("data").and_then(|d| match d {
        Value::String(s) => Some(s.as_str()),
        Value::Object(o) => o.get("data").and_then(Value::as_str),
        _ => None,
    });
    if let Some(raw) = data.and_then(|s| parse_bytes(s).ok()) {
        if !raw.is_empty() {
            return LedgerError::Reverted(RevertReason::decode(raw));
        }
    }
    if lower.contains("revert") {
        return LedgerError::Reverted(RevertReason::from_message(message));
    }
    LedgerError::Rpc { code, message }
}

fn strip_hex(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn parse_u64(value: &Value, field: &str) -> LedgerResult<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("{field} is not a string")))?;
    let digits = strip_hex(s);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| LedgerError::Decode(format!("{field}: {e}")))
}

fn parse_u256(value: &Value, field: &str) -> LedgerResult<U256> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("{field} is not a string")))?;
    let digits = strip_hex(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| LedgerError::Decode(format!("{field}: {e}")))
}

fn parse_bytes(s: &str) -> LedgerResult<Bytes> {
    hex::decode(strip_hex(s))
        .map(Bytes::from)
        .map_err(|e| LedgerError::Decode(format!("invalid hex data: {e}")))
}

fn parse_b256(value: &Value, field: &str) -> LedgerResult<B256> {
    value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("{field} is not a string")))?
        .parse()
        .map_err(|e| LedgerError::Decode(format!("{field}: {e}")))
}

fn parse_address(value: &Value, field: &str) -> LedgerResult<Address> {
    value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("{field} is not a string")))?
        .parse()
        .map_err(|e| LedgerError::Decode(format!("{field}: {e}")))
}

fn quantity(value: U256) -> String {
    format!("0x{value:x}")
}

fn b256_hex(hash: B256) -> String {
    format!("0x{}", hex::encode(hash))
}

fn data_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn call_object(call: &CallRequest) -> Value {
    let mut obj = Map::new();
    if let Some(from) = call.from {
        obj.insert("from".into(), json!(from.to_string()));
    }
    obj.insert("to".into(), json!(call.to.to_string()));
    obj.insert("data".into(), json!(data_hex(&call.data)));
    if !call.value.is_zero() {
        obj.insert("value".into(), json!(quantity(call.value)));
    }
    Value::Object(obj)
}

fn transaction_object(tx: &TransactionRequest) -> Value {
    let mut obj = Map::new();
    obj.insert("from".into(), json!(tx.from.to_string()));
    obj.insert("to".into(), json!(tx.to.to_string()));
    obj.insert("data".into(), json!(data_hex(&tx.data)));
    obj.insert("value".into(), json!(quantity(tx.value)));
    if let Some(nonce) = tx.nonce {
        obj.insert("nonce".into(), json!(format!("0x{nonce:x}")));
    }
    if let Some(price) = tx.gas_price {
        obj.insert("gasPrice".into(), json!(quantity(price)));
    }
    if let Some(gas) = tx.gas {
        obj.insert("gas".into(), json!(format!("0x{gas:x}")));
    }
    Value::Object(obj)
}

fn parse_receipt(value: &Value) -> LedgerResult<TxReceipt> {
    let logs = value
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| logs.iter().map(parse_log).collect::<LedgerResult<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    // Pre-London nodes omit effectiveGasPrice.
    let effective_gas_price = match value.get("effectiveGasPrice") {
        Some(v) if !v.is_null() => parse_u256(v, "effectiveGasPrice")?,
        _ => U256::ZERO,
    };
    Ok(TxReceipt {
        transaction_hash: parse_b256(&value["transactionHash"], "transactionHash")?,
        block_number: parse_u64(&value["blockNumber"], "blockNumber")?,
        status: parse_u64(&value["status"], "status")? == 1,
        gas_used: parse_u64(&value["gasUsed"], "gasUsed")?,
        effective_gas_price,
        logs,
    })
}

fn parse_log(value: &Value) -> LedgerResult<LogEntry> {
    let topics = value["topics"]
        .as_array()
        .ok_or_else(|| LedgerError::Decode("log topics missing".to_string()))?
        .iter()
        .map(|t| parse_b256(t, "topic"))
        .collect::<LedgerResult<Vec<_>>>()?;
    let data = value["data"]
        .as_str()
        .ok_or_else(|| LedgerError::Decode("log data missing".to_string()))?;
    Ok(LogEntry {
        address: parse_address(&value["address"], "address")?,
        topics,
        data: parse_bytes(data)?,
    })
}

impl LedgerClient for RpcLedger {
    fn chain_id(&self) -> BoxFuture<'_, LedgerResult<u64>> {
        Box::pin(async move {
            let result = self.request("eth_chainId", json!([])).await?;
            parse_u64(&result, "chainId")
        })
    }

    fn block_timestamp(&self) -> BoxFuture<'_, LedgerResult<u64>> {
        Box::pin(async move {
            let block = self
                .request("eth_getBlockByNumber", json!(["latest", false]))
                .await?;
            parse_u64(&block["timestamp"], "timestamp")
        })
    }

    fn gas_price(&self) -> BoxFuture<'_, LedgerResult<U256>> {
        Box::pin(async move {
            let result = self.request("eth_gasPrice", json!([])).await?;
            parse_u256(&result, "gasPrice")
        })
    }

    fn transaction_count(&self, account: Address) -> BoxFuture<'_, LedgerResult<u64>> {
        Box::pin(async move {
            let result = self
                .request(
                    "eth_getTransactionCount",
                    json!([account.to_string(), "pending"]),
                )
                .await?;
            parse_u64(&result, "transactionCount")
        })
    }

    fn native_balance(&self, account: Address) -> BoxFuture<'_, LedgerResult<U256>> {
        Box::pin(async move {
            let result = self
                .request("eth_getBalance", json!([account.to_string(), "latest"]))
                .await?;
            parse_u256(&result, "balance")
        })
    }

    fn call(&self, call: CallRequest) -> BoxFuture<'_, LedgerResult<Bytes>> {
        Box::pin(async move {
            let result = self
                .request("eth_call", json!([call_object(&call), "latest"]))
                .await?;
            let s = result
                .as_str()
                .ok_or_else(|| LedgerError::Decode("eth_call result is not a string".into()))?;
            parse_bytes(s)
        })
    }

    fn send_transaction(&self, tx: TransactionRequest) -> BoxFuture<'_, LedgerResult<B256>> {
        Box::pin(async move {
            let result = self
                .request("eth_sendTransaction", json!([transaction_object(&tx)]))
                .await?;
            parse_b256(&result, "transactionHash")
        })
    }

    fn transaction_receipt(&self, hash: B256) -> BoxFuture<'_, LedgerResult<Option<TxReceipt>>> {
        Box::pin(async move {
            let result = self
                .request("eth_getTransactionReceipt", json!([b256_hex(hash)]))
                .await?;
            if result.is_null() {
                return Ok(None);
            }
            parse_receipt(&result).map(Some)
        })
    }

    fn revert_reason(&self, hash: B256) -> BoxFuture<'_, LedgerResult<Option<RevertReason>>> {
        Box::pin(async move {
            let tx = self
                .request("eth_getTransactionByHash", json!([b256_hex(hash)]))
                .await?;
            if tx.is_null() {
                return Ok(None);
            }
            let input = tx
                .get("input")
                .and_then(Value::as_str)
                .ok_or_else(|| LedgerError::Decode("transaction input missing".into()))?;
            let call = CallRequest {
                from: Some(parse_address(&tx["from"], "from")?),
                to: parse_address(&tx["to"], "to")?,
                data: parse_bytes(input)?,
                value: parse_u256(&tx["value"], "value")?,
            };
            // Replay against the block the transaction was mined in.
            let block = tx.get("blockNumber").cloned().unwrap_or(json!("latest"));
            match self.request("eth_call", json!([call_object(&call), block])).await {
                Err(LedgerError::Reverted(reason)) => Ok(Some(reason)),
                Err(e) => Err(e),
                Ok(_) => {
                    warn!(%hash, "Replay of failed transaction succeeded, reason unavailable");
                    Ok(None)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::ISeaport;
    use alloy::sol_types::SolError;

    #[test]
    fn test_map_nonce_too_low() {
        let err = map_rpc_error(&json!({"code": -32000, "message": "nonce too low"}));
        assert!(matches!(err, LedgerError::NonceTooLow(_)));
    }

    #[test]
    fn test_map_revert_with_data() {
        let raw = ISeaport::InsufficientNativeTokensSupplied {}.abi_encode();
        let err = map_rpc_error(&json!({
            "code": 3,
            "message": "execution reverted",
            "data": data_hex(&raw),
        }));
        let reason = err.revert_reason().unwrap();
        assert!(reason.is("InsufficientNativeTokensSupplied"));
    }

    #[test]
    fn test_map_revert_without_data() {
        let err = map_rpc_error(&json!({"code": -32000, "message": "execution reverted"}));
        assert_eq!(err.revert_reason().unwrap().message, "execution reverted");
    }

    #[test]
    fn test_map_other_error() {
        let err = map_rpc_error(&json!({"code": -32601, "message": "method not found"}));
        assert!(matches!(err, LedgerError::Rpc { code: -32601, .. }));
    }

    #[test]
    fn test_parse_receipt() {
        let receipt = parse_receipt(&json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "blockNumber": "0x10",
            "status": "0x1",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "logs": [{
                "address": format!("0x{}", "22".repeat(20)),
                "topics": [format!("0x{}", "33".repeat(32))],
                "data": "0x01",
            }],
        }))
        .unwrap();
        assert_eq!(receipt.block_number, 16);
        assert!(receipt.status);
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.effective_gas_price, U256::from(1_000_000_000u64));
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].data.as_ref(), &[0x01]);
    }

    #[test]
    fn test_transaction_object_fields() {
        let tx = TransactionRequest {
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            data: Bytes::from(vec![0xab]),
            value: U256::from(255u16),
            nonce: Some(7),
            gas_price: Some(U256::from(16u8)),
            gas: None,
        };
        let obj = transaction_object(&tx);
        assert_eq!(obj["value"], "0xff");
        assert_eq!(obj["nonce"], "0x7");
        assert_eq!(obj["gasPrice"], "0x10");
        assert_eq!(obj["data"], "0xab");
        assert!(obj.get("gas").is_none());
    }

    #[test]
    fn test_new_client() {
        let ledger = RpcLedger::new("http://127.0.0.1:8545").unwrap();
        assert_eq!(ledger.url(), "http://127.0.0.1:8545");
    }
}
