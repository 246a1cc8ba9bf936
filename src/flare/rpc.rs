use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::FlareError;
use crate::flare::abi::decode_hex;

const RECEIPT_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Mined transaction receipt fields we read
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub succeeded: bool,
}

/// Ethereum-style JSON-RPC client for the Flare C-chain
#[derive(Clone)]
pub struct FlareRpc {
    http: Client,
    url: String,
}

impl FlareRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, FlareError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlareError::Rpc(format!("{} request failed: {}", method, e)))?;

        let decoded: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| FlareError::Rpc(format!("{} response unreadable: {}", method, e)))?;

        if let Some(error) = decoded.error {
            return Err(FlareError::Rpc(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            )));
        }
        Ok(decoded.result.unwrap_or(Value::Null))
    }

    /// Read-only contract call against the latest block
    pub async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, FlareError> {
        let params = json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]);
        let result = self.request("eth_call", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| FlareError::Rpc("eth_call returned no data".to_string()))?;
        decode_hex(raw)
    }

    pub async fn chain_id(&self) -> Result<u64, FlareError> {
        self.quantity("eth_chainId", json!([])).await
    }

    pub async fn pending_nonce(&self, address: &str) -> Result<u64, FlareError> {
        self.quantity("eth_getTransactionCount", json!([address, "pending"]))
            .await
    }

    pub async fn gas_price(&self) -> Result<u128, FlareError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    pub async fn estimate_gas(
        &self,
        from: &str,
        to: &str,
        value: u128,
        data: &[u8],
    ) -> Result<u64, FlareError> {
        let call = json!({
            "from": from,
            "to": to,
            "value": format!("0x{:x}", value),
            "data": format!("0x{}", hex::encode(data)),
        });
        self.quantity("eth_estimateGas", json!([call])).await
    }

    /// Broadcast a signed raw transaction, returning its hash
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, FlareError> {
        let result = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FlareError::Rpc("eth_sendRawTransaction returned no hash".to_string()))
    }

    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, FlareError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let block_number = u64::try_from(parse_quantity(&result["blockNumber"])?)
            .map_err(|_| FlareError::Rpc("block number out of range".to_string()))?;
        let succeeded = parse_quantity(&result["status"]).map(|status| status == 1)?;
        Ok(Some(Receipt {
            tx_hash: tx_hash.to_string(),
            block_number,
            succeeded,
        }))
    }

    /// Poll until the transaction is mined or `timeout` elapses
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Receipt, FlareError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                    return Ok::<_, FlareError>(receipt);
                }
                debug!("Receipt for {} not available yet", tx_hash);
                tokio::time::sleep(RECEIPT_POLL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| FlareError::ReceiptTimeout(tx_hash.to_string()))?
    }

    pub async fn block_timestamp(&self, block_number: u64) -> Result<u64, FlareError> {
        let block = self
            .request(
                "eth_getBlockByNumber",
                json!([format!("0x{:x}", block_number), false]),
            )
            .await?;
        let timestamp = parse_quantity(&block["timestamp"])?;
        u64::try_from(timestamp).map_err(|_| FlareError::Rpc("timestamp out of range".to_string()))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u64, FlareError> {
        let result = self.request(method, params).await?;
        let value = parse_quantity(&result)?;
        u64::try_from(value).map_err(|_| FlareError::Rpc(format!("{} result out of range", method)))
    }
}

/// Hex quantity (`0x1a`) as returned by Ethereum JSON-RPC
pub fn parse_quantity(value: &Value) -> Result<u128, FlareError> {
    let raw = value
        .as_str()
        .ok_or_else(|| FlareError::Rpc(format!("expected hex quantity, got {}", value)))?;
    let digits = raw.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| FlareError::Rpc(format!("invalid quantity '{}': {}", raw, e)))
}
