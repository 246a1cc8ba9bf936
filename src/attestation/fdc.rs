use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::attestation::{AttestationProvider, AttestationResult};
use crate::config::FlareConfig;
use crate::error::{AttestationError, FlareError};
use crate::flare::abi::{bytes32_hex, decode_address, decode_hex, encode_dynamic_call};
use crate::flare::signer::parse_address;
use crate::flare::{EvmSigner, FlareRpc, LegacyTransaction};

/// Flare contract registry, same address on every Flare network
pub const CONTRACT_REGISTRY: &str = "0xaD67FE66660Fb8dFE9d6b1b4240d8650e30F6019";
const FDC_HUB_NAME: &str = "FdcHub";

const FIRST_VOTING_ROUND_START_TS: u64 = 1_658_429_955;
const VOTING_EPOCH_DURATION_SECS: u64 = 90;

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
/// Headroom over the node's gas estimate
const GAS_MARGIN_PERCENT: u64 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrepareRequest<'a> {
    attestation_type: String,
    source_id: String,
    request_body: PaymentRequestBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequestBody<'a> {
    transaction_id: String,
    in_utxo: &'a str,
    utxo: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrepareResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    abi_encoded_request: Option<String>,
}

/// Voting round a request submitted at `block_timestamp` falls into
pub fn voting_round_id(block_timestamp: u64) -> u64 {
    block_timestamp.saturating_sub(FIRST_VOTING_ROUND_START_TS) / VOTING_EPOCH_DURATION_SECS
}

/// Submits XRPL `Payment` attestation requests to the FdcHub
pub struct FdcAttestor {
    http: Client,
    rpc: FlareRpc,
    signer: EvmSigner,
    verifier_url: String,
    api_key: Option<String>,
    source_id: String,
    fee_wei: u128,
    configured_hub: Option<String>,
    resolved_hub: OnceCell<String>,
    receipt_timeout: Duration,
}

impl FdcAttestor {
    pub fn new(config: &FlareConfig, signer: EvmSigner) -> Self {
        Self {
            http: Client::new(),
            rpc: FlareRpc::new(config.rpc_url.clone()),
            signer,
            verifier_url: config.verifier_url.trim_end_matches('/').to_string(),
            api_key: config.verifier_api_key.clone(),
            source_id: config.source_id.clone(),
            fee_wei: config.fee_wei,
            configured_hub: config.hub_address.clone(),
            resolved_hub: OnceCell::new(),
            receipt_timeout: RECEIPT_TIMEOUT,
        }
    }

    /// Ask the verifier to encode the attestation request for `xrpl_tx_hash`
    async fn prepare_request(&self, xrpl_tx_hash: &str) -> Result<String, AttestationError> {
        let url = format!("{}/verifier/xrp/Payment/prepareRequest", self.verifier_url);
        let payload = PrepareRequest {
            attestation_type: bytes32_hex("Payment"),
            source_id: bytes32_hex(&self.source_id),
            request_body: PaymentRequestBody {
                transaction_id: format!("0x{}", xrpl_tx_hash.trim_start_matches("0x")),
                in_utxo: "0",
                utxo: "0",
            },
        };

        let mut request = self.http.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttestationError::Failed(format!("verifier unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(AttestationError::VerifierRejected(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: PrepareResponse = response
            .json()
            .await
            .map_err(|e| AttestationError::Failed(format!("verifier response unreadable: {}", e)))?;

        if let Some(status) = body.status.as_deref() {
            if status != "VALID" {
                return Err(AttestationError::VerifierRejected(status.to_string()));
            }
        }
        body.abi_encoded_request
            .ok_or_else(|| AttestationError::VerifierRejected("missing abiEncodedRequest".to_string()))
    }

    async fn hub_address(&self) -> Result<String, FlareError> {
        if let Some(address) = &self.configured_hub {
            return Ok(address.clone());
        }

        self.resolved_hub
            .get_or_try_init(|| async {
                let call = encode_dynamic_call(
                    "getContractAddressByName(string)",
                    FDC_HUB_NAME.as_bytes(),
                );
                let output = self.rpc.eth_call(CONTRACT_REGISTRY, &call).await?;
                let address = decode_address(&output, 0)?;
                info!("🔎 Resolved FdcHub at {}", address);
                Ok::<_, FlareError>(address)
            })
            .await
            .cloned()
    }

    async fn request_attestation(
        &self,
        abi_encoded_request: &str,
    ) -> Result<(String, u64), FlareError> {
        let hub = self.hub_address().await?;
        let request_bytes = decode_hex(abi_encoded_request)?;
        let call = encode_dynamic_call("requestAttestation(bytes)", &request_bytes);
        let from = self.signer.address_hex();

        let chain_id = self.rpc.chain_id().await?;
        let nonce = self.rpc.pending_nonce(&from).await?;
        let gas_price = self.rpc.gas_price().await?;
        let gas_estimate = self
            .rpc
            .estimate_gas(&from, &hub, self.fee_wei, &call)
            .await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: gas_estimate + gas_estimate * GAS_MARGIN_PERCENT / 100,
            to: parse_address(&hub)?,
            value: self.fee_wei,
            data: call,
        };
        let raw = self.signer.sign_legacy(&tx, chain_id)?;
        let tx_hash = self.rpc.send_raw_transaction(&raw).await?;
        debug!("requestAttestation sent as {} (nonce {})", tx_hash, nonce);

        let receipt = self.rpc.wait_for_receipt(&tx_hash, self.receipt_timeout).await?;
        if !receipt.succeeded {
            return Err(FlareError::Reverted(tx_hash));
        }
        Ok((tx_hash, receipt.block_number))
    }
}

#[async_trait]
impl AttestationProvider for FdcAttestor {
    #[instrument(skip(self))]
    async fn submit_attestation(
        &self,
        xrpl_tx_hash: &str,
    ) -> Result<AttestationResult, AttestationError> {
        let abi_encoded_request = self.prepare_request(xrpl_tx_hash).await?;
        let (tx_hash, block_number) = self.request_attestation(&abi_encoded_request).await?;
        let block_timestamp = self.rpc.block_timestamp(block_number).await?;

        Ok(AttestationResult {
            tx_hash,
            block_number,
            round_id: voting_round_id(block_timestamp),
            abi_encoded_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "4646464646464646464646464646464646464646464646464646464646464646";
    const XRPL_HASH: &str = "C53ECF838647FA5A4C780377025FEC7999AB4182590510CA461444B207AB74A9";

    fn attestor(verifier: &MockServer, flare: &MockServer, hub: Option<&str>) -> FdcAttestor {
        let config = FlareConfig {
            rpc_url: flare.uri(),
            verifier_url: verifier.uri(),
            verifier_api_key: Some("secret".to_string()),
            hub_address: hub.map(str::to_string),
            ..FlareConfig::default()
        };
        FdcAttestor::new(&config, EvmSigner::from_hex(KEY).unwrap())
    }

    async fn mock_eth(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result })),
            )
            .mount(server)
            .await;
    }

    async fn mock_verifier(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/verifier/xrp/Payment/prepareRequest"))
            .and(header("X-API-KEY", "secret"))
            .and(body_partial_json(json!({
                "sourceId": bytes32_hex("testXRP"),
                "requestBody": { "transactionId": format!("0x{}", XRPL_HASH) }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_voting_round_id() {
        assert_eq!(voting_round_id(FIRST_VOTING_ROUND_START_TS), 0);
        assert_eq!(voting_round_id(FIRST_VOTING_ROUND_START_TS + 90 * 1000 + 45), 1000);
        assert_eq!(voting_round_id(0), 0);
    }

    #[tokio::test]
    async fn test_full_submission_flow() {
        let verifier = MockServer::start().await;
        let flare = MockServer::start().await;
        mock_verifier(&verifier, json!({ "status": "VALID", "abiEncodedRequest": "0x1234" })).await;
        mock_eth(&flare, "eth_chainId", json!("0x72")).await;
        mock_eth(&flare, "eth_getTransactionCount", json!("0x3")).await;
        mock_eth(&flare, "eth_gasPrice", json!("0x5d21dba00")).await;
        mock_eth(&flare, "eth_estimateGas", json!("0x186a0")).await;
        mock_eth(&flare, "eth_sendRawTransaction", json!("0xfeed")).await;
        mock_eth(&flare, "eth_getTransactionReceipt", json!({ "blockNumber": "0x20", "status": "0x1" })).await;
        let timestamp = FIRST_VOTING_ROUND_START_TS + 90 * 500;
        mock_eth(
            &flare,
            "eth_getBlockByNumber",
            json!({ "timestamp": format!("0x{:x}", timestamp) }),
        )
        .await;

        let result = attestor(&verifier, &flare, Some("0x0000000000000000000000000000000000000abc"))
            .submit_attestation(XRPL_HASH)
            .await
            .unwrap();

        assert_eq!(result.tx_hash, "0xfeed");
        assert_eq!(result.block_number, 32);
        assert_eq!(result.round_id, 500);
        assert_eq!(result.abi_encoded_request, "0x1234");
    }

    #[tokio::test]
    async fn test_hub_resolved_from_registry() {
        let verifier = MockServer::start().await;
        let flare = MockServer::start().await;
        let word = format!("0x{}{}", "0".repeat(24), "ab".repeat(20));
        mock_eth(&flare, "eth_call", json!(word)).await;

        let attestor = attestor(&verifier, &flare, None);
        let hub = attestor.hub_address().await.unwrap();
        assert_eq!(hub, format!("0x{}", "ab".repeat(20)));
        // Cached after the first lookup
        assert_eq!(attestor.hub_address().await.unwrap(), hub);
    }

    #[tokio::test]
    async fn test_verifier_rejection() {
        let verifier = MockServer::start().await;
        let flare = MockServer::start().await;
        mock_verifier(&verifier, json!({ "status": "INVALID" })).await;

        let err = attestor(&verifier, &flare, None)
            .submit_attestation(XRPL_HASH)
            .await
            .unwrap_err();
        assert!(matches!(err, AttestationError::VerifierRejected(status) if status == "INVALID"));
    }
}
