use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::XrplConfig;
use crate::error::LedgerError;
use crate::xrpl::codec::PaymentTx;
use crate::xrpl::keys::{address_from_seed, Keypair};
use crate::xrpl::models::{
    AccountInfo, LedgerTransaction, PaymentDraft, SubmittedPayment, TES_SUCCESS,
};

/// Ledgers a submitted transaction stays eligible for
const LAST_LEDGER_OFFSET: u32 = 20;
const MIN_FEE_DROPS: u64 = 12;
const CONFIRMATION_POLL: Duration = Duration::from_secs(1);
const FAUCET_XRP_AMOUNT: &str = "1000";

/// Result of a faucet request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundedAccount {
    pub address: String,
    pub amount: Option<Value>,
    pub tx_hash: Option<String>,
}

/// Everything the engine and API need from the XRP Ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Classic address for a seed. Local and deterministic.
    fn derive_address(&self, seed: &str) -> Result<String, LedgerError> {
        address_from_seed(seed)
    }

    /// Sign locally, submit and wait for a validated result
    async fn submit_payment(
        &self,
        seed: &str,
        payment: PaymentDraft,
    ) -> Result<SubmittedPayment, LedgerError>;

    /// `None` when the account does not exist in the validated ledger
    async fn account_info(&self, address: &str) -> Result<Option<AccountInfo>, LedgerError>;

    async fn transaction(&self, hash: &str) -> Result<Value, LedgerError>;

    async fn fund_account(&self, address: &str) -> Result<FundedAccount, LedgerError>;

    async fn validated_ledger_index(&self) -> Result<u32, LedgerError>;

    async fn ledger_transactions(&self, ledger_index: u32)
        -> Result<Vec<LedgerTransaction>, LedgerError>;
}

#[derive(Debug)]
enum RpcFailure {
    Transport(String),
    Ledger { code: String, message: String },
}

impl From<RpcFailure> for LedgerError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Transport(message) => LedgerError::Rpc(message),
            RpcFailure::Ledger { code, message } => {
                LedgerError::Rpc(format!("{}: {}", code, message))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Value,
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    engine_result: String,
    #[serde(default)]
    engine_result_message: String,
}

#[derive(Debug, Deserialize)]
struct FaucetResponse {
    #[serde(default)]
    account: Option<FaucetAccount>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default, alias = "txHash")]
    #[serde(rename = "transactionHash")]
    transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FaucetAccount {
    #[serde(default, rename = "classicAddress")]
    classic_address: Option<String>,
}

/// JSON-RPC client for rippled
pub struct XrplClient {
    http: Client,
    rpc_url: String,
    faucet_url: String,
    submission_timeout: Duration,
}

impl XrplClient {
    pub fn new(config: &XrplConfig) -> Self {
        Self {
            http: Client::new(),
            rpc_url: config.rpc_url.clone(),
            faucet_url: config.faucet_url.trim_end_matches('/').to_string(),
            submission_timeout: Duration::from_secs(config.submission_timeout_secs),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let body = json!({ "method": method, "params": [params] });
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(RpcFailure::Transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(format!("{} response unreadable: {}", method, e)))?;

        if envelope.result.get("status").and_then(Value::as_str) == Some("error") {
            let code = envelope
                .result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let message = envelope
                .result
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or(&code)
                .to_string();
            return Err(RpcFailure::Ledger { code, message });
        }

        Ok(envelope.result)
    }

    async fn current_ledger_index(&self) -> Result<u32, LedgerError> {
        let result = self.rpc("ledger_current", json!({})).await?;
        read_u32(&result, "ledger_current_index")
    }

    async fn open_ledger_fee(&self) -> Result<u64, LedgerError> {
        let result = self.rpc("fee", json!({})).await?;
        let drops = &result["drops"];
        let fee = ["open_ledger_fee", "base_fee"]
            .iter()
            .filter_map(|key| drops.get(*key).and_then(Value::as_str))
            .filter_map(|raw| raw.parse::<u64>().ok())
            .max()
            .unwrap_or(MIN_FEE_DROPS);
        Ok(fee.max(MIN_FEE_DROPS))
    }

    async fn sign_and_submit(
        &self,
        keypair: &Keypair,
        payment: PaymentDraft,
    ) -> Result<SubmittedPayment, LedgerError> {
        let account = keypair.classic_address();
        let info = self
            .account_info(&account)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account.clone()))?;

        let mut tx = PaymentTx::new(
            &account,
            &payment.destination,
            payment.amount_drops,
            payment.memos,
        )?;
        tx.sequence = info.sequence;
        tx.fee_drops = self.open_ledger_fee().await?;
        tx.last_ledger_sequence = self.current_ledger_index().await? + LAST_LEDGER_OFFSET;
        let last_ledger = tx.last_ledger_sequence;

        let signed = tx.sign(keypair)?;
        debug!("Submitting {} from {} (last ledger {})", signed.hash, account, last_ledger);

        let result = self
            .rpc("submit", json!({ "tx_blob": signed.tx_blob }))
            .await
            .map_err(|failure| match failure {
                RpcFailure::Ledger { code, message } => {
                    LedgerError::SubmissionFailed { code, message }
                }
                other => other.into(),
            })?;
        let submit: SubmitResult = serde_json::from_value(result)
            .map_err(|e| LedgerError::Rpc(format!("unexpected submit response: {}", e)))?;

        if !is_provisionally_accepted(&submit.engine_result) {
            warn!(
                "⚠️ Submission of {} rejected: {} {}",
                signed.hash, submit.engine_result, submit.engine_result_message
            );
            return Err(LedgerError::SubmissionFailed {
                code: submit.engine_result,
                message: submit.engine_result_message,
            });
        }

        self.wait_for_validation(&signed.hash, &account, last_ledger)
            .await
    }

    async fn wait_for_validation(
        &self,
        hash: &str,
        account: &str,
        last_ledger: u32,
    ) -> Result<SubmittedPayment, LedgerError> {
        loop {
            match self.rpc("tx", json!({ "transaction": hash })).await {
                Ok(result) => {
                    let tx: LedgerTransaction = serde_json::from_value(result)
                        .map_err(|e| LedgerError::Rpc(format!("unexpected tx response: {}", e)))?;
                    if tx.validated {
                        let result_code = tx.result_code().unwrap_or("unknown").to_string();
                        info!("✅ {} validated in ledger {:?}: {}", hash, tx.ledger_index, result_code);
                        return Ok(SubmittedPayment {
                            hash: hash.to_string(),
                            account: account.to_string(),
                            result_code,
                            delivered_amount: tx.meta.and_then(|meta| meta.delivered_amount),
                            ledger_index: tx.ledger_index,
                        });
                    }
                }
                Err(RpcFailure::Ledger { code, .. }) if code == "txnNotFound" => {
                    if self.validated_ledger_index().await? > last_ledger {
                        return Err(LedgerError::SubmissionFailed {
                            code: "tefMAX_LEDGER".to_string(),
                            message: format!("{} expired without being validated", hash),
                        });
                    }
                }
                Err(failure) => return Err(failure.into()),
            }

            tokio::time::sleep(CONFIRMATION_POLL).await;
        }
    }
}

#[async_trait]
impl LedgerClient for XrplClient {
    async fn submit_payment(
        &self,
        seed: &str,
        payment: PaymentDraft,
    ) -> Result<SubmittedPayment, LedgerError> {
        let keypair = Keypair::from_seed_str(seed)?;
        let timeout = self.submission_timeout;

        tokio::time::timeout(timeout, self.sign_and_submit(&keypair, payment))
            .await
            .map_err(|_| LedgerError::Timeout(timeout.as_secs()))?
    }

    async fn account_info(&self, address: &str) -> Result<Option<AccountInfo>, LedgerError> {
        let params = json!({ "account": address, "ledger_index": "validated" });
        match self.rpc("account_info", params).await {
            Ok(result) => {
                let info = serde_json::from_value(result["account_data"].clone())
                    .map_err(|e| LedgerError::Rpc(format!("unexpected account_info response: {}", e)))?;
                Ok(Some(info))
            }
            Err(RpcFailure::Ledger { code, .. }) if code == "actNotFound" => Ok(None),
            Err(RpcFailure::Ledger { code, message }) if code == "actMalformed" => {
                Err(LedgerError::InvalidAddress(format!("{}: {}", address, message)))
            }
            Err(failure) => Err(failure.into()),
        }
    }

    async fn transaction(&self, hash: &str) -> Result<Value, LedgerError> {
        match self.rpc("tx", json!({ "transaction": hash })).await {
            Ok(result) => Ok(result),
            Err(RpcFailure::Ledger { code, .. }) if code == "txnNotFound" => {
                Err(LedgerError::TransactionNotFound(hash.to_string()))
            }
            Err(failure) => Err(failure.into()),
        }
    }

    async fn fund_account(&self, address: &str) -> Result<FundedAccount, LedgerError> {
        let url = format!("{}/accounts", self.faucet_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "destination": address, "xrpAmount": FAUCET_XRP_AMOUNT }))
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(format!("faucet request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(LedgerError::Rpc(format!(
                "faucet request failed: HTTP {}",
                response.status()
            )));
        }

        let body: FaucetResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Rpc(format!("faucet response unreadable: {}", e)))?;

        Ok(FundedAccount {
            address: body
                .account
                .and_then(|account| account.classic_address)
                .unwrap_or_else(|| address.to_string()),
            amount: body.amount,
            tx_hash: body.transaction_hash,
        })
    }

    async fn validated_ledger_index(&self) -> Result<u32, LedgerError> {
        let result = self.rpc("ledger", json!({ "ledger_index": "validated" })).await?;
        read_u32(&result, "ledger_index")
    }

    async fn ledger_transactions(
        &self,
        ledger_index: u32,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let params = json!({
            "ledger_index": ledger_index,
            "transactions": true,
            "expand": true,
        });
        let result = self.rpc("ledger", params).await?;
        let raw = result["ledger"]["transactions"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut transactions = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_value::<LedgerTransaction>(entry) {
                Ok(mut tx) => {
                    tx.ledger_index = Some(ledger_index);
                    tx.validated = true;
                    transactions.push(tx);
                }
                // Pseudo-transactions and unusual shapes are not payments
                Err(e) => debug!("Skipping undecodable transaction in {}: {}", ledger_index, e),
            }
        }
        Ok(transactions)
    }
}

/// Results that may still make it into a validated ledger
fn is_provisionally_accepted(engine_result: &str) -> bool {
    engine_result == TES_SUCCESS || engine_result.starts_with("ter") || engine_result.starts_with("tec")
}

fn read_u32(result: &Value, key: &str) -> Result<u32, LedgerError> {
    let value = &result[key];
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
        .and_then(|index| u32::try_from(index).ok())
        .ok_or_else(|| LedgerError::Rpc(format!("response missing {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrpl::models::Memo;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENESIS_SEED: &str = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb";
    const GENESIS_ADDRESS: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const DESTINATION: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";

    fn client_for(server: &MockServer) -> XrplClient {
        XrplClient::new(&XrplConfig {
            rpc_url: server.uri(),
            faucet_url: server.uri(),
            submission_timeout_secs: 5,
            ..XrplConfig::default()
        })
    }

    async fn mock_rpc(server: &MockServer, rpc_method: &str, result: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": result })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_account_info_missing_account_is_none() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "account_info",
            json!({ "status": "error", "error": "actNotFound", "error_message": "Account not found." }),
        )
        .await;

        let client = client_for(&server);
        assert_eq!(client.account_info(DESTINATION).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_account_info_reads_balance() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "account_info",
            json!({
                "status": "success",
                "account_data": { "Account": DESTINATION, "Balance": "25000000", "Sequence": 3 }
            }),
        )
        .await;

        let info = client_for(&server).account_info(DESTINATION).await.unwrap().unwrap();
        assert_eq!(info.balance_drops(), 25_000_000);
        assert_eq!(info.sequence, 3);
    }

    #[tokio::test]
    async fn test_submit_payment_waits_for_validation() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "account_info",
            json!({
                "status": "success",
                "account_data": { "Account": GENESIS_ADDRESS, "Balance": "100000000", "Sequence": 9 }
            }),
        )
        .await;
        mock_rpc(&server, "fee", json!({ "status": "success", "drops": { "base_fee": "10", "open_ledger_fee": "10" } })).await;
        mock_rpc(&server, "ledger_current", json!({ "status": "success", "ledger_current_index": 500 })).await;
        mock_rpc(
            &server,
            "submit",
            json!({ "status": "success", "engine_result": "tesSUCCESS", "engine_result_message": "ok" }),
        )
        .await;
        mock_rpc(
            &server,
            "tx",
            json!({
                "status": "success",
                "TransactionType": "Payment",
                "Account": GENESIS_ADDRESS,
                "validated": true,
                "ledger_index": 503,
                "meta": { "TransactionResult": "tesSUCCESS", "delivered_amount": "20000000" }
            }),
        )
        .await;

        let draft = PaymentDraft {
            destination: DESTINATION.to_string(),
            amount_drops: 20_000_000,
            memos: vec![Memo::json("venmo_payment", &json!({ "requestId": "req_1" })).unwrap()],
        };
        let submitted = client_for(&server)
            .submit_payment(GENESIS_SEED, draft)
            .await
            .unwrap();

        assert!(submitted.succeeded());
        assert_eq!(submitted.account, GENESIS_ADDRESS);
        assert_eq!(submitted.hash.len(), 64);
        assert_eq!(submitted.ledger_index, Some(503));
        assert_eq!(submitted.delivered_xrp(), Some(rust_decimal_macros::dec!(20)));
    }

    #[tokio::test]
    async fn test_submit_rejection_is_submission_failure() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "account_info",
            json!({
                "status": "success",
                "account_data": { "Account": GENESIS_ADDRESS, "Balance": "100000000", "Sequence": 9 }
            }),
        )
        .await;
        mock_rpc(&server, "fee", json!({ "status": "success", "drops": { "open_ledger_fee": "12" } })).await;
        mock_rpc(&server, "ledger_current", json!({ "status": "success", "ledger_current_index": 500 })).await;
        mock_rpc(
            &server,
            "submit",
            json!({
                "status": "success",
                "engine_result": "temBAD_FEE",
                "engine_result_message": "Invalid fee"
            }),
        )
        .await;

        let draft = PaymentDraft {
            destination: DESTINATION.to_string(),
            amount_drops: 1_000_000,
            memos: Vec::new(),
        };
        let err = client_for(&server)
            .submit_payment(GENESIS_SEED, draft)
            .await
            .unwrap_err();

        match err {
            LedgerError::SubmissionFailed { code, .. } => assert_eq!(code, "temBAD_FEE"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ledger_transactions_accepts_metadata_alias() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "ledger",
            json!({
                "status": "success",
                "ledger": {
                    "transactions": [{
                        "hash": "AB",
                        "TransactionType": "Payment",
                        "Account": GENESIS_ADDRESS,
                        "Destination": DESTINATION,
                        "Amount": "1000",
                        "metaData": { "TransactionResult": "tesSUCCESS" }
                    }]
                }
            }),
        )
        .await;

        let txs = client_for(&server).ledger_transactions(77).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].ledger_index, Some(77));
        assert_eq!(txs[0].result_code(), Some(TES_SUCCESS));
    }

    #[tokio::test]
    async fn test_fund_account_reads_faucet_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "account": { "classicAddress": DESTINATION },
                "amount": 1000,
                "transactionHash": "FAUCETHASH"
            })))
            .mount(&server)
            .await;

        let funded = client_for(&server).fund_account(DESTINATION).await.unwrap();
        assert_eq!(funded.address, DESTINATION);
        assert_eq!(funded.tx_hash.as_deref(), Some("FAUCETHASH"));
    }
}
