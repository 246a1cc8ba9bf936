use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::attestation::{AttestationRecord, AttestationStatus};
use crate::error::{AppError, AppResult};
use crate::quote_engine::engine::PriceQuote;
use crate::requests::PaymentRequest;

// ========== REQUEST MODELS ==========

/// Amount as sent by clients: either a JSON number or a decimal string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    pub fn to_decimal(&self) -> AppResult<Decimal> {
        let raw = self.to_string();
        let raw = raw.trim();
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| AppError::ValidationFailed(format!("Invalid amount: {}", raw)))
    }
}

impl fmt::Display for AmountInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountInput::Number(number) => write!(f, "{}", number),
            AmountInput::Text(text) => f.write_str(text),
        }
    }
}

/// POST /api/request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    #[validate(length(min = 1, message = "requesterSeed is required"))]
    pub requester_seed: String,
    #[validate(length(min = 1, message = "recipientAddress is required"))]
    pub recipient_address: String,
    #[validate(length(min = 1, max = 12, message = "asset must be 1-12 characters"))]
    pub asset: String,
    pub amount: AmountInput,
    #[validate(length(max = 256, message = "note must be at most 256 characters"))]
    pub note: Option<String>,
}

/// POST /api/payment/process
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentBody {
    #[validate(length(min = 1, message = "payerSeed is required"))]
    pub payer_seed: String,
    #[validate(length(min = 1, message = "requestId is required"))]
    pub request_id: String,
    pub amount: AmountInput,
    pub asset: Option<String>,
}

/// POST /api/fund-account
#[derive(Debug, Deserialize, Validate)]
pub struct FundAccountBody {
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
}

/// POST /api/attest
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttestBody {
    #[validate(length(min = 1, message = "XRPL transaction hash is required"))]
    pub xrpl_tx_hash: String,
    pub request_id: Option<String>,
    pub amount: Option<AmountInput>,
    pub asset: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// GET /api/price/quote
#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_to")]
    pub to: String,
    #[serde(default = "default_amount")]
    pub amount: String,
}

fn default_from() -> String {
    "ETH".to_string()
}

fn default_to() -> String {
    "XRP".to_string()
}

fn default_amount() -> String {
    "1".to_string()
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestResponse {
    pub ok: bool,
    pub request: PaymentRequest,
    pub explorer_url: String,
}

#[derive(Debug, Serialize)]
pub struct RequestListResponse {
    pub ok: bool,
    pub requests: Vec<PaymentRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetailsResponse {
    pub ok: bool,
    pub request: PaymentRequest,
    pub anchor_tx_url: Option<String>,
    pub paid_tx_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub ok: bool,
    pub tx_hash: String,
    pub delivered: Option<serde_json::Value>,
    pub status: String,
    pub request: PaymentRequest,
    pub explorer_url: String,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub quote: PriceQuote,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub ok: bool,
    pub transaction: serde_json::Value,
    pub explorer_url: String,
}

/// Account status; a missing account is reported, not an error
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub ok: bool,
    pub address: String,
    pub exists: bool,
    pub balance: String,
    pub balance_drops: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    pub funded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundAccountResponse {
    pub ok: bool,
    pub message: String,
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestResponse {
    pub ok: bool,
    pub message: String,
    pub attestation_id: String,
    pub record: AttestationRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestStatusResponse {
    pub ok: bool,
    pub tx_hash: String,
    pub status: AttestationStatus,
    pub record: AttestationRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugRequestsResponse {
    pub ok: bool,
    pub total_requests: usize,
    pub requests: Vec<PaymentRequest>,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub ledger_url: String,
    pub network: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        let number: AmountInput = serde_json::from_str("20.5").unwrap();
        let text: AmountInput = serde_json::from_str("\"20.5\"").unwrap();
        let integer: AmountInput = serde_json::from_str("20").unwrap();

        assert_eq!(number.to_decimal().unwrap(), dec!(20.5));
        assert_eq!(text.to_decimal().unwrap(), dec!(20.5));
        assert_eq!(integer.to_decimal().unwrap(), dec!(20));

        let garbage: AmountInput = serde_json::from_str("\"twenty\"").unwrap();
        assert!(garbage.to_decimal().is_err());
    }

    #[test]
    fn test_quote_params_defaults() {
        let params: QuoteParams = serde_json::from_str("{}").unwrap();
        assert_eq!((params.from.as_str(), params.to.as_str(), params.amount.as_str()), ("ETH", "XRP", "1"));
    }

    #[test]
    fn test_create_body_requires_seed() {
        let body: CreateRequestBody = serde_json::from_value(serde_json::json!({
            "requesterSeed": "",
            "recipientAddress": "rAddress",
            "asset": "XRP",
            "amount": 5
        }))
        .unwrap();
        assert!(body.validate().is_err());
    }
}
