use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DROPS_PER_XRP: Decimal = dec!(1_000_000);
/// Base reserve for activating a new account on the ledger
pub const ACCOUNT_RESERVE_XRP: Decimal = dec!(10);
pub const TES_SUCCESS: &str = "tesSUCCESS";

/// Convert an XRP amount to drops, rejecting fractional drops
pub fn xrp_to_drops(xrp: Decimal) -> AppResult<u64> {
    if xrp.is_sign_negative() {
        return Err(AppError::ValidationFailed("amount must not be negative".to_string()));
    }
    let drops = xrp
        .checked_mul(DROPS_PER_XRP)
        .ok_or_else(|| AppError::ValidationFailed(format!("{} XRP is out of range", xrp)))?;
    if drops.fract() != Decimal::ZERO {
        return Err(AppError::ValidationFailed(format!(
            "{} XRP has more than 6 decimal places",
            xrp
        )));
    }
    u64::try_from(drops.trunc())
        .map_err(|_| AppError::ValidationFailed(format!("{} XRP is out of range", xrp)))
}

pub fn drops_to_xrp(drops: u64) -> Decimal {
    (Decimal::from(drops) / DROPS_PER_XRP).normalize()
}

/// A memo as carried on the ledger, raw bytes on our side
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Memo {
    pub memo_type: Option<Vec<u8>>,
    pub memo_data: Option<Vec<u8>>,
    pub memo_format: Option<Vec<u8>>,
}

impl Memo {
    /// JSON memo with a type tag, as written by request and payment submissions
    pub fn json<T: Serialize>(memo_type: &str, payload: &T) -> AppResult<Self> {
        Ok(Self {
            memo_type: Some(memo_type.as_bytes().to_vec()),
            memo_data: Some(serde_json::to_vec(payload)?),
            memo_format: Some(b"application/json".to_vec()),
        })
    }
}

/// Memo wrapper in the ledger's JSON transaction format (hex fields)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoEnvelope {
    #[serde(rename = "Memo")]
    pub memo: MemoFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MemoFields {
    #[serde(rename = "MemoType", skip_serializing_if = "Option::is_none")]
    pub memo_type: Option<String>,
    #[serde(rename = "MemoData", skip_serializing_if = "Option::is_none")]
    pub memo_data: Option<String>,
    #[serde(rename = "MemoFormat", skip_serializing_if = "Option::is_none")]
    pub memo_format: Option<String>,
}

impl From<&Memo> for MemoEnvelope {
    fn from(memo: &Memo) -> Self {
        Self {
            memo: MemoFields {
                memo_type: memo.memo_type.as_ref().map(hex::encode_upper),
                memo_data: memo.memo_data.as_ref().map(hex::encode_upper),
                memo_format: memo.memo_format.as_ref().map(hex::encode_upper),
            },
        }
    }
}

/// Transaction metadata fields the service cares about
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransactionMeta {
    #[serde(rename = "TransactionResult", default)]
    pub transaction_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_amount: Option<serde_json::Value>,
}

/// A transaction as delivered by `tx` lookups or expanded `ledger` responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Account", default)]
    pub account: String,
    #[serde(rename = "Destination", default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(rename = "Amount", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<serde_json::Value>,
    #[serde(rename = "Memos", default, skip_serializing_if = "Option::is_none")]
    pub memos: Option<Vec<MemoEnvelope>>,
    #[serde(default, alias = "metaData", skip_serializing_if = "Option::is_none")]
    pub meta: Option<TransactionMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index: Option<u32>,
    #[serde(default)]
    pub validated: bool,
}

impl LedgerTransaction {
    pub fn is_payment(&self) -> bool {
        self.transaction_type == "Payment"
    }

    pub fn result_code(&self) -> Option<&str> {
        self.meta.as_ref()?.transaction_result.as_deref()
    }

    /// Delivered amount in XRP when the payment moved native XRP.
    /// Issued-currency amounts are objects and yield `None`.
    pub fn delivered_xrp(&self) -> Option<Decimal> {
        let delivered = self
            .meta
            .as_ref()
            .and_then(|meta| meta.delivered_amount.as_ref())
            .or(self.amount.as_ref())?;
        parse_native_drops(delivered).map(drops_to_xrp)
    }
}

pub fn parse_native_drops(value: &serde_json::Value) -> Option<u64> {
    value.as_str()?.parse().ok()
}

/// Unsigned payment handed to the ledger client
#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub destination: String,
    pub amount_drops: u64,
    pub memos: Vec<Memo>,
}

/// Outcome of a validated (or definitively failed) submission
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedPayment {
    pub hash: String,
    pub account: String,
    pub result_code: String,
    pub delivered_amount: Option<serde_json::Value>,
    pub ledger_index: Option<u32>,
}

impl SubmittedPayment {
    pub fn succeeded(&self) -> bool {
        self.result_code == TES_SUCCESS
    }

    pub fn delivered_xrp(&self) -> Option<Decimal> {
        self.delivered_amount
            .as_ref()
            .and_then(parse_native_drops)
            .map(drops_to_xrp)
    }
}

/// Subset of `account_info` used for pre-flight checks and the account endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Balance")]
    pub balance: String,
    #[serde(rename = "Sequence")]
    pub sequence: u32,
}

impl AccountInfo {
    pub fn balance_drops(&self) -> u64 {
        self.balance.parse().unwrap_or(0)
    }
}
