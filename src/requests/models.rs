use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationResult;

pub const REQUEST_ID_PREFIX: &str = "req_";
pub const REQUEST_MEMO_TYPE: &str = "venmo_request";
pub const PAYMENT_MEMO_TYPE: &str = "venmo_payment";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Open,
    Paid,
}

/// A payment request anchored on the ledger by a marker payment
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub request_id: String,
    pub requester_address: String,
    pub recipient_address: String,
    pub asset: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub status: RequestStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub paid_at: Option<DateTime<Utc>>,
    pub anchor_tx: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_tx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationResult>,
}

impl PaymentRequest {
    pub fn new_open(
        request_id: String,
        requester_address: String,
        recipient_address: String,
        asset: String,
        amount: Decimal,
        note: Option<String>,
        anchor_tx: String,
    ) -> Self {
        Self {
            request_id,
            requester_address,
            recipient_address,
            asset,
            amount,
            note,
            status: RequestStatus::Open,
            created_at: Utc::now(),
            paid_at: None,
            anchor_tx,
            paid_tx: None,
            delivered_amount: None,
            attestation: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RequestStatus::Open
    }

    /// Whether `address` is the requester or the recipient
    pub fn involves(&self, address: &str) -> bool {
        self.requester_address == address || self.recipient_address == address
    }
}

/// What the store learned about a settling transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub paid_tx: String,
    pub delivered_amount: Option<Decimal>,
}

impl Settlement {
    pub fn new(paid_tx: impl Into<String>, delivered_amount: Option<Decimal>) -> Self {
        Self {
            paid_tx: paid_tx.into(),
            delivered_amount,
        }
    }
}

/// Outcome of the OPEN -> PAID check-then-set
#[derive(Clone, Debug)]
pub enum TransitionOutcome {
    Transitioned(PaymentRequest),
    AlreadyPaid(PaymentRequest),
}

impl TransitionOutcome {
    pub fn transitioned(&self) -> bool {
        matches!(self, TransitionOutcome::Transitioned(_))
    }

    pub fn into_record(self) -> PaymentRequest {
        match self {
            TransitionOutcome::Transitioned(record) | TransitionOutcome::AlreadyPaid(record) => {
                record
            }
        }
    }
}

/// Memo data of the marker payment that anchors a request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMemo<'a> {
    pub request_id: &'a str,
    pub asset: &'a str,
    pub amount: Decimal,
    pub note: Option<&'a str>,
}

/// Memo data of a settlement payment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMemo<'a> {
    pub request_id: &'a str,
    pub asset: &'a str,
    pub amount: Decimal,
}

/// Result of an explicit settlement
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub tx_hash: String,
    pub delivered: Option<serde_json::Value>,
    pub status: String,
    pub request: PaymentRequest,
}

/// `req_<unix millis>` ids, strictly increasing within the process
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    last: AtomicI64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        format!("{}{}", REQUEST_ID_PREFIX, now.max(previous + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_within_a_millisecond() {
        let generator = RequestIdGenerator::new();
        let ids: HashSet<String> = (0..1_000).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 1_000);
        assert!(ids.iter().all(|id| {
            id.starts_with(REQUEST_ID_PREFIX) && id[4..].chars().all(|c| c.is_ascii_digit())
        }));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_value(RequestStatus::Open).unwrap(), "OPEN");
        assert_eq!(serde_json::to_value(RequestStatus::Paid).unwrap(), "PAID");
    }

    #[test]
    fn test_open_record_serialization_omits_paid_fields() {
        let record = PaymentRequest::new_open(
            "req_1".into(),
            "rRequester".into(),
            "rRecipient".into(),
            "XRP".into(),
            Decimal::from(20),
            None,
            "ANCHOR".into(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["requestId"], "req_1");
        assert_eq!(json["status"], "OPEN");
        assert!(json.get("paidTx").is_none());
        assert!(json.get("paidAt").is_none());
        assert!(json["createdAt"].is_i64());
    }
}
