//! Best-effort attestation of settling payments through the Flare Data Connector.
//!
//! Attestation never affects request status: failures are logged and dropped.

pub mod fdc;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::AttestationError;
use crate::requests::store::RequestStore;

pub use fdc::FdcAttestor;

/// Outcome of a submitted attestation request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResult {
    pub tx_hash: String,
    pub block_number: u64,
    pub round_id: u64,
    pub abi_encoded_request: String,
}

#[async_trait]
pub trait AttestationProvider: Send + Sync {
    /// Request attestation of an XRPL transaction by its hash
    async fn submit_attestation(&self, xrpl_tx_hash: &str)
        -> Result<AttestationResult, AttestationError>;
}

/// Provider used when no Flare key is configured
pub struct DisabledAttestor;

#[async_trait]
impl AttestationProvider for DisabledAttestor {
    async fn submit_attestation(
        &self,
        _xrpl_tx_hash: &str,
    ) -> Result<AttestationResult, AttestationError> {
        Err(AttestationError::NotConfigured)
    }
}

/// Fires attestation in the background once a request is settled
#[derive(Clone)]
pub struct AttestationTrigger {
    provider: Arc<dyn AttestationProvider>,
    store: Arc<dyn RequestStore>,
}

impl AttestationTrigger {
    pub fn new(provider: Arc<dyn AttestationProvider>, store: Arc<dyn RequestStore>) -> Self {
        Self { provider, store }
    }

    pub fn schedule(&self, request_id: String, tx_hash: String) -> JoinHandle<()> {
        let provider = self.provider.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            match provider.submit_attestation(&tx_hash).await {
                Ok(result) => {
                    info!(
                        "📝 Attestation submitted for {} (round {}, flare tx {})",
                        request_id, result.round_id, result.tx_hash
                    );
                    if let Err(e) = store.record_attestation(&request_id, result).await {
                        error!("❌ Could not record attestation for {}: {}", request_id, e);
                    }
                }
                Err(e) => error!("❌ FDC attestation failed for {}: {}", request_id, e),
            }
        })
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttestationStatus {
    Started,
    Submitted,
    Failed,
}

/// Manually requested attestation and its progress
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRecord {
    pub id: String,
    pub xrpl_tx_hash: String,
    pub request_id: Option<String>,
    pub amount: Option<String>,
    pub asset: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: AttestationStatus,
    pub timestamp: i64,
    pub explorer_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AttestationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Details supplied with a manual attestation request
#[derive(Clone, Debug, Default)]
pub struct AttestationDetails {
    pub request_id: Option<String>,
    pub amount: Option<String>,
    pub asset: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// In-memory log of manual attestations, keyed by XRPL transaction hash
pub struct AttestationLog {
    provider: Arc<dyn AttestationProvider>,
    records: Arc<RwLock<HashMap<String, AttestationRecord>>>,
}

impl AttestationLog {
    pub fn new(provider: Arc<dyn AttestationProvider>) -> Self {
        Self {
            provider,
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a `started` entry and submit the attestation in the background
    pub fn start(
        &self,
        xrpl_tx_hash: &str,
        details: AttestationDetails,
        explorer_url: String,
    ) -> (AttestationRecord, JoinHandle<()>) {
        let now = Utc::now().timestamp_millis();
        let record = AttestationRecord {
            id: format!("attest_{}", now),
            xrpl_tx_hash: xrpl_tx_hash.to_string(),
            request_id: details.request_id,
            amount: details.amount,
            asset: details.asset,
            from: details.from,
            to: details.to,
            status: AttestationStatus::Started,
            timestamp: now,
            explorer_url,
            result: None,
            error: None,
        };
        self.records
            .write()
            .insert(xrpl_tx_hash.to_string(), record.clone());
        info!("🔒 Attestation started for {}", xrpl_tx_hash);

        let provider = self.provider.clone();
        let records = self.records.clone();
        let hash = xrpl_tx_hash.to_string();
        let handle = tokio::spawn(async move {
            let outcome = provider.submit_attestation(&hash).await;
            let mut records = records.write();
            let Some(record) = records.get_mut(&hash) else {
                return;
            };
            match outcome {
                Ok(result) => {
                    record.status = AttestationStatus::Submitted;
                    record.result = Some(result);
                }
                Err(e) => {
                    error!("❌ Manual attestation for {} failed: {}", hash, e);
                    record.status = AttestationStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
        });

        (record, handle)
    }

    pub fn get(&self, xrpl_tx_hash: &str) -> Option<AttestationRecord> {
        self.records.read().get(xrpl_tx_hash).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::models::{PaymentRequest, Settlement};
    use crate::requests::store::InMemoryRequestStore;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct CountingAttestor {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl AttestationProvider for CountingAttestor {
        async fn submit_attestation(
            &self,
            xrpl_tx_hash: &str,
        ) -> Result<AttestationResult, AttestationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AttestationError::Failed("verifier down".to_string()));
            }
            Ok(AttestationResult {
                tx_hash: format!("0x{}", xrpl_tx_hash.to_lowercase()),
                block_number: 1,
                round_id: 2,
                abi_encoded_request: "0x".to_string(),
            })
        }
    }

    async fn paid_store() -> Arc<InMemoryRequestStore> {
        let store = Arc::new(InMemoryRequestStore::new());
        store
            .put(PaymentRequest::new_open(
                "req_1".into(),
                "rRequester".into(),
                "rRecipient".into(),
                "XRP".into(),
                Decimal::from(5),
                None,
                "ANCHOR".into(),
            ))
            .await
            .unwrap();
        store
            .transition_to_paid("req_1", Settlement::new("PAID", None))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_trigger_records_result_on_success() {
        let store = paid_store().await;
        let provider = Arc::new(CountingAttestor {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let trigger = AttestationTrigger::new(provider.clone(), store.clone());

        trigger
            .schedule("req_1".into(), "PAID".into())
            .await
            .unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let record = store.get("req_1").await.unwrap();
        assert_eq!(record.attestation.unwrap().round_id, 2);
    }

    #[tokio::test]
    async fn test_trigger_failure_leaves_request_untouched() {
        let store = paid_store().await;
        let trigger = AttestationTrigger::new(
            Arc::new(CountingAttestor {
                calls: AtomicUsize::new(0),
                fail: true,
            }),
            store.clone(),
        );

        trigger
            .schedule("req_1".into(), "PAID".into())
            .await
            .unwrap();

        let record = store.get("req_1").await.unwrap();
        assert!(record.attestation.is_none());
        assert_eq!(record.paid_tx.as_deref(), Some("PAID"));
    }

    #[tokio::test]
    async fn test_log_tracks_manual_attestation() {
        let log = AttestationLog::new(Arc::new(DisabledAttestor));
        let (record, handle) = log.start(
            "ABC",
            AttestationDetails {
                request_id: Some("req_1".into()),
                ..AttestationDetails::default()
            },
            "https://testnet.xrpl.org/transactions/ABC".into(),
        );
        assert_eq!(record.status, AttestationStatus::Started);
        assert!(record.id.starts_with("attest_"));

        handle.await.unwrap();
        let stored = log.get("ABC").unwrap();
        assert_eq!(stored.status, AttestationStatus::Failed);
        assert!(stored.error.unwrap().contains("not configured"));
        assert!(log.get("XYZ").is_none());
    }
}
