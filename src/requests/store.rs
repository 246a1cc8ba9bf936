use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::attestation::AttestationResult;
use crate::error::RequestError;
use crate::requests::models::{PaymentRequest, RequestStatus, Settlement, TransitionOutcome};

/// Keyed storage for payment requests.
///
/// `transition_to_paid` is the only place status changes; implementations must
/// perform its check and update as one atomic step.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn put(&self, record: PaymentRequest) -> Result<PaymentRequest, RequestError>;

    async fn get(&self, request_id: &str) -> Result<PaymentRequest, RequestError>;

    async fn list_for(&self, address: &str) -> Result<Vec<PaymentRequest>, RequestError>;

    async fn transition_to_paid(
        &self,
        request_id: &str,
        settlement: Settlement,
    ) -> Result<TransitionOutcome, RequestError>;

    async fn record_attestation(
        &self,
        request_id: &str,
        attestation: AttestationResult,
    ) -> Result<(), RequestError>;

    async fn all(&self) -> Result<Vec<PaymentRequest>, RequestError>;
}

/// Process-lifetime store. The lock is synchronous and never held across an await.
#[derive(Default)]
pub struct InMemoryRequestStore {
    records: RwLock<HashMap<String, PaymentRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn put(&self, record: PaymentRequest) -> Result<PaymentRequest, RequestError> {
        let mut records = self.records.write();
        if records.contains_key(&record.request_id) {
            return Err(RequestError::DuplicateKey(record.request_id));
        }
        records.insert(record.request_id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, request_id: &str) -> Result<PaymentRequest, RequestError> {
        self.records
            .read()
            .get(request_id)
            .cloned()
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))
    }

    async fn list_for(&self, address: &str) -> Result<Vec<PaymentRequest>, RequestError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| record.involves(address))
            .cloned()
            .collect())
    }

    async fn transition_to_paid(
        &self,
        request_id: &str,
        settlement: Settlement,
    ) -> Result<TransitionOutcome, RequestError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(request_id)
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;

        if record.status == RequestStatus::Paid {
            return Ok(TransitionOutcome::AlreadyPaid(record.clone()));
        }

        record.status = RequestStatus::Paid;
        record.paid_tx = Some(settlement.paid_tx);
        record.paid_at = Some(Utc::now());
        record.delivered_amount = settlement.delivered_amount;

        Ok(TransitionOutcome::Transitioned(record.clone()))
    }

    async fn record_attestation(
        &self,
        request_id: &str,
        attestation: AttestationResult,
    ) -> Result<(), RequestError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(request_id)
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;

        // Attestation only ever follows a settlement
        if record.status == RequestStatus::Paid {
            record.attestation = Some(attestation);
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<PaymentRequest>, RequestError> {
        Ok(self.records.read().values().cloned().collect())
    }
}
