use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::attestation::AttestationTrigger;
use crate::error::{AppError, AppResult, LedgerError, RequestError};
use crate::requests::matcher::candidate_request_ids;
use crate::requests::models::{
    PaymentMemo, PaymentRequest, RequestIdGenerator, RequestMemo, Settlement, SettlementResult,
    PAYMENT_MEMO_TYPE, REQUEST_MEMO_TYPE,
};
use crate::requests::store::RequestStore;
use crate::xrpl::models::{
    drops_to_xrp, xrp_to_drops, LedgerTransaction, Memo, PaymentDraft, ACCOUNT_RESERVE_XRP,
    TES_SUCCESS,
};
use crate::xrpl::{is_valid_classic_address, LedgerClient};

/// Value of the marker payment that anchors a request on the ledger
pub const ANCHOR_PAYMENT_DROPS: u64 = 5_000_000;
/// Fee headroom required on top of the payment amount
pub const FEE_RESERVE_DROPS: u64 = 12;

pub struct CreateRequest {
    pub requester_seed: String,
    pub recipient_address: String,
    pub asset: String,
    pub amount: Decimal,
    pub note: Option<String>,
}

pub struct ProcessPayment {
    pub payer_seed: String,
    pub request_id: String,
    pub amount: Decimal,
    pub asset: String,
}

/// Request lifecycle engine: the only writer of payment request state
pub struct RequestEngine {
    store: Arc<dyn RequestStore>,
    ledger: Arc<dyn LedgerClient>,
    attestation: AttestationTrigger,
    ids: RequestIdGenerator,
}

impl RequestEngine {
    pub fn new(
        store: Arc<dyn RequestStore>,
        ledger: Arc<dyn LedgerClient>,
        attestation: AttestationTrigger,
    ) -> Self {
        Self {
            store,
            ledger,
            attestation,
            ids: RequestIdGenerator::new(),
        }
    }

    fn derive_address(&self, seed: &str, role: &str) -> AppResult<String> {
        self.ledger
            .derive_address(seed)
            .map_err(|e| AppError::ValidationFailed(format!("Invalid {} seed: {}", role, e)))
    }

    /// Anchor a new request on the ledger and store it as OPEN
    #[instrument(skip(self, input), fields(recipient = %input.recipient_address, asset = %input.asset))]
    pub async fn create_request(&self, input: CreateRequest) -> AppResult<PaymentRequest> {
        let recipient = input.recipient_address.trim();
        if recipient.is_empty() {
            return Err(AppError::ValidationFailed(
                "recipientAddress is required".to_string(),
            ));
        }
        if !is_valid_classic_address(recipient) {
            return Err(AppError::ValidationFailed(format!(
                "Invalid recipient address: {}",
                recipient
            )));
        }
        if input.amount <= Decimal::ZERO {
            return Err(AppError::ValidationFailed(
                "Amount must be greater than zero".to_string(),
            ));
        }
        let asset = input.asset.trim();
        if asset.is_empty() {
            return Err(AppError::ValidationFailed("asset is required".to_string()));
        }

        let requester = self.derive_address(&input.requester_seed, "requester")?;
        let request_id = self.ids.next_id();

        let memo = Memo::json(
            REQUEST_MEMO_TYPE,
            &RequestMemo {
                request_id: &request_id,
                asset,
                amount: input.amount,
                note: input.note.as_deref(),
            },
        )?;
        let draft = PaymentDraft {
            destination: recipient.to_string(),
            amount_drops: ANCHOR_PAYMENT_DROPS,
            memos: vec![memo],
        };

        let submitted = match self.ledger.submit_payment(&input.requester_seed, draft).await {
            Ok(submitted) => submitted,
            Err(LedgerError::AccountNotFound(address)) => {
                return Err(AppError::ValidationFailed(format!(
                    "Requester account not found or inactive: {}",
                    address
                )))
            }
            Err(e) => return Err(e.into()),
        };

        if !submitted.succeeded() {
            warn!(
                "⚠️ Anchor payment for {} failed with {}",
                request_id, submitted.result_code
            );
            return Err(LedgerError::SubmissionFailed {
                message: format!("Anchor payment {} was not successful", submitted.hash),
                code: submitted.result_code,
            }
            .into());
        }

        let record = PaymentRequest::new_open(
            request_id,
            requester,
            recipient.to_string(),
            asset.to_string(),
            input.amount,
            input.note,
            submitted.hash,
        );
        let record = self.store.put(record).await?;
        info!(
            "✅ Request {} created, anchor {}",
            record.request_id, record.anchor_tx
        );
        Ok(record)
    }

    /// Pay an OPEN request from the payer's account and mark it PAID
    #[instrument(skip(self, input), fields(request_id = %input.request_id))]
    pub async fn process_payment(&self, input: ProcessPayment) -> AppResult<SettlementResult> {
        let request = self.store.get(&input.request_id).await?;
        if !request.is_open() {
            return Err(RequestError::AlreadyProcessed(request.request_id).into());
        }

        if input.amount <= Decimal::ZERO {
            return Err(AppError::ValidationFailed(
                "Amount must be greater than zero".to_string(),
            ));
        }
        let amount_drops = xrp_to_drops(input.amount)?;
        let payer = self.derive_address(&input.payer_seed, "payer")?;

        self.preflight(&payer, &request, input.amount, amount_drops)
            .await?;

        let memo = Memo::json(
            PAYMENT_MEMO_TYPE,
            &PaymentMemo {
                request_id: &request.request_id,
                asset: &input.asset,
                amount: input.amount,
            },
        )?;
        let draft = PaymentDraft {
            destination: request.requester_address.clone(),
            amount_drops,
            memos: vec![memo],
        };

        let submitted = match self.ledger.submit_payment(&input.payer_seed, draft).await {
            Ok(submitted) => submitted,
            Err(LedgerError::SubmissionFailed { code, message }) => {
                return Err(LedgerError::SettlementFailed { code, message }.into())
            }
            Err(e) => return Err(e.into()),
        };

        if !submitted.succeeded() {
            warn!(
                "⚠️ Settlement of {} failed with {}",
                request.request_id, submitted.result_code
            );
            return Err(LedgerError::SettlementFailed {
                message: format!("Payment {} was not successful", submitted.hash),
                code: submitted.result_code,
            }
            .into());
        }

        let outcome = self
            .store
            .transition_to_paid(
                &request.request_id,
                Settlement::new(submitted.hash.clone(), submitted.delivered_xrp()),
            )
            .await?;

        if outcome.transitioned() {
            info!("💰 Request {} paid by {}", request.request_id, submitted.hash);
            self.attestation
                .schedule(request.request_id.clone(), submitted.hash.clone());
        } else {
            info!(
                "Request {} was already settled by the ledger stream",
                request.request_id
            );
        }

        Ok(SettlementResult {
            tx_hash: submitted.hash,
            delivered: submitted.delivered_amount,
            status: submitted.result_code,
            request: outcome.into_record(),
        })
    }

    async fn preflight(
        &self,
        payer: &str,
        request: &PaymentRequest,
        amount: Decimal,
        amount_drops: u64,
    ) -> AppResult<()> {
        let payer_info = self.ledger.account_info(payer).await?.ok_or_else(|| {
            AppError::ValidationFailed(format!(
                "Sender account not found or inactive: {}",
                payer
            ))
        })?;

        let balance = payer_info.balance_drops();
        if balance < amount_drops.saturating_add(FEE_RESERVE_DROPS) {
            return Err(AppError::ValidationFailed(format!(
                "Insufficient balance. Has {} XRP, needs {} XRP + fees",
                drops_to_xrp(balance),
                amount
            )));
        }

        let destination = self.ledger.account_info(&request.requester_address).await?;
        if destination.is_none() {
            warn!(
                "⚠️ Destination {} does not exist yet, payment will create it",
                request.requester_address
            );
            if amount < ACCOUNT_RESERVE_XRP {
                return Err(AppError::ValidationFailed(
                    "Destination account doesn't exist. First payment must be at least 10 XRP to activate the account."
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Settle the first OPEN request referenced by a validated payment's memos.
    /// Returns the id of the request this transaction settled, if any.
    pub async fn on_ledger_transaction(&self, tx: &LedgerTransaction) -> AppResult<Option<String>> {
        if !tx.is_payment() {
            return Ok(None);
        }
        let Some(memos) = tx.memos.as_deref().filter(|memos| !memos.is_empty()) else {
            return Ok(None);
        };
        if let Some(code) = tx.result_code() {
            if code != TES_SUCCESS {
                debug!("Ignoring failed payment {} ({})", tx.hash, code);
                return Ok(None);
            }
        }

        for request_id in candidate_request_ids(memos) {
            let request = match self.store.get(&request_id).await {
                Ok(request) => request,
                Err(RequestError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if !request.is_open() {
                continue;
            }
            // The anchor payment carries the request's own id in its memo
            if request.anchor_tx.eq_ignore_ascii_case(&tx.hash) {
                debug!("Skipping anchor tx {} of {}", tx.hash, request_id);
                continue;
            }

            let outcome = self
                .store
                .transition_to_paid(
                    &request_id,
                    Settlement::new(tx.hash.clone(), tx.delivered_xrp()),
                )
                .await?;
            if !outcome.transitioned() {
                continue;
            }

            info!("💰 Request paid: {} by ledger tx {}", request_id, tx.hash);
            self.attestation
                .schedule(request_id.clone(), tx.hash.clone());
            return Ok(Some(request_id));
        }

        Ok(None)
    }

    pub async fn get_request(&self, request_id: &str) -> AppResult<PaymentRequest> {
        Ok(self.store.get(request_id).await?)
    }

    /// Requests involving `address`, newest first
    pub async fn requests_for(&self, address: &str) -> AppResult<Vec<PaymentRequest>> {
        let mut requests = self.store.list_for(address).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    pub async fn all_requests(&self) -> AppResult<Vec<PaymentRequest>> {
        let mut requests = self.store.all().await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Request settled by `tx_hash`, if any
    pub async fn find_by_paid_tx(&self, tx_hash: &str) -> AppResult<Option<PaymentRequest>> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .find(|request| {
                request
                    .paid_tx
                    .as_deref()
                    .is_some_and(|paid| paid.eq_ignore_ascii_case(tx_hash))
            }))
    }
}
