use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use tracing::info;

use super::models::*;
use crate::{
    attestation::{AttestationDetails, AttestationLog, AttestationRecord, AttestationStatus},
    config::Config,
    error::{AppError, AppResult},
    quote_engine::QuoteEngine,
    requests::{CreateRequest, PaymentRequest, ProcessPayment, RequestEngine},
    middleware::ValidatedJson,
    xrpl::{drops_to_xrp, is_valid_classic_address, LedgerClient},
};

/// Balance at which a testnet account counts as funded
const FUNDED_THRESHOLD_DROPS: u64 = 1_000_000;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RequestEngine>,
    pub ledger: Arc<dyn LedgerClient>,
    pub quote_engine: Arc<QuoteEngine>,
    pub attestations: Arc<AttestationLog>,
    pub config: Arc<Config>,
}

impl AppState {
    fn explorer_url(&self, hash: &str) -> String {
        self.config.xrpl.explorer_tx_url(hash)
    }
}

fn is_transaction_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Create a payment request anchored on the ledger
/// POST /api/request
pub async fn create_request(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateRequestBody>,
) -> AppResult<Json<CreateRequestResponse>> {
    let amount = body.amount.to_decimal()?;
    info!(
        "📨 Creating request: {} {} to {}",
        amount, body.asset, body.recipient_address
    );

    let request = state
        .engine
        .create_request(CreateRequest {
            requester_seed: body.requester_seed,
            recipient_address: body.recipient_address,
            asset: body.asset,
            amount,
            note: body.note.filter(|note| !note.trim().is_empty()),
        })
        .await?;

    Ok(Json(CreateRequestResponse {
        ok: true,
        explorer_url: state.explorer_url(&request.anchor_tx),
        request,
    }))
}

/// Requests where `address` is requester or recipient, newest first
/// GET /api/requests/:address
pub async fn list_requests(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<RequestListResponse>> {
    let requests = state.engine.requests_for(&address).await?;
    Ok(Json(RequestListResponse { ok: true, requests }))
}

/// GET /api/request/:requestId
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<RequestDetailsResponse>> {
    let request = state.engine.get_request(&request_id).await?;

    Ok(Json(RequestDetailsResponse {
        ok: true,
        anchor_tx_url: Some(state.explorer_url(&request.anchor_tx)),
        paid_tx_url: request.paid_tx.as_deref().map(|tx| state.explorer_url(tx)),
        request,
    }))
}

/// Settle an OPEN request from the payer's account
/// POST /api/payment/process
pub async fn process_payment(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProcessPaymentBody>,
) -> AppResult<Json<PaymentResponse>> {
    let amount = body.amount.to_decimal()?;
    info!("💸 Processing payment of {} for {}", amount, body.request_id);

    let settlement = state
        .engine
        .process_payment(ProcessPayment {
            payer_seed: body.payer_seed,
            request_id: body.request_id,
            amount,
            asset: body.asset.unwrap_or_else(|| "XRP".to_string()),
        })
        .await?;

    Ok(Json(PaymentResponse {
        ok: true,
        explorer_url: state.explorer_url(&settlement.tx_hash),
        tx_hash: settlement.tx_hash,
        delivered: settlement.delivered,
        status: settlement.status,
        request: settlement.request,
    }))
}

/// GET /api/price/quote?from=ETH&to=XRP&amount=1
pub async fn price_quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> AppResult<Json<QuoteResponse>> {
    let quote = state
        .quote_engine
        .quote(&params.from, &params.to, &params.amount)
        .await?;
    Ok(Json(QuoteResponse { ok: true, quote }))
}

/// GET /api/transaction/:txHash
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> AppResult<Json<TransactionResponse>> {
    if !is_transaction_hash(&tx_hash) {
        return Err(AppError::ValidationFailed(format!(
            "Invalid transaction hash format. XRPL transaction hashes must be 64-character hexadecimal strings (got {} characters)",
            tx_hash.len()
        )));
    }

    info!("🔍 Looking up transaction: {}", tx_hash);
    let transaction = state.ledger.transaction(&tx_hash).await?;

    Ok(Json(TransactionResponse {
        ok: true,
        transaction,
        explorer_url: state.explorer_url(&tx_hash),
    }))
}

/// GET /api/account/:address
pub async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<AccountResponse>> {
    if !is_valid_classic_address(&address) {
        return Err(AppError::ValidationFailed(format!(
            "Invalid address: {}",
            address
        )));
    }

    let response = match state.ledger.account_info(&address).await? {
        Some(info) => {
            let drops = info.balance_drops();
            AccountResponse {
                ok: true,
                address,
                exists: true,
                balance: drops_to_xrp(drops).to_string(),
                balance_drops: info.balance,
                sequence: Some(info.sequence),
                funded: drops >= FUNDED_THRESHOLD_DROPS,
                message: None,
            }
        }
        None => AccountResponse {
            ok: true,
            address,
            exists: false,
            balance: "0".to_string(),
            balance_drops: "0".to_string(),
            sequence: None,
            funded: false,
            message: Some("Account not found - needs funding to activate".to_string()),
        },
    };

    Ok(Json(response))
}

/// Fund a testnet account from the faucet
/// POST /api/fund-account
pub async fn fund_account(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<FundAccountBody>,
) -> AppResult<Json<FundAccountResponse>> {
    let address = body.address.trim();
    if !is_valid_classic_address(address) {
        return Err(AppError::ValidationFailed(format!(
            "Invalid address: {}",
            address
        )));
    }

    info!("💰 Funding test account: {}", address);
    let funded = state.ledger.fund_account(address).await?;

    Ok(Json(FundAccountResponse {
        ok: true,
        message: format!("Successfully funded {} with test XRP", funded.address),
        tx_hash: funded.tx_hash.unwrap_or_else(|| "N/A".to_string()),
    }))
}

/// Start an attestation for an arbitrary XRPL transaction
/// POST /api/attest
pub async fn start_attestation(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<AttestBody>,
) -> AppResult<Json<AttestResponse>> {
    let tx_hash = body.xrpl_tx_hash.trim().to_string();
    if !is_transaction_hash(&tx_hash) {
        return Err(AppError::ValidationFailed(format!(
            "Invalid transaction hash: {}",
            tx_hash
        )));
    }

    let details = AttestationDetails {
        request_id: body.request_id,
        amount: body.amount.map(|amount| amount.to_string()),
        asset: body.asset,
        from: body.from,
        to: body.to,
    };
    // The submission runs detached; its progress is read back through the log
    let (record, _submission) =
        state
            .attestations
            .start(&tx_hash, details, state.explorer_url(&tx_hash));

    Ok(Json(AttestResponse {
        ok: true,
        message: format!("Attestation started for tx {}", tx_hash),
        attestation_id: record.id.clone(),
        record,
    }))
}

/// GET /api/attest/:txHash
pub async fn attestation_status(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> AppResult<Json<AttestStatusResponse>> {
    let record = match state.attestations.get(&tx_hash) {
        Some(record) => record,
        None => state
            .engine
            .find_by_paid_tx(&tx_hash)
            .await?
            .and_then(|request| settled_attestation(&state, request))
            .ok_or_else(|| {
                AppError::NotFound(format!("No attestation found for tx {}", tx_hash))
            })?,
    };

    Ok(Json(AttestStatusResponse {
        ok: true,
        tx_hash,
        status: record.status,
        record,
    }))
}

/// Attestation recorded on a request when it was settled
fn settled_attestation(state: &AppState, request: PaymentRequest) -> Option<AttestationRecord> {
    let result = request.attestation?;
    let paid_tx = request.paid_tx?;
    let timestamp = request.paid_at.unwrap_or(request.created_at).timestamp_millis();

    Some(AttestationRecord {
        id: format!("attest_{}", timestamp),
        explorer_url: state.explorer_url(&paid_tx),
        xrpl_tx_hash: paid_tx,
        request_id: Some(request.request_id),
        amount: Some(request.amount.to_string()),
        asset: Some(request.asset),
        from: None,
        to: Some(request.requester_address),
        status: AttestationStatus::Submitted,
        timestamp,
        result: Some(result),
        error: None,
    })
}

/// GET /api/debug/requests
pub async fn debug_requests(State(state): State<AppState>) -> AppResult<Json<DebugRequestsResponse>> {
    let requests = state.engine.all_requests().await?;
    Ok(Json(DebugRequestsResponse {
        ok: true,
        total_requests: requests.len(),
        requests,
    }))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        ledger_url: state.config.xrpl.rpc_url.clone(),
        network: state.config.xrpl.network.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_hash_format() {
        assert!(is_transaction_hash(&"A1".repeat(32)));
        assert!(is_transaction_hash(&"ab".repeat(32)));
        assert!(!is_transaction_hash("ABC"));
        assert!(!is_transaction_hash(&"Z1".repeat(32)));
    }
}
