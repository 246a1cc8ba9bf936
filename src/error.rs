use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Attestation error: {0}")]
    Attestation(#[from] AttestationError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External error: {0}")]
    ExternalError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Payment request lifecycle errors
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Request {0} already exists")]
    DuplicateKey(String),

    #[error("Request {0} already processed")]
    AlreadyProcessed(String),
}

/// Errors surfaced by the XRP Ledger collaborator
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transaction submission failed ({code}): {message}")]
    SubmissionFailed { code: String, message: String },

    #[error("Settlement failed ({code}): {message}")]
    SettlementFailed { code: String, message: String },

    #[error("Timed out after {0}s waiting for ledger validation")]
    Timeout(u64),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Ledger RPC error: {0}")]
    Rpc(String),
}

/// Price quote errors
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Price feed unavailable: {0}")]
    PriceUnavailable(String),
}

/// Attestation errors. Never escalated past the trigger; only the manual
/// attestation endpoints surface them.
#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("Attestation failed: {0}")]
    Failed(String),

    #[error("Attestation submitter not configured")]
    NotConfigured,

    #[error("Verifier rejected request: {0}")]
    VerifierRejected(String),
}

/// Errors talking to the Flare EVM chain
#[derive(Error, Debug)]
pub enum FlareError {
    #[error("Flare RPC error: {0}")]
    Rpc(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Transaction {0} reverted")]
    Reverted(String),

    #[error("Timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),
}

impl From<FlareError> for AttestationError {
    fn from(error: FlareError) -> Self {
        AttestationError::Failed(error.to_string())
    }
}

impl From<FlareError> for QuoteError {
    fn from(error: FlareError) -> Self {
        QuoteError::PriceUnavailable(error.to_string())
    }
}

/// API error response structure
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            AppError::Request(RequestError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "REQUEST_NOT_FOUND", None)
            }
            AppError::Request(RequestError::DuplicateKey(_)) => {
                (StatusCode::CONFLICT, "DUPLICATE_REQUEST", None)
            }
            AppError::Request(RequestError::AlreadyProcessed(id)) => (
                StatusCode::CONFLICT,
                "ALREADY_PROCESSED",
                Some(serde_json::json!({ "requestId": id })),
            ),
            AppError::Ledger(LedgerError::SubmissionFailed { code, .. }) => (
                StatusCode::BAD_GATEWAY,
                "SUBMISSION_FAILED",
                Some(serde_json::json!({ "resultCode": code })),
            ),
            AppError::Ledger(LedgerError::SettlementFailed { code, .. }) => (
                StatusCode::BAD_GATEWAY,
                "SETTLEMENT_FAILED",
                Some(serde_json::json!({ "resultCode": code })),
            ),
            AppError::Ledger(LedgerError::Timeout(secs)) => (
                StatusCode::GATEWAY_TIMEOUT,
                "LEDGER_TIMEOUT",
                Some(serde_json::json!({ "timeoutSecs": secs })),
            ),
            AppError::Ledger(LedgerError::AccountNotFound(_))
            | AppError::Ledger(LedgerError::TransactionNotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", None)
            }
            AppError::Ledger(LedgerError::InvalidCredential(_))
            | AppError::Ledger(LedgerError::InvalidAddress(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", None)
            }
            AppError::Ledger(LedgerError::Rpc(_)) => {
                (StatusCode::BAD_GATEWAY, "LEDGER_RPC_ERROR", None)
            }
            AppError::Quote(QuoteError::UnsupportedAsset(symbol)) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_ASSET",
                Some(serde_json::json!({ "asset": symbol })),
            ),
            AppError::Quote(QuoteError::PriceUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, "PRICE_UNAVAILABLE", None)
            }
            AppError::Attestation(AttestationError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ATTESTATION_DISABLED", None)
            }
            AppError::Attestation(_) => (StatusCode::BAD_GATEWAY, "ATTESTATION_FAILED", None),
            AppError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            AppError::ExternalError(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_ERROR", None),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();

        // Internal details stay in the logs
        let message = match &self {
            AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                "An internal error occurred".to_string()
            }
            AppError::Request(inner) => inner.to_string(),
            AppError::Ledger(inner) => inner.to_string(),
            AppError::Quote(inner) => inner.to_string(),
            AppError::Attestation(inner) => inner.to_string(),
            AppError::ValidationFailed(msg)
            | AppError::NotFound(msg)
            | AppError::ExternalError(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            ok: false,
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::ValidationFailed(format!("Decimal conversion error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", error))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationFailed(crate::middleware::validation::describe(&errors))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (AppError::from(RequestError::NotFound("req_1".into())), StatusCode::NOT_FOUND),
            (
                AppError::from(RequestError::AlreadyProcessed("req_1".into())),
                StatusCode::CONFLICT,
            ),
            (AppError::from(LedgerError::Timeout(60)), StatusCode::GATEWAY_TIMEOUT),
            (
                AppError::from(QuoteError::UnsupportedAsset("DOGE".into())),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::ValidationFailed("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_settlement_failure_carries_result_code() {
        let error = AppError::from(LedgerError::SettlementFailed {
            code: "tecUNFUNDED_PAYMENT".into(),
            message: "insufficient XRP".into(),
        });
        let (status, code, details) = error.parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "SETTLEMENT_FAILED");
        assert_eq!(details.unwrap()["resultCode"], "tecUNFUNDED_PAYMENT");
    }
}
