use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::error::ErrorResponse;

/// Process-wide request budget
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RateLimitLayer {
    /// A zero budget is treated as one request per minute
    pub fn per_minute(requests: u32) -> Self {
        let requests = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(requests))),
        }
    }

    pub fn check(&self) -> Result<(), Response> {
        self.limiter.check().map_err(|_| {
            warn!("🚦 Rate limit exceeded");
            let body = Json(ErrorResponse {
                ok: false,
                error: "Rate limit exceeded. Please try again later.".to_string(),
                error_code: "RATE_LIMITED".to_string(),
                details: None,
            });
            (StatusCode::TOO_MANY_REQUESTS, body).into_response()
        })
    }
}

pub async fn rate_limit_middleware(
    State(limit): State<RateLimitLayer>,
    req: Request,
    next: Next,
) -> Response {
    match limit.check() {
        Ok(()) => next.run(req).await,
        Err(rejection) => rejection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_enforced() {
        let limit = RateLimitLayer::per_minute(2);
        assert!(limit.check().is_ok());
        assert!(limit.check().is_ok());

        let rejected = limit.check().unwrap_err();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_zero_budget_still_admits_one() {
        let limit = RateLimitLayer::per_minute(0);
        assert!(limit.check().is_ok());
        assert!(limit.check().is_err());
    }
}
