use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// CORS for the configured origins, or any origin when none are configured
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::ACCEPT,
        header::ORIGIN,
    ];

    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(std::time::Duration::from_secs(60 * 60)); // 1 hour

    if allowed_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed_origins)
    }
}
