use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    api::handler::{
        attestation_status, create_request, debug_requests, fund_account, get_account,
        get_request, get_transaction, health_check, list_requests, price_quote, process_payment,
        start_attestation, AppState,
    },
    middleware::{create_cors_layer, rate_limit_middleware, RateLimitLayer},
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let rate_limit = RateLimitLayer::per_minute(state.config.rate_limit_per_minute);

    let api = Router::new()
        // Payment requests
        .route("/request", post(create_request))
        .route("/request/:request_id", get(get_request))
        .route("/requests/:address", get(list_requests))
        .route("/payment/process", post(process_payment))
        // Prices
        .route("/price/quote", get(price_quote))
        // Ledger passthrough
        .route("/transaction/:tx_hash", get(get_transaction))
        .route("/account/:address", get(get_account))
        .route("/fund-account", post(fund_account))
        // Attestation
        .route("/attest", post(start_attestation))
        .route("/attest/:tx_hash", get(attestation_status))
        .route("/debug/requests", get(debug_requests))
        .route_layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api);

    if let Some(dir) = &state.config.static_dir {
        info!("📁 Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    let app = app
        .layer(create_cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
