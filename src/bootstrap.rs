use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    api::handler::AppState,
    attestation::{
        AttestationLog, AttestationProvider, AttestationTrigger, DisabledAttestor, FdcAttestor,
    },
    config::Config,
    error::AppResult,
    flare::EvmSigner,
    funding::{LedgerMonitor, PaymentListener, STREAM_CAPACITY},
    quote_engine::{FtsoOracle, QuoteEngine},
    requests::{InMemoryRequestStore, RequestEngine, RequestStore},
    xrpl::{LedgerClient, XrplClient},
};

pub async fn initialize_app_state(config: Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // XRP Ledger client
    let ledger: Arc<dyn LedgerClient> = Arc::new(XrplClient::new(&config.xrpl));
    info!(
        "✅ XRPL client initialized for {} ({})",
        config.xrpl.network, config.xrpl.rpc_url
    );

    // Request store (process lifetime)
    let store: Arc<dyn RequestStore> = Arc::new(InMemoryRequestStore::new());

    // FTSO price oracle
    let oracle = Arc::new(FtsoOracle::new(
        &config.flare.rpc_url,
        &config.flare.ftso_address,
    ));
    let quote_engine = Arc::new(QuoteEngine::new(oracle, config.stable_symbol.clone()));
    info!(
        "✅ FTSO price oracle initialized on {} at {}",
        config.flare.network, config.flare.ftso_address
    );

    // FDC attestation, only with a Flare key
    let attestor = initialize_attestor(&config)?;
    let trigger = AttestationTrigger::new(attestor.clone(), store.clone());
    let attestations = Arc::new(AttestationLog::new(attestor));

    let engine = Arc::new(RequestEngine::new(store, ledger.clone(), trigger));

    // Ledger stream: monitor -> channel -> listener -> engine
    let (sender, receiver) = mpsc::channel(STREAM_CAPACITY);
    LedgerMonitor::new(
        ledger.clone(),
        Duration::from_millis(config.xrpl.poll_interval_ms),
    )
    .start(sender);
    PaymentListener::new(engine.clone()).start(receiver);
    info!("✅ Ledger stream started");

    Ok(AppState {
        engine,
        ledger,
        quote_engine,
        attestations,
        config: Arc::new(config),
    })
}

fn initialize_attestor(config: &Config) -> AppResult<Arc<dyn AttestationProvider>> {
    match &config.flare.private_key {
        Some(key) => {
            let signer = EvmSigner::from_hex(key).map_err(|e| {
                crate::error::AppError::Config(format!("FLARE_PRIVATE_KEY is invalid: {}", e))
            })?;
            info!(
                "✅ FDC attestation enabled, submitting from {}",
                signer.address_hex()
            );
            Ok(Arc::new(FdcAttestor::new(&config.flare, signer)))
        }
        None => {
            warn!("⚠️  FLARE_PRIVATE_KEY not set - FDC attestation disabled");
            Ok(Arc::new(DisabledAttestor))
        }
    }
}
