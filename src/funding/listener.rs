use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::requests::RequestEngine;
use crate::xrpl::LedgerTransaction;

/// Feeds streamed ledger transactions to the request engine
pub struct PaymentListener {
    engine: Arc<RequestEngine>,
}

impl PaymentListener {
    pub fn new(engine: Arc<RequestEngine>) -> Self {
        Self { engine }
    }

    /// Consume the stream until every sender is gone
    pub fn start(self, mut receiver: mpsc::Receiver<LedgerTransaction>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("🎧 Payment listener started");
            while let Some(tx) = receiver.recv().await {
                self.handle(&tx).await;
            }
            info!("Ledger stream closed, payment listener stopped");
        })
    }

    async fn handle(&self, tx: &LedgerTransaction) {
        match self.engine.on_ledger_transaction(tx).await {
            Ok(Some(request_id)) => {
                debug!("Ledger tx {} settled {}", tx.hash, request_id)
            }
            Ok(None) => {}
            Err(e) => error!("❌ Failed to process ledger tx {}: {}", tx.hash, e),
        }
    }
}
