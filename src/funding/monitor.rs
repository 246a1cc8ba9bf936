use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::LedgerError;
use crate::xrpl::{LedgerClient, LedgerTransaction};

pub const STREAM_CAPACITY: usize = 1024;

/// Polls the validated ledger and publishes its transactions in ledger order
pub struct LedgerMonitor {
    ledger: Arc<dyn LedgerClient>,
    poll_interval: Duration,
    /// Next ledger to fetch. `None` until the first successful poll.
    cursor: Option<u32>,
}

impl LedgerMonitor {
    pub fn new(ledger: Arc<dyn LedgerClient>, poll_interval: Duration) -> Self {
        Self {
            ledger,
            poll_interval,
            cursor: None,
        }
    }

    /// Start monitoring in the background until the receiver goes away
    pub fn start(mut self, sender: mpsc::Sender<LedgerTransaction>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "👀 Ledger monitor started (poll every {}ms)",
                self.poll_interval.as_millis()
            );
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = self.poll(&sender).await {
                    // Cursor is untouched for the failed ledger, so it is retried next tick
                    error!("❌ Ledger poll failed: {}", e);
                }
                if sender.is_closed() {
                    warn!("Ledger stream receiver dropped, stopping monitor");
                    break;
                }
            }
        })
    }

    /// Fetch every ledger from the cursor up to the validated ledger.
    /// Returns how many transactions were published.
    pub async fn poll(
        &mut self,
        sender: &mpsc::Sender<LedgerTransaction>,
    ) -> Result<usize, LedgerError> {
        let validated = self.ledger.validated_ledger_index().await?;
        let mut next = *self.cursor.get_or_insert(validated);
        let mut published = 0;

        while next <= validated {
            let transactions = self.ledger.ledger_transactions(next).await?;
            debug!("Ledger {} closed with {} transactions", next, transactions.len());

            for tx in transactions {
                if sender.send(tx).await.is_err() {
                    return Ok(published);
                }
                published += 1;
            }
            next += 1;
            self.cursor = Some(next);
        }

        Ok(published)
    }

    pub fn cursor(&self) -> Option<u32> {
        self.cursor
    }
}
