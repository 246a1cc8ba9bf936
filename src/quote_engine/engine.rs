use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, QuoteError};
use crate::quote_engine::ftso_oracle::{FtsoFeedIds, PriceOracle, PricePoint};

/// Cross-asset conversion through USD
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub from_usd: Decimal,
    pub to_usd: Decimal,
    pub usd: Decimal,
    pub equivalent: Decimal,
}

/// Price quote engine backed by the FTSO oracle. Prices are read fresh on every call.
pub struct QuoteEngine {
    oracle: Arc<dyn PriceOracle>,
    feed_ids: FtsoFeedIds,
    stable_symbol: String,
}

impl QuoteEngine {
    pub fn new(oracle: Arc<dyn PriceOracle>, stable_symbol: impl Into<String>) -> Self {
        Self {
            oracle,
            feed_ids: FtsoFeedIds::new(),
            stable_symbol: stable_symbol.into(),
        }
    }

    fn stable_price() -> PricePoint {
        PricePoint {
            price: Decimal::ONE,
            timestamp: Utc::now(),
        }
    }

    /// USD price of `symbol`. The stable symbol is pegged at 1.0 and never
    /// reaches the oracle, so an oracle outage cannot fail it.
    pub async fn price_usd(&self, symbol: &str) -> Result<PricePoint, QuoteError> {
        if symbol == self.stable_symbol {
            return Ok(Self::stable_price());
        }

        let feed_id = self
            .feed_ids
            .get_feed_id(symbol)
            .ok_or_else(|| QuoteError::UnsupportedAsset(symbol.to_string()))?;

        self.oracle.read_feed(feed_id).await.map_err(|e| {
            warn!("⚠️ Price feed for {} unavailable: {}", symbol, e);
            e
        })
    }

    /// Convert `amount` of `from` into `to` through their USD prices
    pub async fn quote(&self, from: &str, to: &str, amount: &str) -> AppResult<PriceQuote> {
        let amount = Decimal::from_str(amount.trim())
            .map_err(|_| AppError::ValidationFailed(format!("Invalid amount: {}", amount)))?;
        if amount.is_sign_negative() {
            return Err(AppError::ValidationFailed(
                "Amount must not be negative".to_string(),
            ));
        }

        let from_usd = self.price_usd(from).await?.price;
        let to_usd = self.price_usd(to).await?.price;
        if to_usd.is_zero() {
            return Err(QuoteError::PriceUnavailable(format!("{} price is zero", to)).into());
        }

        let usd = amount
            .checked_mul(from_usd)
            .ok_or_else(|| AppError::ValidationFailed("Amount too large".to_string()))?;
        let equivalent = usd
            .checked_div(to_usd)
            .ok_or_else(|| QuoteError::PriceUnavailable(format!("{} price too small", to)))?;

        info!("💱 Quote: {} {} = {} {} ({} USD)", amount, from, equivalent, to, usd);

        Ok(PriceQuote {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            from_usd,
            to_usd,
            usd,
            equivalent,
        })
    }
}
