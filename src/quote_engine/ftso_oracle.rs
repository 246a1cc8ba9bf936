use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::error::{FlareError, QuoteError};
use crate::flare::abi::{decode_hex, decode_uint, encode_fixed_bytes_call};
use crate::flare::FlareRpc;

const WEI_PER_UNIT: Decimal = dec!(1_000_000_000_000_000_000);

/// FTSOv2 feed identifiers (category 1, crypto/USD), bytes21
pub struct FtsoFeedIds {
    feeds: HashMap<String, String>,
}

impl FtsoFeedIds {
    pub fn new() -> Self {
        let mut feeds = HashMap::new();
        feeds.insert(
            "ETH".to_string(),
            "0x014554482f55534400000000000000000000000000".to_string(),
        );
        feeds.insert(
            "XRP".to_string(),
            "0x015852502f55534400000000000000000000000000".to_string(),
        );
        feeds.insert(
            "BTC".to_string(),
            "0x014254432f55534400000000000000000000000000".to_string(),
        );
        feeds.insert(
            "USDT".to_string(),
            "0x015553445420202020202020202020202020202020".to_string(),
        );
        feeds.insert(
            "FLR".to_string(),
            "0x01464c522f55534400000000000000000000000000".to_string(),
        );
        Self { feeds }
    }

    pub fn get_feed_id(&self, symbol: &str) -> Option<&str> {
        self.feeds.get(symbol).map(String::as_str)
    }
}

impl Default for FtsoFeedIds {
    fn default() -> Self {
        Self::new()
    }
}

/// USD price with the oracle's publication time
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Source of USD prices keyed by feed id
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn read_feed(&self, feed_id: &str) -> Result<PricePoint, QuoteError>;
}

/// Reads `getFeedByIdInWei` on the FTSOv2 contract
pub struct FtsoOracle {
    rpc: FlareRpc,
    contract: String,
}

impl FtsoOracle {
    pub fn new(rpc_url: &str, contract: &str) -> Self {
        Self {
            rpc: FlareRpc::new(rpc_url),
            contract: contract.to_string(),
        }
    }
}

#[async_trait]
impl PriceOracle for FtsoOracle {
    async fn read_feed(&self, feed_id: &str) -> Result<PricePoint, QuoteError> {
        let feed = decode_hex(feed_id)?;
        let call = encode_fixed_bytes_call("getFeedByIdInWei(bytes21)", &feed);
        let output = self.rpc.eth_call(&self.contract, &call).await?;

        let value_wei = decode_uint(&output, 0)?;
        let published = decode_uint(&output, 1)?;
        let price = wei_to_price(value_wei)?;
        let timestamp = i64::try_from(published)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| QuoteError::PriceUnavailable(format!("bad feed timestamp {}", published)))?;

        info!("✓ FTSO feed {} = {} USD", feed_id, price);
        Ok(PricePoint { price, timestamp })
    }
}

fn wei_to_price(value_wei: u128) -> Result<Decimal, FlareError> {
    let value = i128::try_from(value_wei)
        .ok()
        .and_then(|wei| Decimal::try_from_i128_with_scale(wei, 0).ok())
        .ok_or_else(|| FlareError::Abi(format!("feed value {} overflows", value_wei)))?;
    value
        .checked_div(WEI_PER_UNIT)
        .map(|price| price.normalize())
        .ok_or_else(|| FlareError::Abi(format!("cannot scale feed value {}", value_wei)))
}
