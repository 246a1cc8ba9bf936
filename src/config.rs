use std::str::FromStr;

use config::ConfigError;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub xrpl: XrplConfig,
    pub flare: FlareConfig,
    pub stable_symbol: String,
    pub cors_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct XrplConfig {
    pub rpc_url: String,
    pub network: String,
    pub explorer_url: String,
    pub faucet_url: String,
    pub poll_interval_ms: u64,
    pub submission_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlareConfig {
    pub rpc_url: String,
    pub network: String,
    pub ftso_address: String,
    pub verifier_url: String,
    pub verifier_api_key: Option<String>,
    pub source_id: String,
    pub hub_address: Option<String>,
    pub fee_wei: u128,
    pub private_key: Option<String>,
}

impl Default for XrplConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://s.altnet.rippletest.net:51234".to_string(),
            network: "testnet".to_string(),
            explorer_url: "https://testnet.xrpl.org".to_string(),
            faucet_url: "https://faucet.altnet.rippletest.net".to_string(),
            poll_interval_ms: 2_000,
            submission_timeout_secs: 60,
        }
    }
}

impl Default for FlareConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://coston2-api.flare.network/ext/C/rpc".to_string(),
            network: "coston2".to_string(),
            ftso_address: "0x3d893C53D9e8056135C26C8c638B76C8b60Df726".to_string(),
            verifier_url: "https://fdc-verifiers-testnet.flare.network".to_string(),
            verifier_api_key: None,
            source_id: "testXRP".to_string(),
            hub_address: None,
            fee_wei: 10_000_000_000_000_000, // 0.01 C2FLR
            private_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            xrpl: XrplConfig::default(),
            flare: FlareConfig::default(),
            stable_symbol: "USDT".to_string(),
            cors_origins: Vec::new(),
            rate_limit_per_minute: 120,
            static_dir: None,
        }
    }
}

impl XrplConfig {
    pub fn explorer_tx_url(&self, hash: &str) -> String {
        format!("{}/transactions/{}", self.explorer_url.trim_end_matches('/'), hash)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let xrpl_defaults = defaults.xrpl;
        let flare_defaults = defaults.flare;

        Ok(Self {
            bind_address: env_or("BIND_ADDRESS", &defaults.bind_address),
            xrpl: XrplConfig {
                rpc_url: env_or("XRPL_RPC_URL", &xrpl_defaults.rpc_url),
                network: env_or("XRPL_NETWORK", &xrpl_defaults.network),
                explorer_url: env_or("XRPL_EXPLORER_URL", &xrpl_defaults.explorer_url),
                faucet_url: env_or("XRPL_FAUCET_URL", &xrpl_defaults.faucet_url),
                poll_interval_ms: env_parse("LEDGER_POLL_INTERVAL_MS", xrpl_defaults.poll_interval_ms)?,
                submission_timeout_secs: env_parse(
                    "SUBMISSION_TIMEOUT_SECS",
                    xrpl_defaults.submission_timeout_secs,
                )?,
            },
            flare: FlareConfig {
                rpc_url: env_or("FLARE_RPC", &flare_defaults.rpc_url),
                network: env_or("FLARE_NETWORK", &flare_defaults.network),
                ftso_address: env_or("FTSOV2_ADDRESS", &flare_defaults.ftso_address),
                verifier_url: env_or("FDC_VERIFIER", &flare_defaults.verifier_url),
                verifier_api_key: env_opt("FDC_API_KEY"),
                source_id: env_or("FDC_SOURCE_ID", &flare_defaults.source_id),
                hub_address: env_opt("FDC_HUB_ADDRESS"),
                fee_wei: env_parse("FDC_FEE_WEI", flare_defaults.fee_wei)?,
                private_key: env_opt("FLARE_PRIVATE_KEY"),
            },
            stable_symbol: env_or("STABLE_SYMBOL", &defaults.stable_symbol),
            cors_origins: env_opt("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute)?,
            static_dir: env_opt("STATIC_DIR"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::Message(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explorer_url_trims_trailing_slash() {
        let config = XrplConfig {
            explorer_url: "https://testnet.xrpl.org/".to_string(),
            ..XrplConfig::default()
        };
        assert_eq!(
            config.explorer_tx_url("ABC"),
            "https://testnet.xrpl.org/transactions/ABC"
        );
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("VENMO_TEST_POLL_INTERVAL", "soon");
        let parsed: Result<u64, _> = env_parse("VENMO_TEST_POLL_INTERVAL", 5);
        assert!(parsed.is_err());
        std::env::remove_var("VENMO_TEST_POLL_INTERVAL");

        let parsed: u64 = env_parse("VENMO_TEST_POLL_INTERVAL", 5).unwrap();
        assert_eq!(parsed, 5);
    }
}
