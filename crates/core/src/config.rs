//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{CoreError, CoreResult, PriceSourceKind};

/// Static configuration entry for one price source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSource {
    pub kind: PriceSourceKind,
    pub enabled: bool,
    /// Lower runs and lists first
    pub priority: i32,
}

/// Aggregator configuration, copied and merged per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceAggregatorConfig {
    pub sources: HashMap<PriceSourceKind, PriceSource>,
    pub default_days: u32,
    pub default_currency: String,
}

impl Default for PriceAggregatorConfig {
    fn default() -> Self {
        let table = [
            (PriceSourceKind::CoinGecko, true, 1),
            (PriceSourceKind::Bybit, true, 2),
            (PriceSourceKind::Binance, true, 3),
            (PriceSourceKind::Bitget, true, 4),
            (PriceSourceKind::OkxDex, false, 5),  // needs signed credentials
        ];

        Self {
            sources: table
                .into_iter()
                .map(|(kind, enabled, priority)| (kind, PriceSource { kind, enabled, priority }))
                .collect(),
            default_days: 1,
            default_currency: "usd".to_string(),
        }
    }
}

/// Per-source override; unset fields keep the base value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOverride {
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
}

impl SourceOverride {
    pub fn enabled() -> Self {
        Self { enabled: Some(true), priority: None }
    }

    pub fn disabled() -> Self {
        Self { enabled: Some(false), priority: None }
    }
}

/// Per-call overrides for [`PriceAggregatorConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceAggregatorOverrides {
    pub sources: HashMap<PriceSourceKind, SourceOverride>,
    pub days: Option<u32>,
    pub currency: Option<String>,
}

impl PriceAggregatorOverrides {
    pub fn with_source(mut self, kind: PriceSourceKind, ov: SourceOverride) -> Self {
        self.sources.insert(kind, ov);
        self
    }

    /// Enable exactly the given sources, disabling every other one
    pub fn only(kinds: &[PriceSourceKind]) -> Self {
        let sources = PriceSourceKind::ALL
            .into_iter()
            .map(|kind| {
                let ov = if kinds.contains(&kind) {
                    SourceOverride::enabled()
                } else {
                    SourceOverride::disabled()
                };
                (kind, ov)
            })
            .collect();

        Self { sources, ..Default::default() }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = Some(days);
        self
    }
}

impl PriceAggregatorConfig {
    /// Return a merged copy; `self` is left untouched.
    pub fn merged(&self, overrides: Option<&PriceAggregatorOverrides>) -> Self {
        let mut merged = self.clone();
        let Some(ov) = overrides else {
            return merged;
        };

        for (kind, source_ov) in &ov.sources {
            let entry = merged.sources.entry(*kind).or_insert(PriceSource {
                kind: *kind,
                enabled: false,
                priority: i32::MAX,
            });
            if let Some(enabled) = source_ov.enabled {
                entry.enabled = enabled;
            }
            if let Some(priority) = source_ov.priority {
                entry.priority = priority;
            }
        }
        if let Some(days) = ov.days {
            merged.default_days = days;
        }
        if let Some(currency) = &ov.currency {
            merged.default_currency = currency.clone();
        }
        merged
    }

    /// Enabled sources, priority ascending (ties broken by name)
    pub fn enabled_sources(&self) -> Vec<PriceSource> {
        let mut enabled: Vec<PriceSource> =
            self.sources.values().filter(|s| s.enabled).copied().collect();
        enabled.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.kind.name().cmp(b.kind.name()))
        });
        enabled
    }
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_retries: 3,
            retry_delay_ms: 1_000,
            user_agent: concat!("dexai/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub coin_info_ttl_secs: u64,
    /// Where the `/coins/list` snapshot is kept between runs
    pub coin_list_cache_path: Option<String>,
    pub coin_list_ttl_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            coin_info_ttl_secs: 300,
            coin_list_cache_path: None,
            coin_list_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoralisConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for MoralisConfig {
    fn default() -> Self {
        Self {
            base_url: "https://deep-index.moralis.io/api/v2.2".to_string(),
            api_key: None,
        }
    }
}

/// Base URLs of the perpetual-futures venues
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub bybit_url: String,
    pub binance_url: String,
    pub bitget_url: String,
    pub bybit_ws_url: String,
    pub binance_ws_url: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            bybit_url: "https://api.bybit.com".to_string(),
            binance_url: "https://fapi.binance.com".to_string(),
            bitget_url: "https://api.bitget.com".to_string(),
            bybit_ws_url: "wss://stream.bybit.com/v5/public/linear".to_string(),
            binance_ws_url: "wss://fstream.binance.com/ws".to_string(),
        }
    }
}

/// One OKX DEX API key set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkxCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
    pub project_id: String,
}

/// OKX settings; key material arrives as comma-separated parallel lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OkxConfig {
    pub base_url: String,
    pub api_keys: Option<String>,
    pub secret_keys: Option<String>,
    pub passphrases: Option<String>,
    pub project_ids: Option<String>,
    pub requests_per_window: u32,
    pub window_ms: u64,
    pub max_rate_limit_retries: u32,
    pub rate_limit_delay_ms: u64,
    pub page_delay_ms: u64,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://web3.okx.com".to_string(),
            api_keys: None,
            secret_keys: None,
            passphrases: None,
            project_ids: None,
            requests_per_window: 1,
            window_ms: 1_000,
            max_rate_limit_retries: 2,
            rate_limit_delay_ms: 1_000,
            page_delay_ms: 100,
        }
    }
}

fn split_list(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl OkxConfig {
    /// Zip the parallel key lists into credential sets
    pub fn credentials(&self) -> CoreResult<Vec<OkxCredentials>> {
        let keys = split_list(&self.api_keys);
        let secrets = split_list(&self.secret_keys);
        let passphrases = split_list(&self.passphrases);
        let projects = split_list(&self.project_ids);

        if secrets.len() != keys.len() || passphrases.len() != keys.len() {
            return Err(CoreError::InvalidConfig(format!(
                "OKX key lists differ in length: {} keys, {} secrets, {} passphrases",
                keys.len(),
                secrets.len(),
                passphrases.len()
            )));
        }

        Ok(keys
            .into_iter()
            .zip(secrets)
            .zip(passphrases)
            .enumerate()
            .map(|(i, ((api_key, secret_key), passphrase))| OkxCredentials {
                api_key,
                secret_key,
                passphrase,
                // a single project id may be shared by all keys
                project_id: projects
                    .get(i)
                    .or_else(|| projects.first())
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherscanConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.etherscan.io/v2/api".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerZeroConfig {
    pub metadata_url: String,
}

impl Default for LayerZeroConfig {
    fn default() -> Self {
        Self {
            metadata_url: "https://metadata.layerzero-api.com/v1/metadata".to_string(),
        }
    }
}

/// JSON-RPC endpoints keyed by chain name (`ethereum`, `bsc`, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcConfig(pub HashMap<String, String>);

impl RpcConfig {
    pub fn url(&self, chain: &str) -> Option<&str> {
        self.0.get(&chain.to_lowercase()).map(String::as_str)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub coingecko: CoinGeckoConfig,
    pub moralis: MoralisConfig,
    pub exchanges: ExchangeConfig,
    pub okx: OkxConfig,
    pub etherscan: EtherscanConfig,
    pub layerzero: LayerZeroConfig,
    pub rpc: RpcConfig,
    pub aggregator: PriceAggregatorConfig,
}

impl AppConfig {
    pub const ENV_PREFIX: &'static str = "DEXAI";

    /// Load `.env` (if present) and `DEXAI_*` environment variables
    ///
    /// Nesting uses `__`, e.g. `DEXAI_COINGECKO__API_KEY`.
    pub fn from_env() -> CoreResult<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.http.timeout_secs == 0 {
            return Err(CoreError::InvalidConfig("http.timeout_secs must be > 0".into()));
        }
        if self.aggregator.default_days == 0 {
            return Err(CoreError::InvalidConfig("aggregator.default_days must be > 0".into()));
        }
        self.okx.credentials().map(|_| ())
    }
}
