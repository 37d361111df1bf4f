//! CoinGecko response shapes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::http::de;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub coins: Vec<SearchCoin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinImage {
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// `/coins/{id}` with market, ticker and community sections disabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinInfo {
    pub id: String,
    pub symbol: String,
    pub name: String,
    /// Platform id -> contract address; native coins carry an empty key
    #[serde(default)]
    pub platforms: HashMap<String, Option<String>>,
    #[serde(default)]
    pub image: CoinImage,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

impl CoinInfo {
    /// Contract on `platform`, ignoring blank entries
    pub fn contract_on(&self, platform: &str) -> Option<&str> {
        self.platforms
            .get(platform)
            .and_then(|addr| addr.as_deref())
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickersResponse {
    #[serde(default)]
    pub tickers: Vec<CoinTicker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMarket {
    pub name: String,
    #[serde(default)]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinTicker {
    pub base: String,
    pub target: String,
    pub market: TickerMarket,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub last: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub volume: Option<f64>,
    #[serde(default)]
    pub converted_last: HashMap<String, f64>,
    #[serde(default)]
    pub trust_score: Option<String>,
    #[serde(default)]
    pub trade_url: Option<String>,
}

/// `/coins/{platform}/contract/{address}/market_chart`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketChart {
    /// `[epoch_ms, price]`
    #[serde(default)]
    pub prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, Option<f64>)>,
}

/// One entry of `/coins/list?include_platform=true`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinListEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub platforms: HashMap<String, Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnchainPoolsResponse {
    #[serde(default)]
    pub data: Vec<OnchainPoolResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnchainPoolResource {
    pub id: String,
    pub attributes: OnchainPoolAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeUsd {
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnchainPoolAttributes {
    pub name: String,
    pub address: String,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub base_token_price_usd: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub reserve_in_usd: Option<f64>,
    #[serde(default)]
    pub volume_usd: VolumeUsd,
}

/// Flattened on-chain pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainPool {
    pub id: String,
    pub name: String,
    pub address: String,
    pub base_token_price_usd: Option<f64>,
    pub reserve_usd: Option<f64>,
    pub volume_usd_24h: Option<f64>,
}

impl From<OnchainPoolResource> for OnchainPool {
    fn from(resource: OnchainPoolResource) -> Self {
        let attrs = resource.attributes;
        Self {
            id: resource.id,
            name: attrs.name,
            address: attrs.address,
            base_token_price_usd: attrs.base_token_price_usd,
            reserve_usd: attrs.reserve_in_usd,
            volume_usd_24h: attrs.volume_usd.h24,
        }
    }
}
