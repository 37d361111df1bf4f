//! Token search and details, combining CoinGecko metadata with Moralis on-chain data

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use dexai_core::{
    is_native_token, resolve_platform, wrapped_native, AppConfig, Chain, FetchError, FetchResult,
};
use dexai_sources::coingecko::types::{CoinTicker, SearchCoin};
use dexai_sources::moralis::{TokenHolder, TokenPair};
use dexai_sources::{CoinGeckoClient, HttpClient, MoralisClient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSearchResult {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    pub thumb: Option<String>,
}

impl From<SearchCoin> for TokenSearchResult {
    fn from(coin: SearchCoin) -> Self {
        Self {
            id: coin.id,
            name: coin.name,
            symbol: coin.symbol.to_uppercase(),
            market_cap_rank: coin.market_cap_rank,
            thumb: coin.thumb.or(coin.large),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDetailsOptions {
    pub include_holders: bool,
    pub include_pools: bool,
    pub pool_limit: usize,
    pub holders_limit: usize,
}

impl Default for TokenDetailsOptions {
    fn default() -> Self {
        Self {
            include_holders: true,
            include_pools: true,
            pool_limit: 10,
            holders_limit: 10,
        }
    }
}

/// Everything known about one token on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAggregateInfo {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    /// CoinGecko platform id the address was resolved on
    pub platform: String,
    pub address: Option<String>,
    /// The coin is a chain's native asset; `address` is its wrapped stand-in
    pub is_native_token: bool,
    pub price: Option<f64>,
    pub currency: String,
    /// Platform id -> contract address, blank entries removed
    pub platforms: HashMap<String, String>,
    pub tickers: Vec<CoinTicker>,
    pub pools: Vec<TokenPair>,
    pub top_holders: Option<Vec<TokenHolder>>,
}

pub struct TokenAggregator {
    coingecko: CoinGeckoClient,
    moralis: Option<MoralisClient>,
    currency: String,
}

impl TokenAggregator {
    pub fn new(coingecko: CoinGeckoClient, moralis: Option<MoralisClient>) -> Self {
        Self {
            coingecko,
            moralis,
            currency: "usd".to_string(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_lowercase();
        self
    }

    /// Moralis is optional; without a key pools and holders are skipped
    pub fn from_app_config(app: &AppConfig) -> FetchResult<Self> {
        let http = HttpClient::new(&app.http)?;
        let coingecko = CoinGeckoClient::new(http.clone(), &app.coingecko);
        let moralis = match MoralisClient::new(http, &app.moralis) {
            Ok(client) => Some(client),
            Err(FetchError::MissingCredentials(_)) => {
                debug!("No Moralis API key, token pools and holders disabled");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self::new(coingecko, moralis).with_currency(&app.aggregator.default_currency))
    }

    /// CoinGecko search, at most `limit` results; empty on any failure
    pub async fn search_tokens(&self, query: &str, limit: usize) -> Vec<TokenSearchResult> {
        match self.coingecko.search(query).await {
            Ok(coins) => coins
                .into_iter()
                .take(limit)
                .map(TokenSearchResult::from)
                .collect(),
            Err(e) => {
                warn!("Token search for {:?} failed: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Details for a CoinGecko coin id on `chain`; `None` when the coin is unknown
    pub async fn get_token_details(
        &self,
        token_id: &str,
        chain: &str,
        options: &TokenDetailsOptions,
    ) -> Option<TokenAggregateInfo> {
        let info = match self.coingecko.coin_info(token_id).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                info!("Unknown token id {}", token_id);
                return None;
            }
            Err(e) => {
                warn!("Coin info for {} failed: {}", token_id, e);
                return None;
            }
        };

        let (price, tickers) = tokio::join!(
            self.coingecko.get_price(&info.id, &self.currency),
            self.coingecko.tickers(&info.id),
        );
        let price = price
            .map_err(|e| warn!("Price for {} failed: {}", info.id, e))
            .ok()
            .flatten();
        let tickers = tickers
            .map_err(|e| warn!("Tickers for {} failed: {}", info.id, e))
            .unwrap_or_default();

        let platform = resolve_platform(chain);
        let known_chain = Chain::from_alias(chain);
        let is_native = is_native_token(&info.id);

        let address = info.contract_on(&platform).map(str::to_string).or_else(|| {
            if !is_native {
                return None;
            }
            let wrapped = known_chain.and_then(|c| wrapped_native(&info.id, c))?;
            debug!("{} is native, using {} on {}", info.id, wrapped.symbol, platform);
            Some(wrapped.address.to_string())
        });

        let (pools, top_holders) = match (&address, &self.moralis, known_chain) {
            (Some(address), Some(moralis), Some(chain)) => {
                let moralis_chain = chain.moralis_chain();
                let pools = async {
                    if !options.include_pools {
                        return Vec::new();
                    }
                    moralis
                        .token_pairs(address, &moralis_chain, options.pool_limit)
                        .await
                        .map_err(|e| warn!("Pools for {} failed: {}", address, e))
                        .unwrap_or_default()
                };
                let holders = async {
                    if !options.include_holders {
                        return None;
                    }
                    moralis
                        .token_holders(address, &moralis_chain, options.holders_limit)
                        .await
                        .map_err(|e| warn!("Holders for {} failed: {}", address, e))
                        .ok()
                };
                tokio::join!(pools, holders)
            }
            _ => (Vec::new(), None),
        };

        let platforms = info
            .platforms
            .iter()
            .filter_map(|(platform, addr)| {
                let addr = addr.as_deref()?.trim();
                (!platform.is_empty() && !addr.is_empty()).then(|| (platform.clone(), addr.to_string()))
            })
            .collect();

        Some(TokenAggregateInfo {
            image: info.image.large.clone().or_else(|| info.image.small.clone()),
            id: info.id,
            symbol: info.symbol.to_uppercase(),
            name: info.name,
            platform,
            address,
            is_native_token: is_native,
            price,
            currency: self.currency.clone(),
            platforms,
            tickers,
            pools,
            top_holders,
        })
    }
}
