//! CoinGecko REST client
//!
//! Covers simple prices, search, coin metadata, exchange tickers, contract
//! market charts, GeckoTerminal on-chain pools and the full coin list.
//! Coin metadata is cached in memory; the coin list is cached on disk.

pub mod coin_list;
pub mod types;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use dexai_core::{
    CoinGeckoConfig, FetchError, FetchResult, MemoryTtlCache, PriceDataPoint, PriceQuery,
    PriceSourceAdapter, PriceSourceKind, SourcePrice, TtlCache,
};

use crate::http::HttpClient;
use coin_list::CoinListFile;
pub use coin_list::{find_by_contract, find_by_symbol};
pub use types::*;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";
const COIN_LIST_KEY: &str = "coins";

pub struct CoinGeckoClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    coin_info: MemoryTtlCache<String, CoinInfo>,
    coin_list: MemoryTtlCache<&'static str, Arc<Vec<CoinListEntry>>>,
    coin_list_file: Option<CoinListFile>,
}

impl CoinGeckoClient {
    pub fn new(http: HttpClient, config: &CoinGeckoConfig) -> Self {
        let coin_list_ttl = Duration::from_secs(config.coin_list_ttl_secs);
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            coin_info: MemoryTtlCache::new(Duration::from_secs(config.coin_info_ttl_secs)),
            coin_list: MemoryTtlCache::new(coin_list_ttl),
            coin_list_file: config
                .coin_list_cache_path
                .as_ref()
                .map(|path| CoinListFile::new(path, coin_list_ttl)),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|key| (API_KEY_HEADER, key.clone()))
            .collect()
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        label: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<T> {
        let url = format!("{}{}", self.base_url, path);
        self.http.get_json(label, &url, query, &self.headers()).await
    }

    /// `/simple/price` for one coin in one currency
    pub async fn get_price(&self, coin_id: &str, currency: &str) -> FetchResult<Option<f64>> {
        let currency = currency.to_lowercase();
        let query = [("ids", coin_id.to_string()), ("vs_currencies", currency.clone())];
        let prices: HashMap<String, HashMap<String, f64>> =
            self.get("coingecko price", "/simple/price", &query).await?;

        Ok(prices
            .get(coin_id)
            .and_then(|by_currency| by_currency.get(&currency))
            .copied())
    }

    pub async fn search(&self, query: &str) -> FetchResult<Vec<SearchCoin>> {
        let response: SearchResponse = self
            .get("coingecko search", "/search", &[("query", query.to_string())])
            .await?;
        Ok(response.coins)
    }

    /// `/coins/{id}` metadata; `Ok(None)` for unknown ids
    pub async fn coin_info(&self, coin_id: &str) -> FetchResult<Option<CoinInfo>> {
        let key = coin_id.to_lowercase();
        if let Some(info) = self.coin_info.get(&key) {
            debug!("coingecko coin info cache hit: {}", key);
            return Ok(Some(info));
        }

        let query = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("market_data", "false".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];
        let path = format!("/coins/{key}");
        match self.get::<CoinInfo>("coingecko coin", &path, &query).await {
            Ok(info) => {
                self.coin_info.insert(key, info.clone());
                Ok(Some(info))
            }
            Err(FetchError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn tickers(&self, coin_id: &str) -> FetchResult<Vec<CoinTicker>> {
        let path = format!("/coins/{}/tickers", coin_id.to_lowercase());
        let response: TickersResponse = self.get("coingecko tickers", &path, &[]).await?;
        Ok(response.tickers)
    }

    pub async fn market_chart_by_contract(
        &self,
        platform: &str,
        address: &str,
        days: u32,
        currency: &str,
    ) -> FetchResult<MarketChart> {
        let path = format!(
            "/coins/{}/contract/{}/market_chart",
            platform,
            address.to_lowercase()
        );
        let query = [
            ("vs_currency", currency.to_lowercase()),
            ("days", days.max(1).to_string()),
        ];
        self.get("coingecko market chart", &path, &query).await
    }

    /// Contract price history plus current price
    ///
    /// `Ok(None)` when CoinGecko does not list the contract or has no prices.
    pub async fn get_token_full_price_data(
        &self,
        platform: &str,
        address: &str,
        days: u32,
        currency: &str,
    ) -> FetchResult<Option<SourcePrice>> {
        let chart = match self
            .market_chart_by_contract(platform, address, days, currency)
            .await
        {
            Ok(chart) => chart,
            Err(FetchError::NotFound(_)) => {
                warn!("coingecko has no contract {} on {}", address, platform);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut history: Vec<PriceDataPoint> = chart
            .prices
            .into_iter()
            .filter_map(|(ts, price)| {
                price.map(|p| PriceDataPoint::new(ts as i64, p, PriceSourceKind::CoinGecko.name()))
            })
            .collect();
        history.sort_by_key(|point| point.timestamp);

        if history.is_empty() {
            return Ok(None);
        }
        Ok(Some(SourcePrice::from_history(history)))
    }

    /// GeckoTerminal pools on a network, one page
    pub async fn onchain_pools(&self, network: &str, page: u32) -> FetchResult<Vec<OnchainPool>> {
        let path = format!("/onchain/networks/{network}/pools");
        let response: OnchainPoolsResponse = self
            .get("coingecko onchain pools", &path, &[("page", page.max(1).to_string())])
            .await?;
        Ok(response.data.into_iter().map(OnchainPool::from).collect())
    }

    /// Every listed coin with its platform contracts
    ///
    /// Served from memory, then the snapshot file, then the API.
    pub async fn coin_list(&self) -> FetchResult<Arc<Vec<CoinListEntry>>> {
        if let Some(coins) = self.coin_list.get(&COIN_LIST_KEY) {
            return Ok(coins);
        }

        if let Some(file) = &self.coin_list_file {
            if let Some(coins) = file.load().await {
                debug!("coin list loaded from {}", file.path().display());
                self.coin_list.insert(COIN_LIST_KEY, Arc::clone(&coins));
                return Ok(coins);
            }
        }

        let coins: Vec<CoinListEntry> = self
            .get(
                "coingecko coin list",
                "/coins/list",
                &[("include_platform", "true".to_string())],
            )
            .await?;
        info!("fetched {} coins from coingecko", coins.len());

        if let Some(file) = &self.coin_list_file {
            if let Err(e) = file.store(&coins).await {
                warn!("could not write coin list cache {}: {}", file.path().display(), e);
            }
        }

        let coins = Arc::new(coins);
        self.coin_list.insert(COIN_LIST_KEY, Arc::clone(&coins));
        Ok(coins)
    }
}

#[async_trait]
impl PriceSourceAdapter for CoinGeckoClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::CoinGecko
    }

    async fn fetch(&self, query: &PriceQuery) -> FetchResult<Option<SourcePrice>> {
        self.get_token_full_price_data(
            &query.platform,
            &query.token_address,
            query.days,
            &query.currency,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexai_core::{HttpConfig, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, api_key: Option<&str>) -> CoinGeckoClient {
        let http = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        let config = CoinGeckoConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        };
        CoinGeckoClient::new(http, &config)
    }

    #[tokio::test]
    async fn test_price_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "chainlink"))
            .and(header(API_KEY_HEADER, "demo-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chainlink": {"usd": 14.52}
            })))
            .mount(&server)
            .await;

        let price = client(&server, Some("demo-key"))
            .get_price("chainlink", "USD")
            .await
            .unwrap();
        assert_eq!(price, Some(14.52));
    }

    #[tokio::test]
    async fn test_full_price_data_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/ethereum/contract/0xabc/market_chart"))
            .and(query_param("vs_currency", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [[1700000300000i64, 2.0], [1700000000000i64, 1.0], [1700000600000i64, null]],
                "market_caps": [],
                "total_volumes": []
            })))
            .mount(&server)
            .await;

        let price = client(&server, None)
            .get_token_full_price_data("ethereum", "0xABC", 1, "usd")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(price.historical_data.len(), 2);
        assert_eq!(price.historical_data[0].timestamp, 1_700_000_000_000);
        assert_eq!(price.current_price, 2.0);
    }

    #[tokio::test]
    async fn test_unknown_contract_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/ethereum/contract/0xdead/market_chart"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "coin not found"})))
            .mount(&server)
            .await;

        let result = client(&server, None)
            .get_token_full_price_data("ethereum", "0xdead", 1, "usd")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_coin_info_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/chainlink"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chainlink",
                "symbol": "link",
                "name": "Chainlink",
                "platforms": {
                    "ethereum": "0x514910771af9ca656af840dff83e8264ecf986ca",
                    "binance-smart-chain": ""
                },
                "image": {"thumb": "t", "small": "s", "large": "l"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cg = client(&server, None);
        let info = cg.coin_info("chainlink").await.unwrap().unwrap();
        assert_eq!(
            info.contract_on("ethereum"),
            Some("0x514910771af9ca656af840dff83e8264ecf986ca")
        );
        assert_eq!(info.contract_on("binance-smart-chain"), None);

        let again = cg.coin_info("Chainlink").await.unwrap().unwrap();
        assert_eq!(again.name, "Chainlink");
    }

    #[tokio::test]
    async fn test_coin_list_from_snapshot_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/list"))
            .and(query_param("include_platform", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "chainlink", "symbol": "link", "name": "Chainlink",
                 "platforms": {"ethereum": "0x514910771af9ca656af840dff83e8264ecf986ca"}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let path = std::env::temp_dir()
            .join(format!("dexai-cg-list-{}", std::process::id()))
            .join("coins.json");
        let http = HttpClient::new(&HttpConfig::default()).unwrap();
        let config = CoinGeckoConfig {
            base_url: server.uri(),
            coin_list_cache_path: Some(path.display().to_string()),
            ..Default::default()
        };

        let first = CoinGeckoClient::new(http.clone(), &config).coin_list().await.unwrap();
        assert_eq!(first.len(), 1);

        // a fresh client reads the snapshot instead of the API
        let second = CoinGeckoClient::new(http, &config).coin_list().await.unwrap();
        assert_eq!(find_by_symbol(&second, "LINK")[0].id, "chainlink");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_onchain_pools_flattened() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/onchain/networks/bsc/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "id": "bsc_0x36696169",
                    "type": "pool",
                    "attributes": {
                        "name": "WBNB / USDT 0.01%",
                        "address": "0x36696169",
                        "base_token_price_usd": "612.4",
                        "reserve_in_usd": "12000000.5",
                        "volume_usd": {"h24": "350000"}
                    }
                }]
            })))
            .mount(&server)
            .await;

        let pools = client(&server, None).onchain_pools("bsc", 1).await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].base_token_price_usd, Some(612.4));
        assert_eq!(pools[0].volume_usd_24h, Some(350_000.0));
    }
}
