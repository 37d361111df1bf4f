//! Moralis Web3 Data API: token pairs, holders, profitable wallets and
//! wallet history

use serde::{Deserialize, Serialize};
use tracing::debug;

use dexai_core::{FetchError, FetchResult, MoralisConfig};

use crate::http::{de, HttpClient};

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PairsResponse {
    #[serde(default)]
    pairs: Vec<TokenPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairToken {
    pub token_address: String,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
}

/// A DEX pool holding the token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub pair_address: String,
    #[serde(default)]
    pub pair_label: Option<String>,
    #[serde(default)]
    pub exchange_name: Option<String>,
    #[serde(default)]
    pub exchange_address: Option<String>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub usd_price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub liquidity_usd: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub volume_24h_usd: Option<f64>,
    #[serde(default)]
    pub pair: Vec<PairToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolder {
    pub owner_address: String,
    #[serde(default)]
    pub owner_address_label: Option<String>,
    /// Raw integer balance
    pub balance: String,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub balance_formatted: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub usd_value: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub percentage_relative_to_total_supply: Option<f64>,
    #[serde(default)]
    pub is_contract: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitableWallet {
    pub address: String,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub realized_profit_usd: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub realized_profit_percentage: Option<f64>,
    #[serde(default)]
    pub count_of_trades: u64,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub total_usd_invested: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub avg_buy_price_usd: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub avg_sell_price_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub hash: String,
    pub block_timestamp: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub from_address: String,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub possible_spam: bool,
}

/// One page of wallet history and the cursor for the next
#[derive(Debug, Clone, PartialEq)]
pub struct WalletHistoryPage {
    pub transactions: Vec<WalletTransaction>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MoralisClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl MoralisClient {
    /// Fails without an API key; every Moralis endpoint requires one.
    pub fn new(http: HttpClient, config: &MoralisConfig) -> FetchResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(FetchError::MissingCredentials("moralis"))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        label: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let headers = [(API_KEY_HEADER, self.api_key.clone())];
        self.http.get_json(label, &url, query, &headers).await
    }

    /// Pools trading `token_address` on `chain` (hex chain id)
    pub async fn token_pairs(
        &self,
        token_address: &str,
        chain: &str,
        limit: usize,
    ) -> FetchResult<Vec<TokenPair>> {
        let path = format!("/erc20/{token_address}/pairs");
        let query = [("chain", chain.to_string()), ("limit", limit.to_string())];
        let response: PairsResponse = self.get("moralis pairs", &path, &query).await?;

        let mut pairs = response.pairs;
        pairs.truncate(limit);
        debug!("moralis: {} pairs for {}", pairs.len(), token_address);
        Ok(pairs)
    }

    /// Largest holders first
    pub async fn token_holders(
        &self,
        token_address: &str,
        chain: &str,
        limit: usize,
    ) -> FetchResult<Vec<TokenHolder>> {
        let path = format!("/erc20/{token_address}/owners");
        let query = [
            ("chain", chain.to_string()),
            ("limit", limit.to_string()),
            ("order", "DESC".to_string()),
        ];
        let page: Paged<TokenHolder> = self.get("moralis owners", &path, &query).await?;
        Ok(page.result)
    }

    /// Wallets with the highest realised profit on the token
    pub async fn top_profitable_wallets(
        &self,
        token_address: &str,
        chain: &str,
        days: Option<&str>,
    ) -> FetchResult<Vec<ProfitableWallet>> {
        let path = format!("/erc20/{token_address}/top-gainers");
        let query = [
            ("chain", chain.to_string()),
            ("days", days.unwrap_or("all").to_string()),
        ];
        let page: Paged<ProfitableWallet> = self.get("moralis top gainers", &path, &query).await?;
        Ok(page.result)
    }

    pub async fn wallet_history(
        &self,
        wallet: &str,
        chain: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> FetchResult<WalletHistoryPage> {
        let path = format!("/wallets/{wallet}/history");
        let mut query = vec![("chain", chain.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let page: Paged<WalletTransaction> = self.get("moralis wallet history", &path, &query).await?;
        Ok(WalletHistoryPage {
            transactions: page.result,
            cursor: page.cursor.filter(|c| !c.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexai_core::{HttpConfig, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LINK: &str = "0x514910771af9ca656af840dff83e8264ecf986ca";

    fn client(server: &MockServer) -> MoralisClient {
        let http = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        let config = MoralisConfig {
            base_url: server.uri(),
            api_key: Some("secret".into()),
        };
        MoralisClient::new(http, &config).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let http = HttpClient::new(&HttpConfig::default()).unwrap();
        let err = MoralisClient::new(http, &MoralisConfig::default()).unwrap_err();
        assert!(matches!(err, FetchError::MissingCredentials("moralis")));
    }

    #[tokio::test]
    async fn test_pairs_truncated_to_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/erc20/{LINK}/pairs")))
            .and(query_param("chain", "0x1"))
            .and(header(API_KEY_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pairs": [
                    {"pair_address": "0xp1", "exchange_name": "Uniswap v3", "usd_price": 14.5,
                     "liquidity_usd": "1000000", "pair": [{"token_address": LINK, "token_symbol": "LINK"}]},
                    {"pair_address": "0xp2", "exchange_name": "Uniswap v2", "usd_price": 14.4},
                    {"pair_address": "0xp3"}
                ]
            })))
            .mount(&server)
            .await;

        let pairs = client(&server).token_pairs(LINK, "0x1", 2).await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].liquidity_usd, Some(1_000_000.0));
        assert_eq!(pairs[0].pair[0].token_symbol.as_deref(), Some("LINK"));
    }

    #[tokio::test]
    async fn test_holders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/erc20/{LINK}/owners")))
            .and(query_param("order", "DESC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cursor": null,
                "result": [{
                    "owner_address": "0xholder",
                    "balance": "1000000000000000000000",
                    "balance_formatted": "1000",
                    "usd_value": "14500.5",
                    "percentage_relative_to_total_supply": 0.0001,
                    "is_contract": false
                }]
            })))
            .mount(&server)
            .await;

        let holders = client(&server).token_holders(LINK, "0x1", 10).await.unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].balance_formatted, Some(1000.0));
        assert_eq!(holders[0].usd_value, Some(14_500.5));
    }

    #[tokio::test]
    async fn test_wallet_history_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wallets/0xwallet/history"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cursor": "",
                "result": [{
                    "hash": "0xh",
                    "block_timestamp": "2024-01-01T00:00:00.000Z",
                    "category": "token swap",
                    "from_address": "0xwallet",
                    "to_address": "0xrouter",
                    "possible_spam": false
                }]
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .wallet_history("0xwallet", "0x1", 25, Some("abc"))
            .await
            .unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert_eq!(page.cursor, None);
    }

    #[tokio::test]
    async fn test_top_gainers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/erc20/{LINK}/top-gainers")))
            .and(query_param("days", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"address": "0xwhale", "realized_profit_usd": "52000.1", "count_of_trades": 12}]
            })))
            .mount(&server)
            .await;

        let wallets = client(&server)
            .top_profitable_wallets(LINK, "0x1", Some("30"))
            .await
            .unwrap();
        assert_eq!(wallets[0].realized_profit_usd, Some(52_000.1));
        assert_eq!(wallets[0].count_of_trades, 12);
    }
}
