//! Bybit v5 linear-perpetual mark-price klines

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use dexai_core::{
    ExchangeConfig, FetchError, FetchResult, PriceQuery, PriceSourceAdapter, PriceSourceKind,
    SourcePrice,
};

use crate::http::HttpClient;
use crate::kline::{mark_price_history, Candle, KlineVenue};

const KLINE_PATH: &str = "/v5/market/mark-price-kline";
const PAGE_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct KlineList {
    #[serde(default)]
    list: Vec<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct BybitClient {
    http: HttpClient,
    base_url: String,
}

impl BybitClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(http: HttpClient, config: &ExchangeConfig) -> Self {
        Self::new(http, &config.bybit_url)
    }

    /// 1-minute mark-price history for `<SYMBOL>USDT`, ascending
    pub async fn mark_price_history(
        &self,
        token_symbol: Option<&str>,
        days: u32,
    ) -> FetchResult<SourcePrice> {
        mark_price_history(self, token_symbol, days).await
    }
}

#[async_trait]
impl KlineVenue for BybitClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Bybit
    }

    fn page_limit(&self) -> usize {
        PAGE_LIMIT
    }

    async fn fetch_page(&self, symbol: &str, start_ms: i64, end_ms: i64) -> FetchResult<Vec<Candle>> {
        let url = format!("{}{}", self.base_url, KLINE_PATH);
        let query = [
            ("category", "linear".to_string()),
            ("symbol", symbol.to_string()),
            ("interval", "1".to_string()),
            ("start", start_ms.to_string()),
            ("end", end_ms.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];

        let envelope: BybitEnvelope<KlineList> =
            self.http.get_json("bybit klines", &url, &query, &[]).await?;
        if envelope.ret_code != 0 {
            return Err(FetchError::Api {
                vendor: "bybit",
                code: envelope.ret_code.to_string(),
                message: envelope.ret_msg,
            });
        }

        // newest first on the wire
        Ok(Candle::from_rows(&envelope.result.unwrap_or_default().list))
    }
}

#[async_trait]
impl PriceSourceAdapter for BybitClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Bybit
    }

    async fn fetch(&self, query: &PriceQuery) -> FetchResult<Option<SourcePrice>> {
        self.mark_price_history(query.token_symbol.as_deref(), query.days)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexai_core::{HttpConfig, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BybitClient {
        let http = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        BybitClient::new(http, server.uri())
    }

    #[tokio::test]
    async fn test_history_is_ascending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(KLINE_PATH))
            .and(query_param("symbol", "LINKUSDT"))
            .and(query_param("category", "linear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": {
                    "symbol": "LINKUSDT",
                    "category": "linear",
                    "list": [
                        ["1700000120000", "14.2", "14.3", "14.1", "14.25"],
                        ["1700000060000", "14.0", "14.2", "13.9", "14.10"],
                        ["1700000000000", "13.9", "14.0", "13.8", "13.95"]
                    ]
                }
            })))
            .mount(&server)
            .await;

        let price = client(&server)
            .mark_price_history(Some("link"), 1)
            .await
            .unwrap();

        let prices: Vec<_> = price.historical_data.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![13.95, 14.10, 14.25]);
        assert_eq!(price.current_price, 14.25);
        assert_eq!(price.last_updated, 1_700_000_120_000);
    }

    #[tokio::test]
    async fn test_api_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(KLINE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 10001,
                "retMsg": "params error: symbol invalid",
                "result": {}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .mark_price_history(Some("nope"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Api { vendor: "bybit", .. }));
    }
}
