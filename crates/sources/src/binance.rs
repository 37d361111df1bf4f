//! Binance USDⓈ-M futures mark-price klines

use async_trait::async_trait;
use serde_json::Value;

use dexai_core::{
    ExchangeConfig, FetchResult, PriceQuery, PriceSourceAdapter, PriceSourceKind, SourcePrice,
};

use crate::http::HttpClient;
use crate::kline::{mark_price_history, Candle, KlineVenue};

const KLINE_PATH: &str = "/fapi/v1/markPriceKlines";
const PAGE_LIMIT: usize = 1_500;

#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: HttpClient,
    base_url: String,
}

impl BinanceClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(http: HttpClient, config: &ExchangeConfig) -> Self {
        Self::new(http, &config.binance_url)
    }

    pub async fn mark_price_history(
        &self,
        token_symbol: Option<&str>,
        days: u32,
    ) -> FetchResult<SourcePrice> {
        mark_price_history(self, token_symbol, days).await
    }
}

#[async_trait]
impl KlineVenue for BinanceClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Binance
    }

    fn page_limit(&self) -> usize {
        PAGE_LIMIT
    }

    async fn fetch_page(&self, symbol: &str, start_ms: i64, end_ms: i64) -> FetchResult<Vec<Candle>> {
        let url = format!("{}{}", self.base_url, KLINE_PATH);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", "1m".to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];

        // rows mix numbers and strings: [openTime, open, high, low, close, ignore, closeTime, ...]
        let rows: Vec<Vec<Value>> = self.http.get_json("binance klines", &url, &query, &[]).await?;
        Ok(Candle::from_rows(&rows))
    }
}

#[async_trait]
impl PriceSourceAdapter for BinanceClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Binance
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
    use dexai_core::{FetchError, HttpConfig, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BinanceClient {
        let http = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        BinanceClient::new(http, server.uri())
    }

    #[tokio::test]
    async fn test_single_page_for_one_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(KLINE_PATH))
            .and(query_param("symbol", "ETHUSDT"))
            .and(query_param("interval", "1m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                [1700000000000i64, "2000.1", "2001.0", "1999.5", "2000.5", "0", 1700000059999i64, "0", 0, "0", "0", "0"],
                [1700000060000i64, "2000.5", "2002.0", "2000.0", "2001.25", "0", 1700000119999i64, "0", 0, "0", "0", "0"]
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let price = client(&server)
            .mark_price_history(Some("eth"), 1)
            .await
            .unwrap();
        assert_eq!(price.historical_data.len(), 2);
        assert_eq!(price.current_price, 2001.25);
        assert_eq!(price.historical_data[0].source, "binance");
    }

    #[tokio::test]
    async fn test_bad_symbol_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(KLINE_PATH))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .mark_price_history(Some("zzz"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 400, .. }));
    }
}
