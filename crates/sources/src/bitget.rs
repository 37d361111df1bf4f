//! Bitget v2 USDT-futures mark-price candles

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use dexai_core::{
    ExchangeConfig, FetchError, FetchResult, PriceQuery, PriceSourceAdapter, PriceSourceKind,
    SourcePrice,
};

use crate::http::HttpClient;
use crate::kline::{mark_price_history, Candle, KlineVenue};

const CANDLES_PATH: &str = "/api/v2/mix/market/history-mark-candles";
const PAGE_LIMIT: usize = 200;
const SUCCESS: &str = "00000";

#[derive(Debug, Deserialize)]
struct BitgetEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Clone)]
pub struct BitgetClient {
    http: HttpClient,
    base_url: String,
}

impl BitgetClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(http: HttpClient, config: &ExchangeConfig) -> Self {
        Self::new(http, &config.bitget_url)
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
impl KlineVenue for BitgetClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Bitget
    }

    fn page_limit(&self) -> usize {
        PAGE_LIMIT
    }

    async fn fetch_page(&self, symbol: &str, start_ms: i64, end_ms: i64) -> FetchResult<Vec<Candle>> {
        let url = format!("{}{}", self.base_url, CANDLES_PATH);
        let query = [
            ("symbol", symbol.to_string()),
            ("productType", "USDT-FUTURES".to_string()),
            ("granularity", "1m".to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];

        let envelope: BitgetEnvelope = self.http.get_json("bitget candles", &url, &query, &[]).await?;
        if envelope.code != SUCCESS {
            return Err(FetchError::Api {
                vendor: "bitget",
                code: envelope.code,
                message: envelope.msg,
            });
        }

        Ok(Candle::from_rows(&envelope.data.unwrap_or_default()))
    }
}

#[async_trait]
impl PriceSourceAdapter for BitgetClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::Bitget
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

    fn client(server: &MockServer) -> BitgetClient {
        let http = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        BitgetClient::new(http, server.uri())
    }

    #[tokio::test]
    async fn test_pages_are_merged() {
        let server = MockServer::start().await;
        // every window gets the same page; duplicates collapse
        Mock::given(method("GET"))
            .and(path(CANDLES_PATH))
            .and(query_param("productType", "USDT-FUTURES"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "00000",
                "msg": "success",
                "requestTime": 1700000200000i64,
                "data": [
                    ["1700000060000", "5.1", "5.2", "5.0", "5.15", "0", "0"],
                    ["1700000000000", "5.0", "5.1", "4.9", "5.05", "0", "0"]
                ]
            })))
            .mount(&server)
            .await;

        let price = client(&server)
            .mark_price_history(Some("uni"), 1)
            .await
            .unwrap();
        assert_eq!(price.historical_data.len(), 2);
        assert_eq!(price.current_price, 5.15);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1_441_usize.div_ceil(PAGE_LIMIT));
    }

    #[tokio::test]
    async fn test_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CANDLES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "40034",
                "msg": "Parameter does not exist",
                "data": null
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .mark_price_history(Some("uni"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Api { vendor: "bitget", .. }));
    }
}
