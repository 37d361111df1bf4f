//! OKX DEX market API (signed)
//!
//! Every request is HMAC-signed with one of several key sets. Key sets are
//! leased from a [`KeyRotation`] so each stays within its request window, and
//! a rate-limited key is benched while the request is retried on another.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use dexai_core::{
    FetchError, FetchResult, OkxConfig, OkxCredentials, PriceDataPoint, PriceQuery,
    KeyRotation, PriceSourceAdapter, PriceSourceKind, RateWindow, RetryPolicy, SourcePrice,
};

use crate::http::{de, HttpClient};
use crate::kline::{Candle, MINUTES_PER_DAY};

const CANDLES_PATH: &str = "/api/v5/dex/market/historical-candles";
const PRICE_PATH: &str = "/api/v5/dex/market/price";
/// Largest page the candles endpoint serves
pub const CANDLES_PAGE_LIMIT: usize = 299;
pub const BSC_CHAIN_INDEX: &str = "56";
const RATE_LIMIT_CODE: &str = "50011";

type HmacSha256 = Hmac<Sha256>;

/// `base64(HMAC-SHA256(secret, timestamp + METHOD + requestPath + body))`
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> FetchResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| FetchError::Decode(format!("invalid OKX secret: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.to_uppercase().as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// ISO-8601 UTC with milliseconds, as OKX expects in `OK-ACCESS-TIMESTAMP`
pub fn okx_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[derive(Debug, Deserialize)]
struct OkxEnvelope<T> {
    #[serde(deserialize_with = "de::string_lenient")]
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> OkxEnvelope<T> {
    fn into_data(self) -> FetchResult<Option<T>> {
        match self.code.as_str() {
            "0" => Ok(self.data),
            RATE_LIMIT_CODE => Err(FetchError::RateLimited(format!("okx: {}", self.msg))),
            _ => Err(FetchError::Api {
                vendor: "okx",
                code: self.code,
                message: self.msg,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceRequest<'a> {
    chain_index: &'a str,
    token_contract_address: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTokenPrice {
    #[serde(default)]
    pub chain_index: String,
    #[serde(default)]
    pub token_contract_address: String,
    #[serde(default, deserialize_with = "de::f64_lenient")]
    pub time: f64,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub price: f64,
}

pub struct OkxDexClient {
    http: HttpClient,
    base_url: String,
    keys: KeyRotation<OkxCredentials>,
    chain_index: String,
    max_rate_limit_retries: u32,
    rate_limit_delay: Duration,
    page_delay: Duration,
}

impl OkxDexClient {
    /// Fails when no key set is configured
    pub fn new(http: HttpClient, config: &OkxConfig) -> FetchResult<Self> {
        let credentials = config.credentials()?;
        let window = RateWindow {
            max_requests: config.requests_per_window.max(1),
            window: Duration::from_millis(config.window_ms),
        };
        let keys = KeyRotation::new("okx", credentials, window)?;
        info!("OKX DEX client ready with {} key set(s)", keys.len());

        Ok(Self {
            // rate limits are handled here, per key
            http: http.with_retry(RetryPolicy::no_retry()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keys,
            chain_index: BSC_CHAIN_INDEX.to_string(),
            max_rate_limit_retries: config.max_rate_limit_retries,
            rate_limit_delay: Duration::from_millis(config.rate_limit_delay_ms),
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    pub fn with_chain_index(mut self, chain_index: &str) -> Self {
        self.chain_index = chain_index.to_string();
        self
    }

    pub fn key_sets(&self) -> usize {
        self.keys.len()
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        creds: &OkxCredentials,
        method: &Method,
        url: &Url,
        body: &str,
    ) -> FetchResult<Option<T>> {
        let request_path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        // single attempt per lease, so one timestamp covers the request
        let timestamp = okx_timestamp();
        let signature = sign(&creds.secret_key, &timestamp, method.as_str(), &request_path, body)?;

        let envelope: OkxEnvelope<T> = self
            .http
            .send_json("okx", |client| {
                let mut request = client
                    .request(method.clone(), url.clone())
                    .header("OK-ACCESS-KEY", &creds.api_key)
                    .header("OK-ACCESS-SIGN", &signature)
                    .header("OK-ACCESS-TIMESTAMP", &timestamp)
                    .header("OK-ACCESS-PASSPHRASE", &creds.passphrase)
                    .header("OK-ACCESS-PROJECT", &creds.project_id);
                if !body.is_empty() {
                    request = request
                        .header("Content-Type", "application/json")
                        .body(body.to_string());
                }
                request
            })
            .await?;

        envelope.into_data()
    }

    /// Lease a key, send, and on a retryable failure try again on the next key
    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> FetchResult<Option<T>> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(FetchError::transport)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let body = body.unwrap_or_default();

        let mut attempt = 0;
        loop {
            let lease = self.keys.acquire().await?;
            match self.send_once(lease.key(), &method, &url, &body).await {
                Err(e) if e.is_retryable() && attempt < self.max_rate_limit_retries => {
                    if e.is_rate_limited() {
                        lease.mark_rate_limited();
                    }
                    drop(lease);
                    attempt += 1;
                    warn!(
                        "okx {} failed ({}), retry {}/{} in {:?}",
                        path, e, attempt, self.max_rate_limit_retries, self.rate_limit_delay
                    );
                    tokio::time::sleep(self.rate_limit_delay).await;
                }
                result => return result,
            }
        }
    }

    /// One page of 1-minute candles, strictly older than `after` when given
    pub async fn candles_page(
        &self,
        token_address: &str,
        after: Option<i64>,
    ) -> FetchResult<Vec<Candle>> {
        let mut query = vec![
            ("chainIndex", self.chain_index.clone()),
            ("tokenContractAddress", token_address.to_lowercase()),
            ("bar", "1m".to_string()),
            ("limit", CANDLES_PAGE_LIMIT.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let rows: Option<Vec<Vec<Value>>> = self.signed(Method::GET, CANDLES_PATH, &query, None).await?;
        Ok(Candle::from_rows(&rows.unwrap_or_default()))
    }

    /// Up to `days * 1440` 1-minute prices, ascending
    ///
    /// Pages backwards from now; stops early on an empty page.
    pub async fn historical_prices(
        &self,
        token_address: &str,
        days: u32,
    ) -> FetchResult<Vec<PriceDataPoint>> {
        let max_points = (i64::from(days.max(1)) * MINUTES_PER_DAY) as usize;
        let max_requests = max_points.div_ceil(CANDLES_PAGE_LIMIT);

        let mut by_time: BTreeMap<i64, f64> = BTreeMap::new();
        let mut after = None;
        for request in 0..max_requests {
            if request > 0 {
                tokio::time::sleep(self.page_delay).await;
            }

            let page = self.candles_page(token_address, after).await?;
            let Some(earliest) = page.iter().map(|c| c.open_time).min() else {
                debug!("okx: empty candle page after {} requests", request);
                break;
            };
            by_time.extend(page.into_iter().map(|c| (c.open_time, c.close)));
            if by_time.len() >= max_points {
                break;
            }
            after = Some(earliest);
        }

        let skip = by_time.len().saturating_sub(max_points);
        Ok(by_time
            .into_iter()
            .skip(skip)
            .map(|(ts, close)| PriceDataPoint::new(ts, close, PriceSourceKind::OkxDex.name()))
            .collect())
    }

    /// Latest DEX price for a token on the client's chain
    pub async fn current_price(&self, token_address: &str) -> FetchResult<Option<f64>> {
        let address = token_address.to_lowercase();
        let body = serde_json::to_string(&[PriceRequest {
            chain_index: &self.chain_index,
            token_contract_address: &address,
        }])
        .map_err(FetchError::decode)?;

        let prices: Option<Vec<OkxTokenPrice>> =
            self.signed(Method::POST, PRICE_PATH, &[], Some(body)).await?;
        Ok(prices
            .unwrap_or_default()
            .into_iter()
            .find(|p| p.token_contract_address.eq_ignore_ascii_case(&address))
            .map(|p| p.price))
    }
}

#[async_trait]
impl PriceSourceAdapter for OkxDexClient {
    fn kind(&self) -> PriceSourceKind {
        PriceSourceKind::OkxDex
    }

    async fn fetch(&self, query: &PriceQuery) -> FetchResult<Option<SourcePrice>> {
        let history = self.historical_prices(&query.token_address, query.days).await?;
        Ok(Some(SourcePrice::from_history(history)))
    }
}
