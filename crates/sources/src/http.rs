//! Shared HTTP plumbing for the vendor clients

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use dexai_core::{retry_async, FetchError, FetchResult, HttpConfig, RetryPolicy};

/// reqwest client plus the retry policy every call goes through
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::transport)?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_http(config),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send the request built by `build`, retrying retryable failures,
    /// and decode the JSON body.
    pub async fn send_json<T, F>(&self, label: &str, build: F) -> FetchResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        retry_async(self.retry, label, || async {
            let response = build(&self.client)
                .send()
                .await
                .map_err(FetchError::transport)?;
            read_json(response).await
        })
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        label: &str,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> FetchResult<T> {
        debug!("{} GET {}", label, url);
        self.send_json(label, |client| {
            let mut request = client.get(url).query(query);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request
        })
        .await
    }
}

/// Map status codes onto [`FetchError`] and decode the body
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> FetchResult<T> {
    let status = response.status();
    let url = response.url().to_string();

    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(url));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited(url));
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await.map_err(FetchError::transport)?;
    serde_json::from_str(&body).map_err(|e| FetchError::Decode(format!("{url}: {e}")))
}

/// Vendors send numbers as JSON strings, numbers, or not at all
pub mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn value_to_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn value_to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn f64_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_f64(&value).unwrap_or(0.0))
    }

    pub fn opt_f64_lenient<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(value_to_f64))
    }

    /// Codes some vendors send as `"0"` and others as `0`
    pub fn string_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }

    pub fn opt_u32_lenient<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(value_to_i64)
            .and_then(|v| u32::try_from(v).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "de::f64_lenient")]
        price: f64,
        #[serde(default, deserialize_with = "de::opt_f64_lenient")]
        volume: Option<f64>,
    }

    fn client() -> HttpClient {
        HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry())
    }

    #[test]
    fn test_lenient_numbers() {
        let probe: Probe = serde_json::from_value(json!({"price": "1.5", "volume": 2})).unwrap();
        assert_eq!(probe.price, 1.5);
        assert_eq!(probe.volume, Some(2.0));

        let probe: Probe = serde_json::from_value(json!({"price": null})).unwrap();
        assert_eq!(probe.price, 0.0);
        assert_eq!(probe.volume, None);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let http = client();
        let missing: FetchResult<serde_json::Value> = http
            .get_json("probe", &format!("{}/missing", server.uri()), &[], &[])
            .await;
        assert!(matches!(missing, Err(FetchError::NotFound(_))));

        let busy: FetchResult<serde_json::Value> = http
            .get_json("probe", &format!("{}/busy", server.uri()), &[], &[])
            .await;
        assert!(matches!(busy, Err(FetchError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"price": 3})))
            .mount(&server)
            .await;

        let http = client().with_retry(RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(1),
            backoff: dexai_core::Backoff::Fixed,
        });
        let probe: Probe = http
            .get_json("probe", &format!("{}/flaky", server.uri()), &[], &[])
            .await
            .unwrap();
        assert_eq!(probe.price, 3.0);
    }
}
