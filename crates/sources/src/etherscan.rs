//! Etherscan V2 multichain explorer API

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use dexai_core::{EtherscanConfig, FetchError, FetchResult};

use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    result: Value,
}

impl Envelope {
    fn is_empty_list(&self) -> bool {
        let text = format!("{} {}", self.message, self.result.as_str().unwrap_or_default());
        text.contains("No transactions found") || text.contains("No records found")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTransaction {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(default)]
    pub gas_used: String,
    #[serde(default)]
    pub is_error: String,
    #[serde(default)]
    pub function_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub contract_address: String,
    pub token_symbol: String,
    pub token_decimal: String,
}

/// Block range and paging for account queries
#[derive(Debug, Clone, Copy)]
pub struct AccountQuery {
    pub start_block: u64,
    pub end_block: u64,
    pub page: u32,
    pub offset: u32,
    pub descending: bool,
}

impl Default for AccountQuery {
    fn default() -> Self {
        Self {
            start_block: 0,
            end_block: 99_999_999,
            page: 1,
            offset: 100,
            descending: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl EtherscanClient {
    pub fn new(http: HttpClient, config: &EtherscanConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    async fn call<T: DeserializeOwned + Default>(
        &self,
        chain_id: u64,
        module: &str,
        action: &str,
        params: &[(&str, String)],
    ) -> FetchResult<T> {
        let mut query = vec![
            ("chainid", chain_id.to_string()),
            ("module", module.to_string()),
            ("action", action.to_string()),
        ];
        query.extend(params.iter().cloned());
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }

        let envelope: Envelope = self
            .http
            .get_json("etherscan", &self.base_url, &query, &[])
            .await?;

        if envelope.status != "1" {
            if envelope.is_empty_list() {
                debug!("etherscan {}/{}: empty result", module, action);
                return Ok(T::default());
            }
            let message = match envelope.result {
                Value::String(detail) => format!("{}: {}", envelope.message, detail),
                _ => envelope.message,
            };
            if message.to_lowercase().contains("rate limit") {
                return Err(FetchError::RateLimited(format!("etherscan: {message}")));
            }
            return Err(FetchError::Api {
                vendor: "etherscan",
                code: envelope.status,
                message,
            });
        }

        serde_json::from_value(envelope.result).map_err(FetchError::decode)
    }

    fn account_params(address: &str, query: &AccountQuery) -> Vec<(&'static str, String)> {
        vec![
            ("address", address.to_string()),
            ("startblock", query.start_block.to_string()),
            ("endblock", query.end_block.to_string()),
            ("page", query.page.to_string()),
            ("offset", query.offset.to_string()),
            ("sort", if query.descending { "desc" } else { "asc" }.to_string()),
        ]
    }

    pub async fn transactions(
        &self,
        chain_id: u64,
        address: &str,
        query: &AccountQuery,
    ) -> FetchResult<Vec<NormalTransaction>> {
        self.call(chain_id, "account", "txlist", &Self::account_params(address, query))
            .await
    }

    /// ERC-20 transfers in or out of `address`, optionally for one token
    pub async fn token_transfers(
        &self,
        chain_id: u64,
        address: &str,
        contract: Option<&str>,
        query: &AccountQuery,
    ) -> FetchResult<Vec<TokenTransfer>> {
        let mut params = Self::account_params(address, query);
        if let Some(contract) = contract {
            params.push(("contractaddress", contract.to_string()));
        }
        self.call(chain_id, "account", "tokentx", &params).await
    }

    /// Native balance in wei, as a decimal string
    pub async fn balance(&self, chain_id: u64, address: &str) -> FetchResult<String> {
        let params = [
            ("address", address.to_string()),
            ("tag", "latest".to_string()),
        ];
        self.call(chain_id, "account", "balance", &params).await
    }

    /// Verified contract ABI as JSON
    pub async fn contract_abi(&self, chain_id: u64, address: &str) -> FetchResult<Value> {
        let raw: String = self
            .call(chain_id, "contract", "getabi", &[("address", address.to_string())])
            .await?;
        serde_json::from_str(&raw).map_err(FetchError::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexai_core::{HttpConfig, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> EtherscanClient {
        let http = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        let config = EtherscanConfig {
            base_url: format!("{}/v2/api", server.uri()),
            api_key: Some("key".into()),
        };
        EtherscanClient::new(http, &config)
    }

    #[tokio::test]
    async fn test_no_transactions_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "txlist"))
            .and(query_param("chainid", "56"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0", "message": "No transactions found", "result": []
            })))
            .mount(&server)
            .await;

        let txs = client(&server)
            .transactions(56, "0xabc", &AccountQuery::default())
            .await
            .unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn test_token_transfers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "tokentx"))
            .and(query_param("contractaddress", "0xtoken"))
            .and(query_param("apikey", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "message": "OK",
                "result": [{
                    "blockNumber": "100", "timeStamp": "1700000000", "hash": "0xh",
                    "from": "0xa", "to": "0xb", "value": "1000", "contractAddress": "0xtoken",
                    "tokenName": "Token", "tokenSymbol": "TKN", "tokenDecimal": "18"
                }]
            })))
            .mount(&server)
            .await;

        let transfers = client(&server)
            .token_transfers(1, "0xa", Some("0xtoken"), &AccountQuery::default())
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].token_symbol, "TKN");
    }

    #[tokio::test]
    async fn test_errors_and_abi() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0", "message": "NOTOK", "result": "Invalid API Key"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("action", "getabi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1", "message": "OK",
                "result": "[{\"type\":\"function\",\"name\":\"peers\"}]"
            })))
            .mount(&server)
            .await;

        let etherscan = client(&server);
        let err = etherscan.balance(1, "0xa").await.unwrap_err();
        assert!(matches!(err, FetchError::Api { vendor: "etherscan", .. }));

        let abi = etherscan.contract_abi(1, "0xoapp").await.unwrap();
        assert_eq!(abi[0]["name"], "peers");
    }
}
