//! Minimal EVM JSON-RPC client: `eth_call` and Multicall3 batching

use alloy_primitives::{address, Address, Bytes};
use alloy_sol_types::{sol, SolCall};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use dexai_core::{FetchError, FetchResult};

use crate::http::HttpClient;

/// Multicall3, deployed at the same address on every supported chain
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Result3 {
        bool success;
        bytes returnData;
    }

    function aggregate3(Call3[] calldata calls) external payable returns (Result3[] memory returnData);
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

/// Build a failure-tolerant Multicall3 entry
pub fn call3<C: SolCall>(target: Address, call: &C) -> Call3 {
    Call3 {
        target,
        allowFailure: true,
        callData: call.abi_encode().into(),
    }
}

/// Decode one Multicall3 result; failed or undecodable calls are `None`
pub fn decode_result<C: SolCall>(result: &Result3) -> Option<C::Return> {
    if !result.success {
        return None;
    }
    C::abi_decode_returns(&result.returnData, true).ok()
}

#[derive(Debug)]
pub struct EvmRpcClient {
    http: HttpClient,
    url: String,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> FetchResult<T> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("rpc {} -> {}", method, self.url);

        let response: RpcResponse<T> = self
            .http
            .send_json(method, |client| client.post(&self.url).json(&body))
            .await?;

        if let Some(err) = response.error {
            return Err(FetchError::Rpc(format!("{} ({})", err.message, err.code)));
        }
        response
            .result
            .ok_or_else(|| FetchError::Rpc(format!("{method}: empty result")))
    }

    pub async fn eth_call(&self, to: Address, data: Bytes) -> FetchResult<Bytes> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    /// `eth_call` a typed Solidity function
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> FetchResult<C::Return> {
        let raw = self.eth_call(to, call.abi_encode().into()).await?;
        C::abi_decode_returns(&raw, true).map_err(|e| FetchError::Rpc(format!("decode {}: {e}", C::SIGNATURE)))
    }

    /// Run `calls` in one `aggregate3`; results line up with `calls`
    pub async fn aggregate3(&self, calls: Vec<Call3>) -> FetchResult<Vec<Result3>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let expected = calls.len();
        let result = self.call(MULTICALL3, &aggregate3Call { calls }).await?;
        if result.returnData.len() != expected {
            return Err(FetchError::Rpc(format!(
                "multicall returned {} results for {} calls",
                result.returnData.len(),
                expected
            )));
        }
        Ok(result.returnData)
    }
}
