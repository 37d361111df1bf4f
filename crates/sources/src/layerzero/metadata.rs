//! LayerZero metadata API: deployments and DVN registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use dexai_core::{FetchResult, LayerZeroConfig, MemoryTtlCache, TtlCache};

use crate::http::{de, HttpClient};

const METADATA_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRef {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Sent as a string by some chains and a number by others
    #[serde(default, deserialize_with = "de::opt_u32_lenient")]
    pub eid: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32_lenient")]
    pub version: Option<u32>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub endpoint_v2: Option<ContractRef>,
    #[serde(default)]
    pub send_uln302: Option<ContractRef>,
    #[serde(default)]
    pub receive_uln302: Option<ContractRef>,
    #[serde(default)]
    pub executor: Option<ContractRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDetails {
    #[serde(default)]
    pub chain_key: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u32_lenient")]
    pub native_chain_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvnInfo {
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u32_lenient")]
    pub version: Option<u32>,
    #[serde(default)]
    pub deprecated: bool,
}

/// Everything the metadata API knows about one chain key (e.g. `bsc-mainnet`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    #[serde(default)]
    pub chain_details: Option<ChainDetails>,
    /// DVN address (lowercase) -> info
    #[serde(default)]
    pub dvns: HashMap<String, DvnInfo>,
}

impl ChainMetadata {
    /// The Endpoint V2 deployment, if the chain has one
    pub fn v2_deployment(&self) -> Option<&Deployment> {
        self.deployments
            .iter()
            .find(|d| d.version == Some(2) && d.endpoint_v2.is_some())
    }
}

type Deployments = Arc<HashMap<String, ChainMetadata>>;

pub struct LayerZeroMetadataClient {
    http: HttpClient,
    base_url: String,
    cache: MemoryTtlCache<&'static str, Deployments>,
}

impl LayerZeroMetadataClient {
    pub fn new(http: HttpClient, config: &LayerZeroConfig) -> Self {
        Self {
            http,
            base_url: config.metadata_url.trim_end_matches('/').to_string(),
            cache: MemoryTtlCache::new(METADATA_TTL),
        }
    }

    async fn fetch(&self, path: &'static str) -> FetchResult<Deployments> {
        if let Some(hit) = self.cache.get(&path) {
            return Ok(hit);
        }
        let url = format!("{}{}", self.base_url, path);
        let chains: HashMap<String, ChainMetadata> =
            self.http.get_json("layerzero metadata", &url, &[], &[]).await?;
        debug!("layerzero metadata {}: {} chains", path, chains.len());

        let chains = Arc::new(chains);
        self.cache.insert(path, Arc::clone(&chains));
        Ok(chains)
    }

    /// All chains keyed by chain key
    pub async fn deployments(&self) -> FetchResult<Deployments> {
        self.fetch("/deployments").await
    }

    /// DVN registry keyed by chain key
    pub async fn dvns(&self) -> FetchResult<Deployments> {
        self.fetch("/dvns").await
    }

    /// Chain key and deployment carrying endpoint id `eid`
    pub async fn find_by_eid(&self, eid: u32) -> FetchResult<Option<(String, Deployment)>> {
        let chains = self.deployments().await?;
        Ok(chains.iter().find_map(|(key, chain)| {
            chain
                .deployments
                .iter()
                .find(|d| d.eid == Some(eid))
                .map(|d| (key.clone(), d.clone()))
        }))
    }

    pub async fn find_by_chain_key(&self, chain_key: &str) -> FetchResult<Option<ChainMetadata>> {
        let chains = self.deployments().await?;
        Ok(chains.get(chain_key).cloned())
    }

    /// Human name of a DVN on a chain
    pub async fn dvn_name(&self, chain_key: &str, dvn: &str) -> FetchResult<Option<String>> {
        let chains = self.dvns().await?;
        let dvn = dvn.to_lowercase();
        Ok(chains
            .get(chain_key)
            .and_then(|chain| {
                chain
                    .dvns
                    .iter()
                    .find(|(address, _)| address.to_lowercase() == dvn)
            })
            .and_then(|(_, info)| info.canonical_name.clone()))
    }
}
