//! On-chain LayerZero V2 reads: OApp peers and Endpoint library/config
//!
//! Everything goes through Multicall3 so a whole peer matrix or pathway
//! costs one or two RPC round trips.

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::{sol, SolValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dexai_core::{FetchError, FetchResult};

use crate::rpc::{call3, decode_result, EvmRpcClient};

/// `getConfig` type for the executor config
pub const CONFIG_TYPE_EXECUTOR: u32 = 1;
/// `getConfig` type for the ULN (DVN) config
pub const CONFIG_TYPE_ULN: u32 = 2;

sol! {
    function peers(uint32 eid) external view returns (bytes32 peer);
    function endpoint() external view returns (address);

    function getSendLibrary(address sender, uint32 dstEid) external view returns (address lib);
    function getReceiveLibrary(address receiver, uint32 srcEid) external view returns (address lib, bool isDefault);
    function getConfig(address oapp, address lib, uint32 eid, uint32 configType) external view returns (bytes config);

    #[derive(Debug, PartialEq, Eq)]
    struct UlnConfig {
        uint64 confirmations;
        uint8 requiredDVNCount;
        uint8 optionalDVNCount;
        uint8 optionalDVNThreshold;
        address[] requiredDVNs;
        address[] optionalDVNs;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ExecutorConfig {
        uint32 maxMessageSize;
        address executor;
    }
}

/// A remote peer as stored by the OApp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub oapp: Address,
    pub eid: u32,
    /// `None` when unset (zero) or the call reverted
    pub peer: Option<B256>,
}

impl PeerInfo {
    /// The peer as an EVM address (right-most 20 bytes)
    pub fn peer_address(&self) -> Option<Address> {
        self.peer.map(Address::from_word)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UlnSettings {
    pub confirmations: u64,
    pub required_dvns: Vec<Address>,
    pub optional_dvns: Vec<Address>,
    pub optional_dvn_threshold: u8,
}

impl From<UlnConfig> for UlnSettings {
    fn from(cfg: UlnConfig) -> Self {
        Self {
            confirmations: cfg.confirmations,
            required_dvns: cfg.requiredDVNs,
            optional_dvns: cfg.optionalDVNs,
            optional_dvn_threshold: cfg.optionalDVNThreshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSettings {
    pub max_message_size: u32,
    pub executor: Address,
}

impl From<ExecutorConfig> for ExecutorSettings {
    fn from(cfg: ExecutorConfig) -> Self {
        Self {
            max_message_size: cfg.maxMessageSize,
            executor: cfg.executor,
        }
    }
}

/// Libraries and security settings of one OApp pathway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayConfig {
    pub oapp: Address,
    pub eid: u32,
    pub send_library: Address,
    pub receive_library: Address,
    pub receive_library_is_default: bool,
    pub executor: Option<ExecutorSettings>,
    pub send_uln: Option<UlnSettings>,
    pub receive_uln: Option<UlnSettings>,
}

/// Decode the `bytes` returned by `getConfig(.., CONFIG_TYPE_ULN)`
pub fn decode_uln_config(raw: &[u8]) -> FetchResult<UlnSettings> {
    <UlnConfig as SolValue>::abi_decode(raw, true)
        .map(UlnSettings::from)
        .map_err(|e| FetchError::Rpc(format!("bad ULN config: {e}")))
}

/// Decode the `bytes` returned by `getConfig(.., CONFIG_TYPE_EXECUTOR)`
pub fn decode_executor_config(raw: &[u8]) -> FetchResult<ExecutorSettings> {
    <ExecutorConfig as SolValue>::abi_decode(raw, true)
        .map(ExecutorSettings::from)
        .map_err(|e| FetchError::Rpc(format!("bad executor config: {e}")))
}

fn config_bytes(result: &crate::rpc::Result3) -> Option<Bytes> {
    decode_result::<getConfigCall>(result).map(|ret| ret.config)
}

pub struct LayerZeroReader<'a> {
    rpc: &'a EvmRpcClient,
    endpoint: Address,
}

impl<'a> LayerZeroReader<'a> {
    pub fn new(rpc: &'a EvmRpcClient, endpoint: Address) -> Self {
        Self { rpc, endpoint }
    }

    /// The Endpoint V2 an OApp is bound to
    pub async fn oapp_endpoint(&self, oapp: Address) -> FetchResult<Address> {
        Ok(self.rpc.call(oapp, &endpointCall {}).await?._0)
    }

    /// `peers(eid)` for every (oapp, eid) pair, one multicall
    pub async fn peers(&self, oapps: &[Address], eids: &[u32]) -> FetchResult<Vec<PeerInfo>> {
        let pairs: Vec<(Address, u32)> = oapps
            .iter()
            .flat_map(|oapp| eids.iter().map(move |eid| (*oapp, *eid)))
            .collect();

        let calls = pairs
            .iter()
            .map(|(oapp, eid)| call3(*oapp, &peersCall { eid: *eid }))
            .collect();
        let results = self.rpc.aggregate3(calls).await?;

        Ok(pairs
            .into_iter()
            .zip(results.iter())
            .map(|((oapp, eid), result)| PeerInfo {
                oapp,
                eid,
                peer: decode_result::<peersCall>(result)
                    .map(|ret| ret.peer)
                    .filter(|peer| !peer.is_zero()),
            })
            .collect())
    }

    /// Send/receive libraries and their configs for `oapp` towards `eid`
    pub async fn pathway_config(&self, oapp: Address, eid: u32) -> FetchResult<PathwayConfig> {
        let libs = self
            .rpc
            .aggregate3(vec![
                call3(self.endpoint, &getSendLibraryCall { sender: oapp, dstEid: eid }),
                call3(self.endpoint, &getReceiveLibraryCall { receiver: oapp, srcEid: eid }),
            ])
            .await?;

        let send_library = decode_result::<getSendLibraryCall>(&libs[0])
            .map(|ret| ret.lib)
            .ok_or_else(|| FetchError::Rpc(format!("getSendLibrary({oapp}, {eid}) failed")))?;
        let receive = decode_result::<getReceiveLibraryCall>(&libs[1])
            .ok_or_else(|| FetchError::Rpc(format!("getReceiveLibrary({oapp}, {eid}) failed")))?;

        let get_config = |lib: Address, config_type: u32| {
            call3(
                self.endpoint,
                &getConfigCall { oapp, lib, eid, configType: config_type },
            )
        };
        let configs = self
            .rpc
            .aggregate3(vec![
                get_config(send_library, CONFIG_TYPE_EXECUTOR),
                get_config(send_library, CONFIG_TYPE_ULN),
                get_config(receive.lib, CONFIG_TYPE_ULN),
            ])
            .await?;

        let executor = config_bytes(&configs[0]).and_then(|raw| {
            decode_executor_config(&raw)
                .map_err(|e| warn!("{} eid {}: {}", oapp, eid, e))
                .ok()
        });
        let uln_at = |index: usize| {
            config_bytes(&configs[index]).and_then(|raw| {
                decode_uln_config(&raw)
                    .map_err(|e| warn!("{} eid {}: {}", oapp, eid, e))
                    .ok()
            })
        };
        let send_uln = uln_at(1);
        let receive_uln = uln_at(2);

        debug!(
            "{} eid {}: send lib {}, receive lib {} (default: {})",
            oapp, eid, send_library, receive.lib, receive.isDefault
        );
        Ok(PathwayConfig {
            oapp,
            eid,
            send_library,
            receive_library: receive.lib,
            receive_library_is_default: receive.isDefault,
            executor,
            send_uln,
            receive_uln,
        })
    }
}
