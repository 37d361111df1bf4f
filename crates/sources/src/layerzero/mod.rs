//! LayerZero V2: metadata API lookups and on-chain pathway reads

pub mod metadata;
pub mod onchain;

pub use metadata::{ChainMetadata, Deployment, DvnInfo, LayerZeroMetadataClient};
pub use onchain::{
    decode_executor_config, decode_uln_config, ExecutorSettings, LayerZeroReader, PathwayConfig,
    PeerInfo, UlnSettings, CONFIG_TYPE_EXECUTOR, CONFIG_TYPE_ULN,
};
