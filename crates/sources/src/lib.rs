//! Vendor clients for market and chain data
//!
//! Each module wraps one third-party API:
//! - CoinGecko (prices, metadata, tickers, on-chain pools, coin list)
//! - Moralis (pairs, holders, wallets)
//! - Bybit / Binance / Bitget mark-price klines and ticker streams
//! - OKX DEX signed market API with key rotation
//! - Etherscan V2 explorer
//! - EVM JSON-RPC with Multicall3, V3 pool and LayerZero readers

pub mod http;
pub mod kline;
pub mod binance;
pub mod bitget;
pub mod bybit;
pub mod coingecko;
pub mod moralis;
pub mod okx_dex;
pub mod etherscan;
pub mod rpc;
pub mod pool;
pub mod layerzero;
pub mod ticker;
pub mod ticker_state;

pub use http::HttpClient;
pub use binance::BinanceClient;
pub use bitget::BitgetClient;
pub use bybit::BybitClient;
pub use coingecko::CoinGeckoClient;
pub use moralis::MoralisClient;
pub use okx_dex::OkxDexClient;
pub use etherscan::EtherscanClient;
pub use rpc::EvmRpcClient;
pub use pool::V3PoolReader;
pub use layerzero::{LayerZeroMetadataClient, LayerZeroReader};
pub use ticker::{FeedConfig, TickerFeed, TickerUpdate, TickerVenue};
pub use ticker_state::TickerState;
