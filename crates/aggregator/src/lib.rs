//! Price and token aggregation over the vendor clients
//!
//! - `price`: concurrent multi-source price fetch with per-source isolation
//! - `compare`: spread of each source against the highest-priority one
//! - `token`: search, then details merged from CoinGecko and Moralis

pub mod compare;
pub mod price;
pub mod token;

pub use compare::{compare_price_sources, max_deviation_pct};
pub use price::{PriceAggregator, PriceAggregatorBuilder};
pub use token::{TokenAggregateInfo, TokenAggregator, TokenDetailsOptions, TokenSearchResult};
