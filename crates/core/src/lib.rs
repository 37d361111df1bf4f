//! Core types and utilities for the DEX AI market data clients
//!
//! This crate provides shared pieces used by the vendor clients and the
//! aggregators:
//! - Price points, per-source results and the adapter seam
//! - Aggregator and application configuration
//! - Error types
//! - TTL cache, retry helper and API-key rotation
//! - Chain/token tables and V3 pool math

pub mod types;
pub mod tokens;
pub mod pools;
pub mod config;
pub mod errors;
pub mod cache;
pub mod retry;
pub mod rate_limit;
pub mod telemetry;

pub use types::*;
pub use tokens::*;
pub use pools::*;
pub use config::*;
pub use errors::*;
pub use cache::{MemoryTtlCache, TtlCache};
pub use retry::{retry_async, Backoff, RetryPolicy};
pub use rate_limit::{KeyLease, KeyRotation, RateWindow};
