//! Core type definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::FetchResult;

/// Price sources the aggregator knows how to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSourceKind {
    CoinGecko,
    Bybit,
    Binance,
    Bitget,
    #[serde(rename = "okx")]
    OkxDex,
}

impl PriceSourceKind {
    pub const ALL: [PriceSourceKind; 5] = [
        PriceSourceKind::CoinGecko,
        PriceSourceKind::Bybit,
        PriceSourceKind::Binance,
        PriceSourceKind::Bitget,
        PriceSourceKind::OkxDex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PriceSourceKind::CoinGecko => "coingecko",
            PriceSourceKind::Bybit => "bybit",
            PriceSourceKind::Binance => "binance",
            PriceSourceKind::Bitget => "bitget",
            PriceSourceKind::OkxDex => "okx",
        }
    }

    /// Perpetual-futures venues priced from mark-price klines
    pub fn needs_symbol(&self) -> bool {
        matches!(
            self,
            PriceSourceKind::Bybit | PriceSourceKind::Binance | PriceSourceKind::Bitget
        )
    }
}

impl fmt::Display for PriceSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PriceSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown price source: {s}"))
    }
}

/// One historical price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDataPoint {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub price: f64,
    pub source: String,
}

impl PriceDataPoint {
    pub fn new(timestamp: i64, price: f64, source: &str) -> Self {
        Self {
            timestamp,
            price: price.max(0.0),
            source: source.to_string(),
        }
    }
}

/// What one source reported for a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePrice {
    pub current_price: f64,
    /// Epoch milliseconds of the newest observation, 0 when nothing was observed
    pub last_updated: i64,
    pub historical_data: Vec<PriceDataPoint>,
}

impl SourcePrice {
    /// Zero-price placeholder for a source that settled without data
    pub fn empty() -> Self {
        Self {
            current_price: 0.0,
            last_updated: 0,
            historical_data: Vec::new(),
        }
    }

    /// Build from an ascending series; the last point is the current price.
    pub fn from_history(historical_data: Vec<PriceDataPoint>) -> Self {
        match historical_data.last() {
            Some(last) => Self {
                current_price: last.price,
                last_updated: last.timestamp,
                historical_data,
            },
            None => Self::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.historical_data.is_empty() && self.current_price == 0.0
    }
}

/// A settled source inside an aggregation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub source: PriceSourceKind,
    #[serde(flatten)]
    pub price: SourcePrice,
}

/// Merged result of one multi-source aggregation
///
/// Entries keep the order in which sources were ranked for the call and
/// serialize as a map keyed by source name, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSourcePriceData {
    pub token_address: String,
    #[serde(with = "ordered_sources")]
    pub sources: Vec<SourceEntry>,
}

mod ordered_sources {
    use super::{PriceSourceKind, SourceEntry, SourcePrice};
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(entries: &[SourceEntry], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for entry in entries {
            map.serialize_entry(&entry.source, &entry.price)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SourceEntry>, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Vec<SourceEntry>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of source name to price")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((source, price)) = access.next_entry::<PriceSourceKind, SourcePrice>()? {
                    entries.retain(|e: &SourceEntry| e.source != source);
                    entries.push(SourceEntry { source, price });
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl MultiSourcePriceData {
    pub fn new(token_address: &str) -> Self {
        Self {
            token_address: token_address.to_string(),
            sources: Vec::new(),
        }
    }

    pub fn insert(&mut self, source: PriceSourceKind, price: SourcePrice) {
        match self.sources.iter_mut().find(|e| e.source == source) {
            Some(entry) => entry.price = price,
            None => self.sources.push(SourceEntry { source, price }),
        }
    }

    pub fn get(&self, source: PriceSourceKind) -> Option<&SourcePrice> {
        self.sources
            .iter()
            .find(|e| e.source == source)
            .map(|e| &e.price)
    }

    pub fn contains(&self, source: PriceSourceKind) -> bool {
        self.get(source).is_some()
    }

    pub fn source_kinds(&self) -> Vec<PriceSourceKind> {
        self.sources.iter().map(|e| e.source).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Price of one source relative to the baseline source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparison {
    pub source: PriceSourceKind,
    pub price: f64,
    pub difference: f64,
    pub percentage_diff: f64,
}

/// Arguments handed to every source adapter for one aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub token_address: String,
    pub token_symbol: Option<String>,
    /// CoinGecko asset platform id (e.g. "binance-smart-chain")
    pub platform: String,
    pub days: u32,
    pub currency: String,
}

/// A vendor that can report current and historical prices for a token
///
/// `Ok(None)` means the vendor has no data for the token; errors are left to
/// the caller to turn into placeholders.
#[async_trait]
pub trait PriceSourceAdapter: Send + Sync {
    fn kind(&self) -> PriceSourceKind;

    async fn fetch(&self, query: &PriceQuery) -> FetchResult<Option<SourcePrice>>;
}

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_serialize_as_ordered_map() {
        let mut data = MultiSourcePriceData::new("0xabc");
        data.insert(
            PriceSourceKind::Bybit,
            SourcePrice::from_history(vec![PriceDataPoint::new(60_000, 14.35, "bybit")]),
        );
        data.insert(PriceSourceKind::Binance, SourcePrice::empty());
        data.insert(PriceSourceKind::CoinGecko, SourcePrice::empty());

        let json = serde_json::to_string(&data).unwrap();
        assert!(json.starts_with(r#"{"tokenAddress":"0xabc","sources":{"bybit":{"currentPrice":14.35"#));
        let bybit = json.find(r#""bybit""#).unwrap();
        let binance = json.find(r#""binance""#).unwrap();
        let coingecko = json.find(r#""coingecko""#).unwrap();
        assert!(bybit < binance && binance < coingecko);

        let back: MultiSourcePriceData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_source_kind_names_round_trip() {
        for kind in PriceSourceKind::ALL {
            assert_eq!(kind.name().parse::<PriceSourceKind>().unwrap(), kind);
        }
        assert_eq!("OKX".parse::<PriceSourceKind>().unwrap(), PriceSourceKind::OkxDex);
        assert!("kraken".parse::<PriceSourceKind>().is_err());
    }

    #[test]
    fn test_source_price_from_history_uses_last_point() {
        let history = vec![
            PriceDataPoint::new(1_000, 10.0, "bybit"),
            PriceDataPoint::new(2_000, 12.5, "bybit"),
        ];
        let price = SourcePrice::from_history(history);
        assert_eq!(price.current_price, 12.5);
        assert_eq!(price.last_updated, 2_000);

        assert_eq!(SourcePrice::from_history(vec![]), SourcePrice::empty());
    }

    #[test]
    fn test_negative_prices_clamped() {
        assert_eq!(PriceDataPoint::new(0, -3.0, "x").price, 0.0);
    }

    #[test]
    fn test_multi_source_insert_keeps_order() {
        let mut data = MultiSourcePriceData::new("0xabc");
        data.insert(PriceSourceKind::Bybit, SourcePrice::empty());
        data.insert(PriceSourceKind::CoinGecko, SourcePrice::empty());
        data.insert(PriceSourceKind::Bybit, SourcePrice::from_history(vec![
            PriceDataPoint::new(5, 1.0, "bybit"),
        ]));

        assert_eq!(
            data.source_kinds(),
            vec![PriceSourceKind::Bybit, PriceSourceKind::CoinGecko]
        );
        assert_eq!(data.get(PriceSourceKind::Bybit).unwrap().current_price, 1.0);
    }
}
