//! Mark-price kline history shared by the perpetual-futures venues
//!
//! Venues cap the candles per request, so a `days`-long 1-minute history is
//! fetched as consecutive time windows, oldest first, then normalised into
//! an ascending, de-duplicated series.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use dexai_core::{
    now_ms, usdt_perp_symbol, FetchResult, PriceDataPoint, PriceSourceKind, SourcePrice,
};

pub const MINUTE_MS: i64 = 60_000;
pub const MINUTES_PER_DAY: i64 = 1_440;

/// One 1-minute candle reduced to what the price series needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Epoch milliseconds of the candle open
    pub open_time: i64,
    pub close: f64,
}

impl Candle {
    /// Venues share the `[open_time, open, high, low, close, ..]` row layout,
    /// with numbers as strings or JSON numbers.
    pub fn from_row(row: &[Value]) -> Option<Self> {
        let open_time = crate::http::de::value_to_i64(row.first()?)?;
        let close = crate::http::de::value_to_f64(row.get(4)?)?;
        Some(Self { open_time, close })
    }

    pub fn from_rows(rows: &[Vec<Value>]) -> Vec<Self> {
        rows.iter().filter_map(|row| Self::from_row(row)).collect()
    }
}

/// A venue serving 1-minute mark-price candles for USDT perpetuals
#[async_trait]
pub trait KlineVenue: Send + Sync {
    fn kind(&self) -> PriceSourceKind;

    /// Most candles the venue returns per request
    fn page_limit(&self) -> usize;

    /// Candles with `start_ms <= open_time <= end_ms`, in any order
    async fn fetch_page(&self, symbol: &str, start_ms: i64, end_ms: i64) -> FetchResult<Vec<Candle>>;
}

/// Inclusive `[start, end]` windows covering `days` days up to `end_ms`,
/// each spanning at most `page_limit` minutes.
pub fn time_windows(end_ms: i64, days: u32, page_limit: usize) -> Vec<(i64, i64)> {
    let end = end_ms - end_ms.rem_euclid(MINUTE_MS);
    let start = end - i64::from(days) * MINUTES_PER_DAY * MINUTE_MS;
    let span = page_limit.max(1) as i64 * MINUTE_MS;

    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let window_end = (cursor + span - MINUTE_MS).min(end);
        windows.push((cursor, window_end));
        cursor = window_end + MINUTE_MS;
    }
    windows
}

/// Sort ascending by open time, drop duplicates, and tag with the source name
pub fn normalize(candles: Vec<Candle>, source: PriceSourceKind) -> SourcePrice {
    let by_time: BTreeMap<i64, f64> = candles
        .into_iter()
        .filter(|c| c.close.is_finite())
        .map(|c| (c.open_time, c.close))
        .collect();

    let history = by_time
        .into_iter()
        .map(|(timestamp, close)| PriceDataPoint::new(timestamp, close, source.name()))
        .collect();

    SourcePrice::from_history(history)
}

/// Fetch `days` days of 1-minute mark prices for `<SYMBOL>USDT`
///
/// Without a token symbol no request is made and an empty result is returned.
pub async fn mark_price_history<V>(
    venue: &V,
    token_symbol: Option<&str>,
    days: u32,
) -> FetchResult<SourcePrice>
where
    V: KlineVenue + ?Sized,
{
    let Some(symbol) = token_symbol.map(str::trim).filter(|s| !s.is_empty()) else {
        warn!("{}: no token symbol, skipping kline fetch", venue.kind());
        return Ok(SourcePrice::empty());
    };
    let pair = usdt_perp_symbol(symbol);

    let mut candles = Vec::new();
    for (start, end) in time_windows(now_ms(), days, venue.page_limit()) {
        let page = venue.fetch_page(&pair, start, end).await?;
        debug!("{} {}: {} candles in [{}, {}]", venue.kind(), pair, page.len(), start, end);
        candles.extend(page);
    }

    let price = normalize(candles, venue.kind());
    if price.historical_data.is_empty() {
        warn!("{} returned no candles for {}", venue.kind(), pair);
    }
    Ok(price)
}
