//! Latest exchange ticker values, shared between feed tasks and readers
//!
//! DashMap keyed by (venue, symbol); readers never block the feeds.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::ticker::{TickerUpdate, TickerVenue};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TickerKey {
    pub venue: TickerVenue,
    pub symbol: String,
}

impl TickerKey {
    /// Symbols are stored upper-case (`LINKUSDT`)
    pub fn new(venue: TickerVenue, symbol: &str) -> Self {
        Self {
            venue,
            symbol: symbol.to_uppercase(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TickerEntry {
    pub update: TickerUpdate,
    pub updated_at: Instant,
}

impl TickerEntry {
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.updated_at.elapsed() > max_age
    }
}

#[derive(Debug)]
pub struct TickerState {
    tickers: DashMap<TickerKey, TickerEntry>,
    update_count: AtomicU64,
    last_update: RwLock<Instant>,
}

impl TickerState {
    pub fn new() -> Self {
        Self {
            tickers: DashMap::new(),
            update_count: AtomicU64::new(0),
            last_update: RwLock::new(Instant::now()),
        }
    }

    pub fn update(&self, update: TickerUpdate) {
        let key = TickerKey::new(update.venue, &update.symbol);
        self.tickers.insert(
            key,
            TickerEntry {
                update,
                updated_at: Instant::now(),
            },
        );
        self.update_count.fetch_add(1, Ordering::Relaxed);
        *self.last_update.write() = Instant::now();
    }

    pub fn get(&self, venue: TickerVenue, symbol: &str) -> Option<TickerEntry> {
        self.tickers
            .get(&TickerKey::new(venue, symbol))
            .map(|r| r.value().clone())
    }

    /// Fresh mark prices for `symbol` from every venue that has one
    pub fn mark_prices(&self, symbol: &str, max_age: Duration) -> Vec<(TickerVenue, f64)> {
        let symbol = symbol.to_uppercase();
        let mut prices: Vec<_> = self
            .tickers
            .iter()
            .filter(|e| e.key().symbol == symbol && !e.value().is_stale(max_age))
            .map(|e| (e.key().venue, e.value().update.mark_price))
            .collect();
        prices.sort_by_key(|(venue, _)| venue.name());
        prices
    }

    pub fn cleanup(&self, max_age: Duration) {
        self.tickers.retain(|_, v| !v.is_stale(max_age));
    }

    pub fn stats(&self) -> TickerStateStats {
        TickerStateStats {
            ticker_count: self.tickers.len(),
            update_count: self.update_count.load(Ordering::Relaxed),
            last_update_age: self.last_update.read().elapsed(),
        }
    }
}

impl Default for TickerState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct TickerStateStats {
    pub ticker_count: usize,
    pub update_count: u64,
    pub last_update_age: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn update(venue: TickerVenue, symbol: &str, mark_price: f64) -> TickerUpdate {
        TickerUpdate {
            venue,
            symbol: symbol.to_string(),
            mark_price,
            index_price: None,
            event_time: 0,
        }
    }

    #[test]
    fn test_latest_value_wins() {
        let state = TickerState::new();
        state.update(update(TickerVenue::Binance, "LINKUSDT", 14.0));
        state.update(update(TickerVenue::Binance, "linkusdt", 14.5));
        state.update(update(TickerVenue::Bybit, "LINKUSDT", 14.4));

        let entry = state.get(TickerVenue::Binance, "LinkUsdt").unwrap();
        assert_eq!(entry.update.mark_price, 14.5);
        assert_eq!(
            state.mark_prices("linkusdt", Duration::from_secs(60)),
            vec![(TickerVenue::Binance, 14.5), (TickerVenue::Bybit, 14.4)]
        );

        let stats = state.stats();
        assert_eq!(stats.ticker_count, 2);
        assert_eq!(stats.update_count, 3);
    }

    #[test]
    fn test_cleanup_drops_stale() {
        let state = TickerState::new();
        state.update(update(TickerVenue::Bybit, "ETHUSDT", 3000.0));
        std::thread::sleep(Duration::from_millis(5));

        assert!(state.mark_prices("ETHUSDT", Duration::ZERO).is_empty());
        state.cleanup(Duration::ZERO);
        assert_eq!(state.stats().ticker_count, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let state = Arc::new(TickerState::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        state.update(update(TickerVenue::Binance, "BTCUSDT", (i * 100 + j) as f64));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(state.stats().update_count, 400);
        assert_eq!(state.stats().ticker_count, 1);
    }
}
