//! Multi-source price aggregation
//!
//! Fans a price query out to every enabled source, one task per source, and
//! merges whatever settles into a single `MultiSourcePriceData`. A failing or
//! panicking source becomes a zeroed placeholder; the call itself never fails.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use dexai_core::{
    resolve_platform, AppConfig, FetchResult, MultiSourcePriceData, PriceAggregatorConfig,
    PriceAggregatorOverrides, PriceQuery, PriceSourceAdapter, PriceSourceKind, SourcePrice,
};
use dexai_sources::{BinanceClient, BitgetClient, BybitClient, CoinGeckoClient, HttpClient, OkxDexClient};

/// Registers adapters and the base configuration
#[derive(Default)]
pub struct PriceAggregatorBuilder {
    config: PriceAggregatorConfig,
    adapters: HashMap<PriceSourceKind, Arc<dyn PriceSourceAdapter>>,
}

impl PriceAggregatorBuilder {
    pub fn config(mut self, config: PriceAggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register `adapter` under its own kind, replacing any earlier one
    pub fn adapter<A: PriceSourceAdapter + 'static>(self, adapter: A) -> Self {
        self.shared_adapter(Arc::new(adapter))
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn PriceSourceAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn build(self) -> PriceAggregator {
        PriceAggregator {
            config: self.config,
            adapters: self.adapters,
        }
    }
}

pub struct PriceAggregator {
    config: PriceAggregatorConfig,
    adapters: HashMap<PriceSourceKind, Arc<dyn PriceSourceAdapter>>,
}

impl PriceAggregator {
    pub fn builder() -> PriceAggregatorBuilder {
        PriceAggregatorBuilder::default()
    }

    /// Wire the real vendor clients. OKX is only registered when key sets
    /// are configured.
    pub fn from_app_config(app: &AppConfig) -> FetchResult<Self> {
        let http = HttpClient::new(&app.http)?;

        let mut builder = Self::builder()
            .config(app.aggregator.clone())
            .adapter(CoinGeckoClient::new(http.clone(), &app.coingecko))
            .adapter(BybitClient::from_config(http.clone(), &app.exchanges))
            .adapter(BinanceClient::from_config(http.clone(), &app.exchanges))
            .adapter(BitgetClient::from_config(http.clone(), &app.exchanges));

        if app.okx.credentials()?.is_empty() {
            debug!("No OKX key sets configured, okx source unavailable");
        } else {
            builder = builder.adapter(OkxDexClient::new(http, &app.okx)?);
        }

        Ok(builder.build())
    }

    /// Stored configuration; per-call overrides never change it
    pub fn config(&self) -> &PriceAggregatorConfig {
        &self.config
    }

    pub fn registered_sources(&self) -> Vec<PriceSourceKind> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Current and historical prices for one token from every enabled source
    ///
    /// `platform` is a chain alias or CoinGecko platform id. Entries come back
    /// in priority order. A source that errors is present with a zero price;
    /// a source that has no data at all (CoinGecko not listing the contract)
    /// is absent.
    pub async fn get_multi_source_token_price(
        &self,
        token_address: &str,
        token_symbol: Option<&str>,
        platform: &str,
        overrides: Option<&PriceAggregatorOverrides>,
    ) -> MultiSourcePriceData {
        let start = Instant::now();
        let config = self.config.merged(overrides);
        let query = Arc::new(PriceQuery {
            token_address: token_address.to_string(),
            token_symbol: token_symbol.map(str::to_string),
            platform: resolve_platform(platform),
            days: config.default_days,
            currency: config.default_currency.clone(),
        });

        let enabled = config.enabled_sources();
        info!(
            "Fetching {} ({}) on {} from {} source(s)",
            token_address,
            token_symbol.unwrap_or("-"),
            query.platform,
            enabled.len()
        );

        let tasks = enabled.into_iter().map(|source| {
            let kind = source.kind;
            let adapter = self.adapters.get(&kind).cloned();
            let query = Arc::clone(&query);

            async move {
                let Some(adapter) = adapter else {
                    error!("Price source {} is enabled but no adapter is registered", kind);
                    return (kind, Some(SourcePrice::empty()));
                };

                let task = tokio::spawn(async move { adapter.fetch(&query).await });
                let price = match task.await {
                    Ok(Ok(price)) => price,
                    Ok(Err(e)) => {
                        error!("Error fetching price from {}: {}", kind, e);
                        Some(SourcePrice::empty())
                    }
                    Err(e) => {
                        error!("Price task for {} did not complete: {}", kind, e);
                        Some(SourcePrice::empty())
                    }
                };
                (kind, price)
            }
        });

        let mut data = MultiSourcePriceData::new(token_address);
        for (kind, price) in join_all(tasks).await {
            match price {
                Some(price) => {
                    debug!(
                        "{}: current {} with {} points",
                        kind,
                        price.current_price,
                        price.historical_data.len()
                    );
                    data.insert(kind, price);
                }
                None => warn!("{} has no price data for {}", kind, token_address),
            }
        }

        info!(
            "Aggregated {} source(s) for {} in {:?}",
            data.len(),
            token_address,
            start.elapsed()
        );
        data
    }
}
