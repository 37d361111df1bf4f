//! Exchange mark-price WebSocket feeds (Binance USD-M futures, Bybit v5 linear)

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use dexai_core::{ExchangeConfig, FetchError, FetchResult};

use crate::http::de::{value_to_f64, value_to_i64};
use crate::ticker_state::TickerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerVenue {
    Binance,
    Bybit,
}

impl TickerVenue {
    pub fn name(&self) -> &'static str {
        match self {
            TickerVenue::Binance => "binance",
            TickerVenue::Bybit => "bybit",
        }
    }

    pub fn ws_url(&self, config: &ExchangeConfig) -> String {
        match self {
            TickerVenue::Binance => config.binance_ws_url.clone(),
            TickerVenue::Bybit => config.bybit_ws_url.clone(),
        }
    }

    /// Subscription frame for `symbols` (`LINKUSDT` style)
    pub fn subscribe_message(&self, symbols: &[String]) -> Value {
        match self {
            TickerVenue::Binance => json!({
                "method": "SUBSCRIBE",
                "params": symbols
                    .iter()
                    .map(|s| format!("{}@markPrice", s.to_lowercase()))
                    .collect::<Vec<_>>(),
                "id": 1,
            }),
            TickerVenue::Bybit => json!({
                "op": "subscribe",
                "args": symbols
                    .iter()
                    .map(|s| format!("tickers.{}", s.to_uppercase()))
                    .collect::<Vec<_>>(),
            }),
        }
    }

    /// Application-level keepalive; Binance relies on protocol pings
    fn heartbeat(&self) -> Option<String> {
        match self {
            TickerVenue::Binance => None,
            TickerVenue::Bybit => Some(json!({"op": "ping"}).to_string()),
        }
    }
}

impl std::fmt::Display for TickerVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerUpdate {
    pub venue: TickerVenue,
    pub symbol: String,
    pub mark_price: f64,
    pub index_price: Option<f64>,
    /// Exchange event time, epoch ms
    pub event_time: i64,
}

/// Decode one text frame. Acks, pongs and deltas without a mark price are `Ok(None)`.
pub fn parse_message(venue: TickerVenue, text: &str) -> FetchResult<Option<TickerUpdate>> {
    let json: Value = serde_json::from_str(text).map_err(FetchError::decode)?;

    match venue {
        TickerVenue::Binance => {
            if json.get("e").and_then(Value::as_str) != Some("markPriceUpdate") {
                if json.get("id").is_some() {
                    debug!("binance subscription ack: {}", text);
                }
                return Ok(None);
            }
            let symbol = json
                .get("s")
                .and_then(Value::as_str)
                .ok_or_else(|| FetchError::Decode("binance markPrice without symbol".into()))?;
            let mark_price = json
                .get("p")
                .and_then(value_to_f64)
                .ok_or_else(|| FetchError::Decode(format!("binance {symbol}: bad mark price")))?;

            Ok(Some(TickerUpdate {
                venue,
                symbol: symbol.to_uppercase(),
                mark_price,
                index_price: json.get("i").and_then(value_to_f64),
                event_time: json.get("E").and_then(value_to_i64).unwrap_or_default(),
            }))
        }
        TickerVenue::Bybit => {
            if json.get("op").is_some() {
                if json.get("success").and_then(Value::as_bool) == Some(false) {
                    warn!("bybit rejected {}: {}", json["op"], json["ret_msg"]);
                }
                return Ok(None);
            }
            let Some(data) = json.get("data") else {
                return Ok(None);
            };
            let Some(mark_price) = data.get("markPrice").and_then(value_to_f64) else {
                return Ok(None);
            };
            let symbol = data
                .get("symbol")
                .and_then(Value::as_str)
                .or_else(|| {
                    json.get("topic")
                        .and_then(Value::as_str)
                        .and_then(|t| t.strip_prefix("tickers."))
                })
                .ok_or_else(|| FetchError::Decode("bybit ticker without symbol".into()))?;

            Ok(Some(TickerUpdate {
                venue,
                symbol: symbol.to_uppercase(),
                mark_price,
                index_price: data.get("indexPrice").and_then(value_to_f64),
                event_time: json.get("ts").and_then(value_to_i64).unwrap_or_default(),
            }))
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub venue: TickerVenue,
    pub ws_url: String,
    pub symbols: Vec<String>,
    pub reconnect_delay: Duration,
    /// Consecutive failed connections before the feed gives up
    pub max_reconnects: u32,
    pub ping_interval: Duration,
}

impl FeedConfig {
    pub fn new(venue: TickerVenue, exchanges: &ExchangeConfig, symbols: Vec<String>) -> Self {
        Self {
            venue,
            ws_url: venue.ws_url(exchanges),
            symbols,
            reconnect_delay: Duration::from_secs(5),
            max_reconnects: 10,
            ping_interval: Duration::from_secs(20),
        }
    }
}

enum Disconnect {
    ConsumerGone,
    ServerClosed,
}

pub struct TickerFeed {
    config: FeedConfig,
    state: Arc<TickerState>,
}

impl TickerFeed {
    pub fn new(config: FeedConfig, state: Arc<TickerState>) -> Self {
        Self { config, state }
    }

    pub fn venue(&self) -> TickerVenue {
        self.config.venue
    }

    /// Run the feed on its own task
    pub fn spawn(self, updates_tx: mpsc::Sender<TickerUpdate>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(updates_tx).await })
    }

    /// Connect, stream and reconnect until the receiver is dropped or
    /// `max_reconnects` consecutive attempts fail
    pub async fn run(&self, updates_tx: mpsc::Sender<TickerUpdate>) {
        let venue = self.config.venue;
        let mut reconnect_count = 0;

        loop {
            match self.connect_and_listen(&updates_tx, &mut reconnect_count).await {
                Ok(Disconnect::ConsumerGone) => {
                    info!("{} ticker feed stopped: receiver dropped", venue);
                    break;
                }
                Ok(Disconnect::ServerClosed) => {
                    warn!("{} ticker feed closed by server", venue);
                }
                Err(e) => {
                    error!("{} ticker feed error: {}", venue, e);
                }
            }

            reconnect_count += 1;
            if reconnect_count > self.config.max_reconnects {
                error!("Max reconnects reached for {} ticker feed", venue);
                break;
            }
            warn!(
                "Reconnecting {} in {:?} (attempt {}/{})",
                venue, self.config.reconnect_delay, reconnect_count, self.config.max_reconnects
            );
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn connect_and_listen(
        &self,
        updates_tx: &mpsc::Sender<TickerUpdate>,
        reconnect_count: &mut u32,
    ) -> FetchResult<Disconnect> {
        let venue = self.config.venue;
        info!("Connecting to {} at {}", venue, self.config.ws_url);

        let (ws_stream, _) = connect_async(self.config.ws_url.as_str())
            .await
            .map_err(FetchError::transport)?;
        let (mut write, mut read) = ws_stream.split();
        *reconnect_count = 0;

        let subscribe = venue.subscribe_message(&self.config.symbols);
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(FetchError::transport)?;
        info!("Subscribed to {} tickers: {:?}", venue, self.config.symbols);

        let mut heartbeat = tokio::time::interval(self.config.ping_interval);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Some(ping) = venue.heartbeat() {
                        write.send(Message::Text(ping)).await.map_err(FetchError::transport)?;
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match parse_message(venue, &text) {
                        Ok(Some(update)) => {
                            self.state.update(update.clone());
                            if updates_tx.send(update).await.is_err() {
                                return Ok(Disconnect::ConsumerGone);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => debug!("{} skipped frame: {}", venue, e),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await.map_err(FetchError::transport)?;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(Disconnect::ServerClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(FetchError::transport(e)),
                },
            }
        }
    }
}
