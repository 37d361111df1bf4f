use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dexai_aggregator::{compare_price_sources, PriceAggregator};
use dexai_core::{AppConfig, PriceAggregatorOverrides, PriceSourceKind, SourcePrice};

const LINK_BSC: &str = "0xf8a0bf9cf54bb92f17374d9e9a321e6a111a51bd";

fn app_config(server: &MockServer) -> AppConfig {
    let mut app = AppConfig::default();
    app.http.max_retries = 0;
    app.http.retry_delay_ms = 0;
    app.coingecko.base_url = server.uri();
    app.exchanges.bybit_url = server.uri();
    app.exchanges.binance_url = server.uri();
    app.exchanges.bitget_url = server.uri();
    app
}

async fn mount_bybit_link(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v5/market/mark-price-kline"))
        .and(query_param("symbol", "LINKUSDT"))
        .and(query_param("interval", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "symbol": "LINKUSDT",
                "category": "linear",
                "list": [
                    ["1700000180000", "14.30", "14.40", "14.20", "14.35"],
                    ["1700000120000", "14.20", "14.30", "14.10", "14.30"],
                    ["1700000060000", "14.00", "14.20", "13.90", "14.20"],
                    ["1700000000000", "13.90", "14.00", "13.80", "14.00"]
                ]
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn bybit_only_link_history_is_ascending() {
    let server = MockServer::start().await;
    mount_bybit_link(&server).await;

    let aggregator = assert_ok!(PriceAggregator::from_app_config(&app_config(&server)));
    let overrides = PriceAggregatorOverrides::only(&[PriceSourceKind::Bybit]);
    let data = aggregator
        .get_multi_source_token_price(LINK_BSC, Some("LINK"), "bsc", Some(&overrides))
        .await;

    assert_eq!(data.source_kinds(), vec![PriceSourceKind::Bybit]);
    let bybit = data.get(PriceSourceKind::Bybit).unwrap();
    let timestamps: Vec<_> = bybit.historical_data.iter().map(|p| p.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(bybit.historical_data.len(), 4);

    let last = bybit.historical_data.last().unwrap();
    assert_eq!(bybit.current_price, last.price);
    assert_eq!(bybit.current_price, 14.35);
    assert!(bybit.historical_data.iter().all(|p| p.source == "bybit"));
}

#[tokio::test]
async fn failing_sources_never_fail_the_call() {
    dexai_core::telemetry::init_tracing();
    let server = MockServer::start().await;
    mount_bybit_link(&server).await;

    // coingecko does not list the contract
    Mock::given(method("GET"))
        .and(path_regex(r"^/coins/binance-smart-chain/contract/.*/market_chart$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "coin not found"})))
        .mount(&server)
        .await;
    // binance is down
    Mock::given(method("GET"))
        .and(path("/fapi/v1/markPriceKlines"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    // bitget answers with something unexpected
    Mock::given(method("GET"))
        .and(path("/api/v2/mix/market/history-mark-candles"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let aggregator = assert_ok!(PriceAggregator::from_app_config(&app_config(&server)));
    let data = aggregator
        .get_multi_source_token_price(LINK_BSC, Some("link"), "bsc", None)
        .await;

    assert_eq!(
        data.source_kinds(),
        vec![PriceSourceKind::Bybit, PriceSourceKind::Binance, PriceSourceKind::Bitget]
    );
    assert_eq!(data.get(PriceSourceKind::Binance), Some(&SourcePrice::empty()));
    assert_eq!(data.get(PriceSourceKind::Bitget), Some(&SourcePrice::empty()));

    let comparisons = compare_price_sources(&data);
    assert_eq!(comparisons[0].source, PriceSourceKind::Bybit);
    assert_eq!(comparisons[0].difference, 0.0);
    assert!((comparisons[1].difference + 14.35).abs() < 1e-9);
    assert!((comparisons[1].percentage_diff + 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn exchanges_without_symbol_make_no_requests() {
    let server = MockServer::start().await;
    let aggregator = assert_ok!(PriceAggregator::from_app_config(&app_config(&server)));
    let overrides = PriceAggregatorOverrides::only(&[
        PriceSourceKind::Bybit,
        PriceSourceKind::Binance,
        PriceSourceKind::Bitget,
    ]);

    let data = aggregator
        .get_multi_source_token_price(LINK_BSC, None, "bsc", Some(&overrides))
        .await;

    assert_eq!(data.len(), 3);
    assert!(data.sources.iter().all(|e| e.price == SourcePrice::empty()));
    assert!(server.received_requests().await.unwrap().is_empty());
}
