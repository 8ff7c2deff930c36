//! Integration tests for the `/info` REST client against a mock server.
//!
//! Each test mounts a mock that only matches the expected request body, so
//! a wrong `type` tag or request shape shows up as a 404 from wiremock.

use hyperliquid::{CandleInterval, HyperliquidError, InfoClient, TakerSide};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_info(server: &MockServer, request: serde_json::Value, response: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/info"))
        .and(body_partial_json(request))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_meta_and_market_labels() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "meta"}),
        json!({"universe": [
            {"name": "BTC", "szDecimals": 5, "maxLeverage": 50},
            {"name": "ETH", "szDecimals": 4, "maxLeverage": 25},
            {"coin": "SOL"}
        ]}),
    )
    .await;

    let client = InfoClient::new(&server.uri());
    let meta = client.meta().await.unwrap();
    assert_eq!(meta.universe.len(), 3);
    assert_eq!(meta.universe[0].sz_decimals, 5);
    assert_eq!(meta.universe[2].name, "SOL");

    let labels = client.markets().await.unwrap();
    assert_eq!(labels, vec!["BTC-USDT", "ETH-USDT", "SOL-USDT"]);
}

#[tokio::test]
async fn test_l2_book_snapshot() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "l2Book", "coin": "BTC"}),
        json!({
            "coin": "BTC",
            "time": 1700000000000u64,
            "levels": [
                [{"px": "64000.0", "sz": "1.5", "n": 3}, {"px": "63999.0", "sz": "0.2", "n": 1}],
                [{"px": "64001.0", "sz": "2.0", "n": 4}]
            ]
        }),
    )
    .await;

    let client = InfoClient::new(&format!("{}/", server.uri()));
    let book = client.l2_book("BTC").await.unwrap();
    assert_eq!(book.coin, "BTC");
    assert_eq!(book.bids().len(), 2);
    assert_eq!(book.asks().len(), 1);
    assert_eq!(book.bids()[0].px, "64000.0");
    assert_eq!(book.bids()[0].n, 3);
}

#[tokio::test]
async fn test_l2_book_missing_side_is_empty() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "l2Book", "coin": "ETH"}),
        json!({"coin": "ETH", "time": 1, "levels": [[{"px": 3000, "sz": 1, "n": 1}]]}),
    )
    .await;

    let book = InfoClient::new(&server.uri()).l2_book("ETH").await.unwrap();
    assert_eq!(book.bids()[0].px, "3000");
    assert!(book.asks().is_empty());
}

#[tokio::test]
async fn test_recent_trades_normalizes_records() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "recentTrades", "req": {"coin": "BTC", "n": 50}}),
        json!([
            {"coin": "BTC", "px": "64000", "sz": "0.1", "side": "B", "time": 2},
            {"p": "63990", "s": "0.3", "buyerIsTaker": false, "t": 1}
        ]),
    )
    .await;

    let trades = InfoClient::new(&server.uri())
        .recent_trades("BTC", 50)
        .await
        .unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].px, dec!(64000));
    assert_eq!(trades[0].side, TakerSide::Buy);
    assert_eq!(trades[1].sz, dec!(0.3));
    assert_eq!(trades[1].side, TakerSide::Sell);
    assert_eq!(trades[1].time, 1);
}

#[tokio::test]
async fn test_recent_trades_non_array_is_empty() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "recentTrades"}),
        json!({"error": "unknown"}),
    )
    .await;

    let trades = InfoClient::new(&server.uri())
        .recent_trades("BTC", 50)
        .await
        .unwrap();
    assert!(trades.is_empty());
}

#[tokio::test]
async fn test_candle_snapshot_request_shape() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "candleSnapshot", "req": {
            "coin": "BTC", "interval": "1h", "startTime": 0, "endTime": 3600000
        }}),
        json!([{
            "t": 0, "T": 3599999, "s": "BTC", "i": "1h",
            "o": "100", "c": "110", "h": "115", "l": "95", "v": "12.5", "n": 42
        }]),
    )
    .await;

    let candles = InfoClient::new(&server.uri())
        .candle_snapshot("BTC", CandleInterval::OneHour, 0, 3_600_000)
        .await
        .unwrap();
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].interval, CandleInterval::OneHour);
    assert_eq!(candles[0].h, dec!(115));
    assert_eq!(candles[0].trades, 42);
}

#[tokio::test]
async fn test_candles_window_ends_now() {
    let server = MockServer::start().await;
    mock_info(
        &server,
        json!({"type": "candleSnapshot", "req": {"coin": "ETH", "interval": "15m"}}),
        json!([]),
    )
    .await;

    let before = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    let candles = InfoClient::new(&server.uri())
        .candles("ETH", CandleInterval::FifteenMinutes, 500)
        .await
        .unwrap();
    assert!(candles.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let start = body["req"]["startTime"].as_u64().unwrap();
    let end = body["req"]["endTime"].as_u64().unwrap();
    assert_eq!(end - start, CandleInterval::FifteenMinutes.millis() * 500);
    assert!(end >= before);
}

#[tokio::test]
async fn test_http_error_maps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = InfoClient::new(&server.uri()).meta().await.unwrap_err();
    match err {
        HyperliquidError::Http { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"universe\": 7}"))
        .mount(&server)
        .await;

    let err = InfoClient::new(&server.uri()).meta().await.unwrap_err();
    assert!(matches!(err, HyperliquidError::Json(_)), "got {err:?}");
}
