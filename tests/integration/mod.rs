//! Integration tests for the order book mirror and execution simulator.
//!
//! The feed tests run against a local WebSocket server on 127.0.0.1 that
//! speaks the OKX subscribe/push protocol; no network access is needed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use okx_trade_sim::feed::{OkxBookFeed, ReconnectConfig};
use okx_trade_sim::orderbook::{BookUpdate, LevelUpdate, OrderBook, PriceLevel, SharedOrderBook};
use okx_trade_sim::simulator::{run_round, Direction, ExecutionSimulator};

const BOOKS5_PUSH: &str = r#"{
    "arg": {"channel": "books5", "instId": "BTC-USDT"},
    "data": [{
        "asks": [["101.0", "1.0", "0", "2"], ["102.0", "2.0", "0", "1"]],
        "bids": [["100.0", "1.0", "0", "3"], ["99.0", "2.0", "0", "1"]],
        "instId": "BTC-USDT",
        "ts": "1700000000000",
        "seqId": 42
    }]
}"#;

fn sample_book() -> OrderBook {
    let mut book = OrderBook::new();
    book.apply(&BookUpdate::snapshot([
        LevelUpdate::bid(dec!(100), dec!(1)),
        LevelUpdate::bid(dec!(99), dec!(2)),
        LevelUpdate::ask(dec!(101), dec!(1)),
        LevelUpdate::ask(dec!(102), dec!(2)),
    ]));
    book
}

#[test]
fn buy_walks_asks_and_charges_fee() {
    let sim = ExecutionSimulator::new(sample_book());
    let report = sim.simulate(Direction::Buy, dec!(2)).unwrap();

    assert_eq!(report.executed_quantity, dec!(2));
    assert_eq!(report.total_cost, dec!(203));
    assert_eq!(report.average_price, dec!(101.5));
    assert_eq!(report.slippage, dec!(0.5));
    assert_eq!(report.fee, dec!(0.1218));
    assert_eq!(report.remaining_quantity, Decimal::ZERO);
}

#[test]
fn sell_walks_bids_from_the_top() {
    let sim = ExecutionSimulator::new(sample_book()).with_fee_rate(dec!(0.001));
    let report = sim.simulate(Direction::Sell, dec!(2)).unwrap();

    assert_eq!(report.total_cost, dec!(199));
    assert_eq!(report.average_price, dec!(99.5));
    assert_eq!(report.slippage, dec!(-0.5));
    assert_eq!(report.fee, dec!(0.199));
}

#[test]
fn oversized_order_reports_remaining_quantity() {
    let sim = ExecutionSimulator::new(sample_book());
    let report = sim.simulate(Direction::Buy, dec!(5)).unwrap();

    assert!(report.is_partial());
    assert_eq!(report.executed_quantity, dec!(3));
    assert_eq!(report.remaining_quantity, dec!(2));
    assert_eq!(report.levels_consumed, 2);
}

#[test]
fn delta_updates_change_the_simulated_price() {
    let book = SharedOrderBook::from_book(sample_book());
    let sim = ExecutionSimulator::new(book.clone());

    book.apply(&BookUpdate::delta([
        LevelUpdate::ask(dec!(101), Decimal::ZERO),
        LevelUpdate::ask(dec!(100.5), dec!(3)),
    ]));

    let report = sim.simulate_buy(dec!(1)).unwrap();
    assert_eq!(report.average_price, dec!(100.5));
    assert_eq!(report.best_price, Some(dec!(100.5)));
}

#[test]
fn round_covers_both_directions() {
    let sim = ExecutionSimulator::new(SharedOrderBook::from_book(sample_book()));
    let round = run_round(&sim, dec!(1)).unwrap();

    assert_eq!(round.buy.average_price, dec!(101));
    assert_eq!(round.sell.average_price, dec!(100));
    assert_eq!(round.buy.slippage, Decimal::ZERO);
}

#[tokio::test]
async fn feed_mirrors_pushed_levels_into_the_book() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let subscribe = match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            other => panic!("expected subscribe frame, got {:?}", other),
        };

        ws.send(Message::Text(
            r#"{"event":"subscribe","arg":{"channel":"books5","instId":"BTC-USDT"},"connId":"a1"}"#
                .to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(BOOKS5_PUSH.to_string()))
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => received.push(text),
                Message::Close(_) => break,
                _ => {}
            }
        }
        (subscribe, received)
    });

    let feed = Arc::new(OkxBookFeed::with_reconnect_config(
        format!("ws://{}", addr),
        "BTC-USDT",
        "books5",
        ReconnectConfig::default(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (updates, feed_handle) = Arc::clone(&feed).spawn(16, shutdown_rx);

    let book = SharedOrderBook::new();
    let writer = tokio::spawn(book.clone().consume(updates));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !book.is_ready() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("book never became two-sided");

    assert_eq!(
        book.snapshot_asks(),
        vec![
            PriceLevel::new(dec!(101.0), dec!(1.0)),
            PriceLevel::new(dec!(102.0), dec!(2.0)),
        ]
    );
    assert_eq!(
        book.snapshot_bids(),
        vec![
            PriceLevel::new(dec!(100.0), dec!(1.0)),
            PriceLevel::new(dec!(99.0), dec!(2.0)),
        ]
    );
    assert_eq!(book.with_book(|b| b.last_update_ms()), Some(1_700_000_000_000));

    let sim = ExecutionSimulator::new(book.clone());
    let report = sim.simulate(Direction::Buy, dec!(2)).unwrap();
    assert_eq!(report.average_price, dec!(101.5));

    shutdown_tx.send(true).unwrap();
    feed_handle.await.unwrap();
    let applied = writer.await.unwrap();
    assert_eq!(applied, 1);
    assert_eq!(feed.messages_forwarded(), 1);

    let (subscribe, received) = server.await.unwrap();
    let subscribe: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(subscribe["op"], "subscribe");
    assert_eq!(subscribe["args"][0]["channel"], "books5");
    assert_eq!(subscribe["args"][0]["instId"], "BTC-USDT");
    assert!(received.iter().any(|m| m.contains("unsubscribe")));
}

#[tokio::test]
async fn feed_stops_promptly_when_server_is_unreachable() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let feed = Arc::new(OkxBookFeed::new(
        format!("ws://{}", addr),
        "BTC-USDT",
        "books5",
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (mut updates, feed_handle) = Arc::clone(&feed).spawn(4, shutdown_rx);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!feed.is_connected());
    assert!(feed.reconnect_attempts() >= 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), feed_handle)
        .await
        .expect("feed did not stop")
        .unwrap();
    assert!(updates.recv().await.is_none());
}

#[tokio::test]
async fn backoff_resets_after_each_successful_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Every session subscribes and is then closed by the server with a code,
    // which the client reports as an error.
    let server = tokio::spawn(async move {
        let mut accepted_at = Vec::new();
        for _ in 0..3 {
            let (stream, _) = listener.accept().await.unwrap();
            accepted_at.push(Instant::now());
            let mut ws = accept_async(stream).await.unwrap();

            match ws.next().await {
                Some(Ok(Message::Text(text))) => assert!(text.contains("subscribe")),
                other => panic!("expected subscribe frame, got {:?}", other),
            }

            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        }
        accepted_at
    });

    let reconnect = ReconnectConfig {
        initial_delay_ms: 100,
        max_delay_s: 30,
        backoff_multiplier: 4.0,
        heartbeat_interval_s: 25,
    };
    let feed = Arc::new(OkxBookFeed::with_reconnect_config(
        format!("ws://{}", addr),
        "BTC-USDT",
        "books5",
        reconnect,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (_updates, feed_handle) = Arc::clone(&feed).spawn(4, shutdown_rx);

    let accepted_at = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("feed did not reconnect three times")
        .unwrap();

    // Without a reset the second gap would be the 400ms second-attempt delay.
    for pair in accepted_at.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap < Duration::from_millis(300), "gap between sessions was {:?}", gap);
    }
    assert!(feed.reconnect_attempts() >= 2);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), feed_handle)
        .await
        .expect("feed did not stop")
        .unwrap();
}
