//! Integration tests for the trading system.
//! These tests drive the public API end to end: webhook -> queue -> engine -> status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::json;
use tokio::sync::watch;

use signal_trader::api::{self, AppState};
use signal_trader::exchange::symbols::TradingPair;
use signal_trader::exchange::traits::{ExchangeGateway, ExchangeResult};
use signal_trader::exchange::types::{MarketOrder, OrderAck};
use signal_trader::services::engine::{EngineSettings, StatusSnapshot, TradingEngine};
use signal_trader::services::ledger::Ledger;
use signal_trader::services::receiver::SignalReceiver;
use signal_trader::services::reporting::TradeReporter;
use signal_trader::{Action, AppConfig, EventBus, ExchangeError, SignalQueue, TradingMode};

/// Quotes whatever price the test sets; never fills anything.
struct QuoteOnly {
    price: Mutex<f64>,
    balances: HashMap<String, f64>,
}

impl QuoteOnly {
    fn new(price: f64) -> Self {
        Self {
            price: Mutex::new(price),
            balances: HashMap::new(),
        }
    }

    fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = price;
    }
}

#[async_trait]
impl ExchangeGateway for QuoteOnly {
    fn name(&self) -> &'static str {
        "quote-only"
    }

    async fn fetch_price(&self, _symbol: &str) -> ExchangeResult<f64> {
        Ok(*self.price.lock().unwrap())
    }

    async fn fetch_balance(&self, currency: &str) -> ExchangeResult<f64> {
        Ok(self.balances.get(currency).copied().unwrap_or(0.0))
    }

    async fn place_market_order(&self, _order: &MarketOrder) -> ExchangeResult<OrderAck> {
        Err(ExchangeError::UnexpectedResponse("orders disabled".to_string()))
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn text_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers
}

async fn wait_until(
    status: &mut watch::Receiver<StatusSnapshot>,
    f: impl FnMut(&StatusSnapshot) -> bool,
) -> bool {
    tokio::time::timeout(Duration::from_secs(2), status.wait_for(f))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

/// Test the complete flow from webhook to a profitable cycle
#[tokio::test]
async fn test_webhook_to_cycle_flow() {
    let config = AppConfig::from_yaml_str("symbol: XRP/USDT\nfixed_amount: 1000\n").unwrap();
    let gateway = Arc::new(QuoteOnly::new(0.5));
    let bus = EventBus::default();

    let history = std::env::temp_dir()
        .join(format!("signal_trader_it_{}", uuid::Uuid::new_v4()))
        .join("trade_history_xrp_usdt.jsonl");
    let reporter = TradeReporter::new(history.clone());
    reporter.start(bus.clone()).await;

    let (queue, consumer) = SignalQueue::unbounded();
    let (mut engine, status_rx) = TradingEngine::from_config(&config, gateway.clone(), bus).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(async move {
        let result = engine.run(consumer, shutdown_rx).await;
        (engine, result)
    });

    let state = Arc::new(AppState {
        receiver: SignalReceiver::new(queue),
        status: status_rx.clone(),
        exchange: gateway.clone(),
    });
    let mut status = status_rx;

    // Liveness
    let banner = api::index(State(state.clone())).await;
    assert_eq!(banner, "TradingView Webhook Server is running for xrp_usdt!");

    // A BUY before any SELL is acknowledged but does nothing
    let ack = api::webhook(State(state.clone()), text_headers(), Bytes::from_static(b"BUY")).await;
    assert!(ack.0.success);

    let ack = api::webhook(
        State(state.clone()),
        json_headers(),
        Bytes::from_static(br#"{"action": "sell"}"#),
    )
    .await;
    assert!(ack.0.success);
    assert_eq!(ack.0.message, "SELL signal queued");
    assert!(wait_until(&mut status, |s| s.last_action == Action::Sell).await);

    gateway.set_price(0.4);
    let ack = api::webhook(
        State(state.clone()),
        json_headers(),
        Bytes::from_static(br#"{"signal": "LONG"}"#),
    )
    .await;
    assert!(ack.0.success);
    assert!(wait_until(&mut status, |s| s.cycles == 1).await);

    let report = api::status(State(state.clone())).await.0;
    assert_eq!(report.bot_id, "xrp_usdt");
    assert_eq!(report.symbol, "XRP/USDT");
    assert_eq!(report.mode, TradingMode::Demo);
    assert_eq!(report.last_action, Action::Buy);
    assert_eq!(report.current_price, Some(0.4));
    assert_eq!(report.trades, 2);
    assert_eq!(report.cycles, 1);
    assert_eq!(report.base_balance, Some(1000.0));
    assert!((report.quote_balance.unwrap() - 100.0).abs() < 1e-9);
    assert!((report.total_profit - 100.0).abs() < 1e-9);
    assert_eq!(report.pending_signals, 0);

    let body = serde_json::to_value(&report).unwrap();
    assert_eq!(body["last_action"], json!("BUY"));
    assert_eq!(body["mode"], json!("demo"));

    shutdown_tx.send(true).unwrap();
    let (engine, result) = engine_task.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(engine.ledger().trades().len(), 2);

    // Reporter writes asynchronously
    let mut lines = 0;
    for _ in 0..100 {
        lines = std::fs::read_to_string(&history)
            .map(|s| s.lines().count())
            .unwrap_or(0);
        if lines == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(lines, 3);
    assert!((reporter.summary().total_profit - 100.0).abs() < 1e-9);

    let _ = std::fs::remove_dir_all(history.parent().unwrap());
}

/// Bad payloads are answered, never queued
#[tokio::test]
async fn test_webhook_rejects_garbage() {
    let gateway = Arc::new(QuoteOnly::new(1.0));
    let (queue, _consumer) = SignalQueue::unbounded();
    let settings = EngineSettings {
        bot_id: "eth_usdt".to_string(),
        fixed_amount: 1.0,
        poll_interval: Duration::from_millis(10),
        max_consecutive_faults: 5,
    };
    let ledger = Ledger::simulated(TradingPair::parse("ETH/USDT").unwrap(), 1.0, 0.0);
    let (_engine, status_rx) = TradingEngine::new(settings, gateway.clone(), ledger, EventBus::default());

    let state = Arc::new(AppState {
        receiver: SignalReceiver::new(queue),
        status: status_rx,
        exchange: gateway,
    });

    let ack = api::webhook(
        State(state.clone()),
        json_headers(),
        Bytes::from_static(br#"{"ticker": "ETHUSDT"}"#),
    )
    .await;
    assert!(!ack.0.success);
    assert!(ack.0.message.contains("Could not extract signal type"));

    let ack = api::webhook(State(state.clone()), HeaderMap::new(), Bytes::new()).await;
    assert!(!ack.0.success);
    assert_eq!(ack.0.message, "Empty signal payload");

    let report = api::status(State(state)).await.0;
    assert_eq!(report.pending_signals, 0);
    assert_eq!(report.last_action, Action::Buy);
    assert_eq!(report.base_balance, Some(1.0));
}

/// Shutdown lets the engine finish and leaves queued work visible
#[tokio::test]
async fn test_shutdown_stops_engine_cleanly() {
    let config = AppConfig::from_yaml_str(
        "symbol: XRP/USDT\nfixed_amount: 10\nengine:\n  poll_interval_ms: 20\n",
    )
    .unwrap();
    let gateway = Arc::new(QuoteOnly::new(0.5));
    let (queue, consumer) = SignalQueue::unbounded();
    let (mut engine, _status) =
        TradingEngine::from_config(&config, gateway, EventBus::default()).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { engine.run(consumer, shutdown_rx).await });
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("engine did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(queue.is_empty());
}
