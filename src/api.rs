use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::config::TradingMode;
use crate::error::TradingError;
use crate::exchange::traits::ExchangeGateway;
use crate::services::engine::StatusSnapshot;
use crate::services::receiver::{SignalReceiver, WebhookAck};
use crate::shutdown::wait_for_shutdown;
use crate::signal::Action;

pub struct AppState {
    pub receiver: SignalReceiver,
    /// Latest engine snapshot; read-only from the HTTP side
    pub status: watch::Receiver<StatusSnapshot>,
    pub exchange: Arc<dyn ExchangeGateway>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusResponse {
    pub bot_id: String,
    pub symbol: String,
    pub current_price: Option<f64>,
    pub last_action: Action,
    pub base_balance: Option<f64>,
    pub quote_balance: Option<f64>,
    pub total_profit: f64,
    pub mode: TradingMode,
    pub trades: usize,
    pub cycles: usize,
    pub pending_signals: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/webhook", post(webhook))
        .route("/status", get(status))
        .with_state(state)
}

/// Serve until `shutdown` flips; in-flight requests are allowed to finish.
pub async fn run_server(
    state: Arc<AppState>,
    bind_addr: String,
    shutdown: watch::Receiver<bool>,
) -> Result<(), TradingError> {
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| TradingError::Config(format!("Failed to bind {}: {}", bind_addr, e)))?;
    info!("API Server listening on {}", bind_addr);
    info!("Webhook URL: http://{}/webhook", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .map_err(|e| TradingError::Internal(format!("API server error: {}", e)))?;

    info!("API Server stopped");
    Ok(())
}

pub async fn index(State(state): State<Arc<AppState>>) -> String {
    let bot_id = state.status.borrow().bot_id.clone();
    format!("TradingView Webhook Server is running for {}!", bot_id)
}

/// Always 200; parse failures are reported in the body.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    Json(state.receiver.receive(content_type, &body))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.status.borrow().clone();

    let current_price = state.exchange.fetch_price(&snapshot.symbol).await.ok();

    let (base_balance, quote_balance) = match snapshot.mode {
        TradingMode::Demo => (snapshot.base_balance, snapshot.quote_balance),
        TradingMode::Live => {
            let (base, quote) = snapshot
                .symbol
                .split_once('/')
                .unwrap_or((snapshot.symbol.as_str(), ""));
            (
                state.exchange.fetch_balance(base).await.ok().or(snapshot.base_balance),
                state.exchange.fetch_balance(quote).await.ok().or(snapshot.quote_balance),
            )
        }
    };

    Json(StatusResponse {
        bot_id: snapshot.bot_id,
        symbol: snapshot.symbol,
        current_price,
        last_action: snapshot.last_action,
        base_balance,
        quote_balance,
        total_profit: snapshot.total_profit,
        mode: snapshot.mode,
        trades: snapshot.trades,
        cycles: snapshot.cycles,
        pending_signals: state.receiver.pending(),
    })
}
