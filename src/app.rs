//! Wires the pieces together and runs the bot until shutdown.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::api::{run_server, AppState};
use crate::bus::EventBus;
use crate::config::AppConfig;
use crate::error::TradingError;
use crate::exchange::traits::ExchangeGateway;
use crate::queue::SignalQueue;
use crate::services::engine::TradingEngine;
use crate::services::ledger::Ledger;
use crate::services::receiver::SignalReceiver;
use crate::services::reporting::TradeReporter;

/// End-of-run figures, taken from the engine's ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub bot_id: String,
    pub quote_currency: String,
    pub total_profit: f64,
    pub trades: usize,
    pub cycles: usize,
    pub winning_cycles: usize,
    pub history_path: PathBuf,
    pub summary_path: PathBuf,
}

impl RunReport {
    pub fn from_ledger(bot_id: String, ledger: &Ledger, reporter: &TradeReporter) -> Self {
        Self {
            bot_id,
            quote_currency: ledger.pair().quote.clone(),
            total_profit: ledger.total_profit(),
            trades: ledger.trades().len(),
            cycles: ledger.cycles().len(),
            winning_cycles: ledger.cycles().iter().filter(|c| c.profit > 0.0).count(),
            history_path: reporter.log_path().to_path_buf(),
            summary_path: reporter.summary_path(),
        }
    }

    pub fn win_rate_pct(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }
        self.winning_cycles as f64 / self.cycles as f64 * 100.0
    }

    pub fn log(&self) {
        info!("Bot [{}] stopped.", self.bot_id);
        info!(
            "Total profit: {:.6} {} over {} cycle(s), {} trade(s) (win rate {:.1}%)",
            self.total_profit,
            self.quote_currency,
            self.cycles,
            self.trades,
            self.win_rate_pct()
        );
        info!("Trade history: {}", self.history_path.display());
        info!("Summary: {}", self.summary_path.display());
    }
}

/// Run the engine and the webhook server until `shutdown` resolves or either
/// of them stops on its own.
///
/// An engine fault wins over a server error when both fail.
pub async fn run(
    config: &AppConfig,
    exchange: Arc<dyn ExchangeGateway>,
    shutdown: impl Future<Output = ()>,
) -> Result<RunReport, TradingError> {
    let bot_id = config.bot_id();
    let event_bus = EventBus::default();

    let reporter = TradeReporter::new(config.trade_history_path());
    reporter.start(event_bus.clone()).await;

    let (queue, consumer) = SignalQueue::unbounded();
    let (mut engine, status_rx) = TradingEngine::from_config(config, exchange.clone(), event_bus)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Held until both tasks are joined: the server going away must not look
    // like a closed queue to the engine.
    let producer = queue.clone();

    let engine_shutdown = shutdown_rx.clone();
    let mut engine_task = tokio::spawn(async move {
        let result = engine.run(consumer, engine_shutdown).await;
        (engine, result)
    });

    let app_state = Arc::new(AppState {
        receiver: SignalReceiver::new(queue),
        status: status_rx,
        exchange,
    });
    let mut server_task = tokio::spawn(run_server(app_state, config.bind_addr(), shutdown_rx));

    // Whichever finishes first triggers shutdown of the rest
    let mut engine_done = None;
    let mut server_done = None;
    tokio::select! {
        _ = shutdown => info!("Shutting down..."),
        joined = &mut engine_task => engine_done = Some(joined),
        joined = &mut server_task => server_done = Some(joined),
    }
    let _ = shutdown_tx.send(true);

    let server_joined = match server_done {
        Some(joined) => joined,
        None => server_task.await,
    };
    let server_result = match server_joined {
        Ok(result) => result,
        Err(e) => Err(TradingError::Internal(format!("API server task panicked: {}", e))),
    };
    if let Err(e) = &server_result {
        error!("API server failed: {}", e);
    }

    let engine_joined = match engine_done {
        Some(joined) => joined,
        None => engine_task.await,
    };
    drop(producer);
    let (engine, engine_result) = engine_joined
        .map_err(|e| TradingError::Internal(format!("trading engine task panicked: {}", e)))?;

    let report = RunReport::from_ledger(bot_id, engine.ledger(), &reporter);
    report.log();

    engine_result?;
    server_result?;
    Ok(report)
}
