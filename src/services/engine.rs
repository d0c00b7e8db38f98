//! The trading loop.
//!
//! A single task owns `EngineState` and the `Ledger`. It takes one directive
//! off the queue at a time, quotes the market, and applies the alternating
//! SELL -> BUY state machine: a SELL is only acted on after a BUY and vice
//! versa. Everything that can go wrong with one directive (no price, no
//! balance, rejected order) drops that directive and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::config::{AppConfig, TradingMode};
use crate::constants::events;
use crate::error::TradingError;
use crate::events::{CycleRecord, Event, TradeRecord};
use crate::exchange::symbols::TradingPair;
use crate::exchange::traits::ExchangeGateway;
use crate::exchange::types::Side;
use crate::queue::{Dequeued, SignalConsumer};
use crate::services::ledger::Ledger;
use crate::signal::{Action, Directive};

/// Mutable decision state. Only the engine task touches it.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineState {
    pub last_action: Action,
    /// Exact base amount sold by the last SELL, to be bought back
    pub last_sold_amount: Option<f64>,
    pub last_sell_price: Option<f64>,
}

impl Default for EngineState {
    fn default() -> Self {
        // Start as if we just bought so the first actionable signal is a SELL
        Self {
            last_action: Action::Buy,
            last_sold_amount: None,
            last_sell_price: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    PriceUnavailable,
    BalanceUnavailable,
    NoPendingAmount,
    NothingToSell,
    InsufficientBalance,
    InvalidOrder,
    OrderFailed,
}

/// What happened to one directive
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Executed {
        trade: TradeRecord,
        cycle: Option<CycleRecord>,
    },
    /// Same action as last time; waiting for the opposite signal
    Ignored,
    Skipped(SkipReason),
}

/// Read-only view published after every directive
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub bot_id: String,
    pub symbol: String,
    pub mode: TradingMode,
    pub last_action: Action,
    pub base_balance: Option<f64>,
    pub quote_balance: Option<f64>,
    pub total_profit: f64,
    pub trades: usize,
    pub cycles: usize,
    pub last_sold_amount: Option<f64>,
    pub last_sell_price: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub bot_id: String,
    pub fixed_amount: f64,
    pub poll_interval: Duration,
    pub max_consecutive_faults: u32,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bot_id: config.bot_id(),
            fixed_amount: config.fixed_amount,
            poll_interval: config.poll_interval(),
            max_consecutive_faults: config.engine.max_consecutive_faults.max(1),
        }
    }
}

pub struct TradingEngine {
    settings: EngineSettings,
    gateway: Arc<dyn ExchangeGateway>,
    ledger: Ledger,
    state: EngineState,
    event_bus: EventBus,
    status_tx: watch::Sender<StatusSnapshot>,
    /// Last balances seen from the exchange (live mode)
    last_balances: Option<(f64, f64)>,
}

impl TradingEngine {
    pub fn new(
        settings: EngineSettings,
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Ledger,
        event_bus: EventBus,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let state = EngineState::default();
        let initial = build_snapshot(&settings, &ledger, &state, None);
        let (status_tx, status_rx) = watch::channel(initial);

        let engine = Self {
            settings,
            gateway,
            ledger,
            state,
            event_bus,
            status_tx,
            last_balances: None,
        };
        (engine, status_rx)
    }

    /// Demo mode simulates balances locally; live mode settles on `gateway`.
    pub fn from_config(
        config: &AppConfig,
        gateway: Arc<dyn ExchangeGateway>,
        event_bus: EventBus,
    ) -> Result<(Self, watch::Receiver<StatusSnapshot>), TradingError> {
        let pair = config.pair()?;
        let ledger = match config.mode {
            TradingMode::Demo => {
                let (base, quote) = config.initial_balances();
                Ledger::simulated(pair, base, quote)
            }
            TradingMode::Live => Ledger::on_exchange(pair, gateway.clone()),
        };
        Ok(Self::new(
            EngineSettings::from_config(config),
            gateway,
            ledger,
            event_bus,
        ))
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn pair(&self) -> &TradingPair {
        self.ledger.pair()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        build_snapshot(&self.settings, &self.ledger, &self.state, self.last_balances)
    }

    /// Consume directives until `shutdown` flips to true.
    ///
    /// Returns an error only for faults the loop cannot recover from: the
    /// queue closing underneath it, or too many internal faults in a row.
    pub async fn run(
        &mut self,
        mut consumer: SignalConsumer,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), TradingError> {
        info!(
            "[ENGINE] Trading loop started for {} ({} mode). Waiting for signals...",
            self.pair(),
            self.ledger.mode()
        );
        info!("[ENGINE] Last action: {}", self.state.last_action);

        let mut consecutive_faults: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("[ENGINE] Shutdown requested, leaving trading loop");
                break;
            }

            let directive = match consumer.dequeue_timeout(self.settings.poll_interval).await {
                Dequeued::Directive(directive) => directive,
                Dequeued::Empty => continue,
                Dequeued::Closed => {
                    if *shutdown.borrow() {
                        break;
                    }
                    error!(event = events::INTERNAL_FAULT, "[ENGINE] Signal queue closed unexpectedly");
                    return Err(TradingError::Internal("signal queue closed".to_string()));
                }
            };

            match self.process(directive).await {
                Ok(_) => consecutive_faults = 0,
                Err(e) => {
                    consecutive_faults += 1;
                    error!(
                        event = events::INTERNAL_FAULT,
                        "[ENGINE] Unexpected error in trading loop ({}/{}): {}",
                        consecutive_faults,
                        self.settings.max_consecutive_faults,
                        e
                    );
                    if consecutive_faults >= self.settings.max_consecutive_faults {
                        return Err(e);
                    }
                }
            }
        }

        let backlog = consumer.backlog();
        if backlog > 0 {
            warn!("[ENGINE] {} queued signal(s) left unprocessed at shutdown", backlog);
        }
        Ok(())
    }

    /// Run one directive to completion. Directive-level failures come back as
    /// `Outcome::Skipped`; `Err` means an internal fault.
    pub async fn process(&mut self, directive: Directive) -> Result<Outcome, TradingError> {
        info!(
            "[ENGINE] Processing signal: {} received at {}",
            directive.kind, directive.received_at
        );

        let outcome = self.decide(directive.kind).await;
        self.publish_status();
        outcome
    }

    async fn decide(&mut self, kind: Action) -> Result<Outcome, TradingError> {
        let symbol = self.pair().to_string();

        let price = match self.gateway.fetch_price(&symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    event = events::DATA_UNAVAILABLE,
                    "[ENGINE] Could not get current price ({}). Skipping signal.", e
                );
                return Ok(Outcome::Skipped(SkipReason::PriceUnavailable));
            }
        };

        let (base_balance, quote_balance) = match self.ledger.balances().await {
            Ok(balances) => balances,
            Err(e) => {
                warn!(event = events::DATA_UNAVAILABLE, "[ENGINE] {}. Skipping signal.", e);
                return Ok(Outcome::Skipped(SkipReason::BalanceUnavailable));
            }
        };
        check_market_data(price, base_balance, quote_balance)?;
        if self.ledger.mode() == TradingMode::Live {
            self.last_balances = Some((base_balance, quote_balance));
        }

        let pair = self.pair();
        info!(
            "[ENGINE] Current Price: {:.6} | {}: {:.6} | {}: {:.6} | Last Action: {}",
            price, pair.base, base_balance, pair.quote, quote_balance, self.state.last_action
        );

        match (self.state.last_action, kind) {
            (Action::Sell, Action::Buy) => self.buy_back(price, quote_balance).await,
            (Action::Buy, Action::Sell) => self.sell(price, base_balance).await,
            (last, kind) => {
                let waiting_for = match last {
                    Action::Buy => Action::Sell,
                    Action::Sell => Action::Buy,
                };
                info!(
                    event = events::SIGNAL_IGNORED,
                    "[ENGINE] {} signal received but last action was already {} (waiting for {} signal)",
                    kind,
                    last,
                    waiting_for
                );
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn buy_back(&mut self, price: f64, quote_balance: f64) -> Result<Outcome, TradingError> {
        info!("[ENGINE] BUY signal at price {:.6}", price);

        let Some(amount) = self.state.last_sold_amount else {
            warn!(
                event = events::TRADE_SKIPPED,
                "[ENGINE] No previous sell amount recorded, cannot determine buy amount"
            );
            return Ok(Outcome::Skipped(SkipReason::NoPendingAmount));
        };

        let cost = amount * price;
        if quote_balance < cost {
            warn!(
                event = events::INSUFFICIENT_BALANCE,
                "[ENGINE] Insufficient {} balance for buying. Need {:.6}, have {:.6}",
                self.pair().quote,
                cost,
                quote_balance
            );
            return Ok(Outcome::Skipped(SkipReason::InsufficientBalance));
        }

        let trade = match self.ledger.execute_trade(Side::Buy, amount, price).await {
            Ok(trade) => trade,
            Err(e) => return absorb(e),
        };

        self.state.last_action = Action::Buy;
        let cycle = self
            .state
            .last_sell_price
            .map(|sell_price| self.ledger.record_cycle(sell_price, price, trade.amount));
        self.state.last_sold_amount = None;
        self.state.last_sell_price = None;

        self.event_bus.publish(Event::Trade(trade.clone()));
        if let Some(cycle) = &cycle {
            self.event_bus.publish(Event::Cycle(cycle.clone()));
        }
        Ok(Outcome::Executed { trade, cycle })
    }

    async fn sell(&mut self, price: f64, base_balance: f64) -> Result<Outcome, TradingError> {
        info!("[ENGINE] SELL signal at price {:.6}", price);

        let amount = self.settings.fixed_amount.min(base_balance);
        if amount <= 0.0 {
            warn!(
                event = events::TRADE_SKIPPED,
                "[ENGINE] Insufficient {} balance for selling",
                self.pair().base
            );
            return Ok(Outcome::Skipped(SkipReason::NothingToSell));
        }

        let trade = match self.ledger.execute_trade(Side::Sell, amount, price).await {
            Ok(trade) => trade,
            Err(e) => return absorb(e),
        };

        self.state.last_action = Action::Sell;
        // Live orders may be rounded to the exchange lot size
        self.state.last_sold_amount = Some(trade.amount);
        self.state.last_sell_price = Some(price);

        self.event_bus.publish(Event::Trade(trade.clone()));
        Ok(Outcome::Executed { trade, cycle: None })
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.snapshot());
    }
}

/// Quotes and balances that made it past the gateway must be usable numbers.
/// Anything else is a broken gateway, not a market condition.
fn check_market_data(price: f64, base: f64, quote: f64) -> Result<(), TradingError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(TradingError::Internal(format!("gateway returned invalid price {}", price)));
    }
    if !(base.is_finite() && base >= 0.0 && quote.is_finite() && quote >= 0.0) {
        return Err(TradingError::Internal(format!(
            "gateway returned invalid balances base={} quote={}",
            base, quote
        )));
    }
    Ok(())
}

/// Map a failed trade onto a skip; only internal faults escape.
fn absorb(err: TradingError) -> Result<Outcome, TradingError> {
    if !err.is_recoverable() {
        return Err(err);
    }
    match err {
        TradingError::InsufficientBalance { .. } => {
            warn!(event = events::INSUFFICIENT_BALANCE, "[ENGINE] Trade skipped: {}", err);
            Ok(Outcome::Skipped(SkipReason::InsufficientBalance))
        }
        TradingError::OrderFailed(_) => {
            error!(event = events::ORDER_FAILED, "[ENGINE] {}", err);
            Ok(Outcome::Skipped(SkipReason::OrderFailed))
        }
        TradingError::DataUnavailable(_) => {
            warn!(event = events::DATA_UNAVAILABLE, "[ENGINE] {}", err);
            Ok(Outcome::Skipped(SkipReason::BalanceUnavailable))
        }
        _ => {
            warn!(event = events::TRADE_SKIPPED, "[ENGINE] Trade skipped: {}", err);
            Ok(Outcome::Skipped(SkipReason::InvalidOrder))
        }
    }
}

fn build_snapshot(
    settings: &EngineSettings,
    ledger: &Ledger,
    state: &EngineState,
    exchange_balances: Option<(f64, f64)>,
) -> StatusSnapshot {
    let pair = ledger.pair();
    let (base_balance, quote_balance) = match ledger.mode() {
        TradingMode::Demo => (
            ledger.simulated_balance(&pair.base),
            ledger.simulated_balance(&pair.quote),
        ),
        TradingMode::Live => match exchange_balances {
            Some((base, quote)) => (Some(base), Some(quote)),
            None => (None, None),
        },
    };

    StatusSnapshot {
        bot_id: settings.bot_id.clone(),
        symbol: pair.to_string(),
        mode: ledger.mode(),
        last_action: state.last_action,
        base_balance,
        quote_balance,
        total_profit: ledger.total_profit(),
        trades: ledger.trades().len(),
        cycles: ledger.cycles().len(),
        last_sold_amount: state.last_sold_amount,
        last_sell_price: state.last_sell_price,
        updated_at: Utc::now(),
    }
}
