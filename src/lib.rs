//! Signal Trader - TradingView webhook driven spot trading bot
//!
//! Webhook alerts are parsed into BUY/SELL directives, queued, and executed
//! one at a time by a single trading engine that alternates SELL -> BUY
//! cycles on one KuCoin pair, either with simulated balances or live orders.

pub mod api;
pub mod app;
pub mod bus;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod exchange;
pub mod logging;
pub mod queue;
pub mod services;
pub mod shutdown;
pub mod signal;

// Re-export commonly used types
pub use bus::EventBus;
pub use config::{AppConfig, TradingMode};
pub use error::{ExchangeError, ParseError, TradingError};
pub use events::{CycleRecord, Event, TradeRecord};
pub use queue::{SignalConsumer, SignalQueue};
pub use signal::{Action, Directive};

#[cfg(test)]
mod config_tests;
