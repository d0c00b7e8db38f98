//! Custom error types for the signal trader
//!
//! Directive-level failures (`TradingError`) are absorbed by the engine;
//! `ParseError` is reported back to the webhook caller; `ExchangeError`
//! covers everything that can go wrong talking to the exchange.

use thiserror::Error;

/// Why an inbound webhook payload could not become a directive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty signal payload")]
    Empty,

    #[error("Signal payload is not valid UTF-8")]
    InvalidEncoding,

    #[error("Could not extract signal type from data: {0}")]
    Unrecognized(String),
}

/// Top-level trading errors
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient {currency} balance: requested {requested:.6}, available {available:.6}")]
    InsufficientBalance {
        currency: String,
        requested: f64,
        available: f64,
    },

    #[error("Order failed: {0}")]
    OrderFailed(#[source] ExchangeError),

    #[error("Invalid quantity {qty} for {symbol}")]
    InvalidQuantity { symbol: String, qty: f64 },

    #[error("Invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal fault: {0}")]
    Internal(String),
}

impl TradingError {
    /// Recoverable errors drop the current directive; anything else counts as an internal fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TradingError::Internal(_) | TradingError::Config(_))
    }
}

/// Exchange-specific errors
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("Order size {amount} for {symbol} is below the exchange lot size")]
    OrderTooSmall { symbol: String, amount: f64 },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl From<serde_yaml::Error> for TradingError {
    fn from(err: serde_yaml::Error) -> Self {
        TradingError::Config(err.to_string())
    }
}
