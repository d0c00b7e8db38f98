//! Application-wide constants
//!
//! Defaults for configuration, exchange wire constants and the event names
//! used in structured log lines.

/// Configuration defaults
pub mod defaults {
    pub const CONFIG_PATH: &str = "config.yaml";

    pub const HOST: &str = "0.0.0.0";

    pub const PORT: u16 = 5000;

    /// Engine wait on an empty queue before re-checking for shutdown
    pub const POLL_INTERVAL_MS: u64 = 1000;

    pub const MAX_CONSECUTIVE_FAULTS: u32 = 5;

    pub const LOG_DIR: &str = "logs";

    pub const KUCOIN_BASE_URL: &str = "https://api.kucoin.com";
}

/// Environment variable names
pub mod env_keys {
    pub const CONFIG_PATH: &str = "CONFIG_PATH";
    pub const KUCOIN_API_KEY: &str = "KUCOIN_API_KEY";
    pub const KUCOIN_API_SECRET: &str = "KUCOIN_API_SECRET";
    pub const KUCOIN_API_PASSPHRASE: &str = "KUCOIN_API_PASSPHRASE";
    pub const TRADING_MODE: &str = "TRADING_MODE";
    pub const WEBHOOK_PORT: &str = "WEBHOOK_PORT";
}

/// KuCoin REST constants
pub mod kucoin {
    use std::time::Duration;

    /// Success code in the `{code, data, msg}` response envelope
    pub const SUCCESS_CODE: &str = "200000";

    /// Signed passphrase scheme
    pub const API_KEY_VERSION: &str = "2";

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub const TICKER_PATH: &str = "/api/v1/market/orderbook/level1";
    pub const ACCOUNTS_PATH: &str = "/api/v1/accounts";
    pub const ORDERS_PATH: &str = "/api/v1/orders";
    /// `/api/v2/symbols/{symbol}`: lot size and increments
    pub const SYMBOL_PATH: &str = "/api/v2/symbols";
}

/// Logging event names for structured logging
pub mod events {
    pub const SIGNAL_QUEUED: &str = "signal_queued";
    pub const SIGNAL_REJECTED: &str = "signal_rejected";
    pub const SIGNAL_IGNORED: &str = "signal_ignored";
    pub const TRADE_EXECUTED: &str = "trade_executed";
    pub const TRADE_SKIPPED: &str = "trade_skipped";
    pub const CYCLE_COMPLETE: &str = "cycle_complete";
    pub const INSUFFICIENT_BALANCE: &str = "insufficient_balance";
    pub const ORDER_FAILED: &str = "order_failed";
    pub const DATA_UNAVAILABLE: &str = "data_unavailable";
    pub const INTERNAL_FAULT: &str = "internal_fault";
}
