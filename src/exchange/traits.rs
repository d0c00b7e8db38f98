use async_trait::async_trait;

use crate::error::ExchangeError;

use super::types::{MarketOrder, OrderAck};

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Everything the trading engine needs from an exchange.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Last traded price for a canonical symbol ("XRP/USDT").
    async fn fetch_price(&self, symbol: &str) -> ExchangeResult<f64>;

    /// Free balance of a single currency.
    async fn fetch_balance(&self, currency: &str) -> ExchangeResult<f64>;

    async fn place_market_order(&self, order: &MarketOrder) -> ExchangeResult<OrderAck>;
}
