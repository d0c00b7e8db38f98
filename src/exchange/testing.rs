//! In-memory exchange used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ExchangeError;

use super::traits::{ExchangeGateway, ExchangeResult};
use super::types::{MarketOrder, OrderAck, Side};

/// Quotes a settable price, fills market orders against its own balances,
/// and can be told to fail either call.
pub(crate) struct ScriptedGateway {
    price: Mutex<Option<f64>>,
    /// Quotes served before falling back to `price`, one per fetch
    script: Mutex<VecDeque<f64>>,
    balances: Mutex<HashMap<String, f64>>,
    balances_down: Mutex<bool>,
    reject_orders: Mutex<bool>,
    lot: Option<f64>,
    orders: Mutex<Vec<MarketOrder>>,
}

impl ScriptedGateway {
    pub(crate) fn new(price: f64) -> Self {
        Self {
            price: Mutex::new(Some(price)),
            script: Mutex::new(VecDeque::new()),
            balances: Mutex::new(HashMap::new()),
            balances_down: Mutex::new(false),
            reject_orders: Mutex::new(false),
            lot: None,
            orders: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_balance(self, currency: &str, amount: f64) -> Self {
        self.balances.lock().unwrap().insert(currency.to_string(), amount);
        self
    }

    pub(crate) fn with_price_script(self, prices: &[f64]) -> Self {
        self.script.lock().unwrap().extend(prices.iter().copied());
        self
    }

    /// Round order sizes down to multiples of `lot`, like a real exchange.
    pub(crate) fn with_lot(mut self, lot: f64) -> Self {
        self.lot = Some(lot);
        self
    }

    pub(crate) fn set_price(&self, price: Option<f64>) {
        *self.price.lock().unwrap() = price;
    }

    pub(crate) fn set_balances_down(&self, down: bool) {
        *self.balances_down.lock().unwrap() = down;
    }

    pub(crate) fn set_reject_orders(&self, reject: bool) {
        *self.reject_orders.lock().unwrap() = reject;
    }

    pub(crate) fn balance(&self, currency: &str) -> f64 {
        self.balances.lock().unwrap().get(currency).copied().unwrap_or(0.0)
    }

    pub(crate) fn orders(&self) -> Vec<MarketOrder> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_price(&self, _symbol: &str) -> ExchangeResult<f64> {
        if let Some(price) = self.script.lock().unwrap().pop_front() {
            return Ok(price);
        }
        self.price
            .lock()
            .unwrap()
            .ok_or_else(|| ExchangeError::UnexpectedResponse("no ticker".to_string()))
    }

    async fn fetch_balance(&self, currency: &str) -> ExchangeResult<f64> {
        if *self.balances_down.lock().unwrap() {
            return Err(ExchangeError::Http {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.balance(currency))
    }

    async fn place_market_order(&self, order: &MarketOrder) -> ExchangeResult<OrderAck> {
        if *self.reject_orders.lock().unwrap() {
            return Err(ExchangeError::Api {
                code: "200004".to_string(),
                msg: "Balance insufficient!".to_string(),
            });
        }
        let price = self.price.lock().unwrap().unwrap_or(0.0);
        let size = match self.lot {
            Some(lot) => (order.amount / lot).floor() * lot,
            None => order.amount,
        };
        let (base, quote) = order.symbol.split_once('/').unwrap();
        {
            let mut balances = self.balances.lock().unwrap();
            let notional = size * price;
            match order.side {
                Side::Buy => {
                    *balances.entry(base.to_string()).or_insert(0.0) += size;
                    *balances.entry(quote.to_string()).or_insert(0.0) -= notional;
                }
                Side::Sell => {
                    *balances.entry(base.to_string()).or_insert(0.0) -= size;
                    *balances.entry(quote.to_string()).or_insert(0.0) += notional;
                }
            }
        }

        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        let id = format!("order-{}", orders.len());
        Ok(OrderAck {
            id: id.clone(),
            status: "submitted".to_string(),
            size,
            raw: json!({ "orderId": id }),
        })
    }
}
