use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::TradingMode;
use crate::constants::events;
use crate::error::TradingError;
use crate::events::{CycleRecord, TradeRecord};
use crate::exchange::symbols::TradingPair;
use crate::exchange::traits::ExchangeGateway;
use crate::exchange::types::{MarketOrder, Side};

/// Where balances live and how orders settle
enum Book {
    /// In-memory balances, instant fills at the quoted price
    Simulated { balances: HashMap<String, f64> },
    /// Real market orders; balances are read through on demand
    Exchange { gateway: Arc<dyn ExchangeGateway> },
}

/// Balances, trade history and realized profit for one trading pair.
pub struct Ledger {
    pair: TradingPair,
    book: Book,
    trades: Vec<TradeRecord>,
    cycles: Vec<CycleRecord>,
    total_profit: f64,
}

/// Realized profit of a sell followed by a buy-back of the same amount.
///
/// Always sell-leg revenue minus buy-leg cost: positive when bought back cheaper.
pub fn compute_profit(sell_price: f64, buy_price: f64, amount: f64) -> f64 {
    amount * sell_price - amount * buy_price
}

impl Ledger {
    pub fn simulated(pair: TradingPair, base_balance: f64, quote_balance: f64) -> Self {
        let mut balances = HashMap::new();
        balances.insert(pair.base.clone(), base_balance.max(0.0));
        balances.insert(pair.quote.clone(), quote_balance.max(0.0));
        Self::with_book(pair, Book::Simulated { balances })
    }

    pub fn on_exchange(pair: TradingPair, gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self::with_book(pair, Book::Exchange { gateway })
    }

    fn with_book(pair: TradingPair, book: Book) -> Self {
        Self {
            pair,
            book,
            trades: Vec::new(),
            cycles: Vec::new(),
            total_profit: 0.0,
        }
    }

    pub fn mode(&self) -> TradingMode {
        match self.book {
            Book::Simulated { .. } => TradingMode::Demo,
            Book::Exchange { .. } => TradingMode::Live,
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    /// Simulated balance of `currency`; `None` in live mode.
    pub fn simulated_balance(&self, currency: &str) -> Option<f64> {
        match &self.book {
            Book::Simulated { balances } => Some(balances.get(currency).copied().unwrap_or(0.0)),
            Book::Exchange { .. } => None,
        }
    }

    /// (base, quote) balances as the engine should see them right now.
    pub async fn balances(&self) -> Result<(f64, f64), TradingError> {
        match &self.book {
            Book::Simulated { balances } => Ok((
                balances.get(&self.pair.base).copied().unwrap_or(0.0),
                balances.get(&self.pair.quote).copied().unwrap_or(0.0),
            )),
            Book::Exchange { gateway } => {
                let base = gateway
                    .fetch_balance(&self.pair.base)
                    .await
                    .map_err(|e| TradingError::DataUnavailable(format!("{} balance: {}", self.pair.base, e)))?;
                let quote = gateway
                    .fetch_balance(&self.pair.quote)
                    .await
                    .map_err(|e| TradingError::DataUnavailable(format!("{} balance: {}", self.pair.quote, e)))?;
                Ok((base, quote))
            }
        }
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn cycles(&self) -> &[CycleRecord] {
        &self.cycles
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    /// Execute one market trade. The trade is appended to history only when it settles.
    pub async fn execute_trade(
        &mut self,
        side: Side,
        amount: f64,
        price: f64,
    ) -> Result<TradeRecord, TradingError> {
        let symbol = self.pair.to_string();
        if !(amount.is_finite() && amount > 0.0) {
            return Err(TradingError::InvalidQuantity { symbol, qty: amount });
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(TradingError::InvalidPrice { symbol, price });
        }

        let record = match &mut self.book {
            Book::Simulated { balances } => settle_simulated(&self.pair, balances, side, amount, price)?,
            Book::Exchange { gateway } => {
                let order = MarketOrder {
                    symbol,
                    side,
                    amount,
                };
                let ack = gateway
                    .place_market_order(&order)
                    .await
                    .map_err(TradingError::OrderFailed)?;
                info!(
                    "[LEDGER] {} order accepted: id={} status={} size={}",
                    side, ack.id, ack.status, ack.size
                );
                TradeRecord {
                    timestamp: Utc::now(),
                    side,
                    price,
                    amount: ack.size,
                    cost: ack.size * price,
                    order_id: Some(ack.id),
                }
            }
        };

        info!(
            event = events::TRADE_EXECUTED,
            "[LEDGER] {}{} {:.6} {} at {:.6} {}",
            if self.mode() == TradingMode::Demo { "[DEMO] " } else { "" },
            record.side,
            record.amount,
            self.pair.base,
            record.price,
            self.pair.quote
        );
        self.trades.push(record.clone());
        Ok(record)
    }

    /// Book a completed sell -> buy cycle and accumulate its profit.
    pub fn record_cycle(&mut self, sell_price: f64, buy_price: f64, amount: f64) -> CycleRecord {
        let profit = compute_profit(sell_price, buy_price, amount);
        self.total_profit += profit;

        let cycle = CycleRecord {
            timestamp: Utc::now(),
            sell_price,
            buy_price,
            amount,
            revenue: amount * sell_price,
            cost: amount * buy_price,
            profit,
        };
        info!(
            event = events::CYCLE_COMPLETE,
            "[LEDGER] CYCLE COMPLETE: SELL@{:.6} BUY@{:.6} AMOUNT:{:.6} PROFIT:{:.6} {} (total {:.6})",
            sell_price,
            buy_price,
            amount,
            profit,
            self.pair.quote,
            self.total_profit
        );
        self.cycles.push(cycle.clone());
        cycle
    }
}

fn settle_simulated(
    pair: &TradingPair,
    balances: &mut HashMap<String, f64>,
    side: Side,
    amount: f64,
    price: f64,
) -> Result<TradeRecord, TradingError> {
    let notional = amount * price;
    let (spend_currency, spend, receive_currency, receive) = match side {
        Side::Buy => (&pair.quote, notional, &pair.base, amount),
        Side::Sell => (&pair.base, amount, &pair.quote, notional),
    };

    let available = balances.get(spend_currency).copied().unwrap_or(0.0);
    if spend > available {
        warn!(
            event = events::INSUFFICIENT_BALANCE,
            "[LEDGER] Not enough {} for {}. Have: {:.6}, Need: {:.6}",
            spend_currency,
            side,
            available,
            spend
        );
        return Err(TradingError::InsufficientBalance {
            currency: spend_currency.clone(),
            requested: spend,
            available,
        });
    }

    balances.insert(spend_currency.clone(), available - spend);
    *balances.entry(receive_currency.clone()).or_insert(0.0) += receive;

    Ok(TradeRecord {
        timestamp: Utc::now(),
        side,
        price,
        amount,
        cost: notional,
        order_id: None,
    })
}
