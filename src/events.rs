use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exchange::types::Side;

/// One executed order (simulated or real)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    /// Base-currency quantity
    pub amount: f64,
    /// Quote-currency notional: paid on a buy, received on a sell
    pub cost: f64,
    /// Exchange order id (live mode only)
    pub order_id: Option<String>,
}

/// A completed SELL -> BUY round trip
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub timestamp: DateTime<Utc>,
    pub sell_price: f64,
    pub buy_price: f64,
    pub amount: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

// Global Event Enum
#[derive(Clone, Debug)]
pub enum Event {
    Trade(TradeRecord),
    Cycle(CycleRecord),
}
