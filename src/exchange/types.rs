use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire representation used by the exchange REST API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A market order for `amount` units of the base currency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: Side,
    pub amount: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
    pub status: String,
    /// Base amount actually submitted, after lot-size rounding
    pub size: f64,
    pub raw: Value,
}
