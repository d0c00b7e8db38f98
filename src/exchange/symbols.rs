//! Trading pair helpers.
//!
//! Canonical symbol (used internally and in config): "BASE/QUOTE", e.g. "XRP/USDT".
//!
//! Exchange mappings:
//! - KuCoin: "XRP-USDT"

use std::fmt;

use crate::error::ExchangeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn parse(canonical: &str) -> Result<Self, ExchangeError> {
        let mut parts = canonical.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => Ok(Self {
                base: base.to_uppercase(),
                quote: quote.to_uppercase(),
            }),
            _ => Err(ExchangeError::InvalidSymbol {
                symbol: canonical.to_string(),
            }),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

pub fn to_kucoin_symbol(canonical: &str) -> String {
    canonical.replace('/', "-").to_uppercase()
}
