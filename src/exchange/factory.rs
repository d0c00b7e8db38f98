use std::sync::Arc;

use crate::{config::AppConfig, error::TradingError};

use super::{kucoin::KucoinExchange, traits::ExchangeGateway};

pub fn build_exchange(config: &AppConfig) -> Result<Arc<dyn ExchangeGateway>, TradingError> {
    match config.exchange.to_lowercase().as_str() {
        "kucoin" => {
            let ex = KucoinExchange::new(config.kucoin.clone())
                .map_err(|e| TradingError::Config(format!("KuCoin client setup failed: {}", e)))?;
            Ok(Arc::new(ex))
        }
        other => Err(TradingError::Config(format!(
            "Unknown exchange '{}' (expected kucoin)",
            other
        ))),
    }
}
