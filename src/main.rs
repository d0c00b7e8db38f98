use signal_trader::app;
use signal_trader::config::AppConfig;
use signal_trader::exchange::factory::build_exchange;
use signal_trader::logging::init_tracing;
use signal_trader::shutdown::shutdown_signal;
use signal_trader::{TradingError, TradingMode};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), TradingError> {
    dotenvy::dotenv().ok();

    // Load Configuration
    let config = AppConfig::load()?;
    let bot_id = config.bot_id();
    let _log_guard = init_tracing(&config.logging.dir, &bot_id)?;

    info!("Starting Signal Trader [{}]...", bot_id);
    info!("Loaded Configuration: {:?}", config);

    let exchange = build_exchange(&config)?;
    match config.mode {
        TradingMode::Demo => info!("🧪 DEMO mode: balances are simulated, prices are live from {}", exchange.name()),
        TradingMode::Live => warn!("💰 LIVE mode: real market orders will be placed on {}", exchange.name()),
    }

    app::run(&config, exchange, shutdown_signal()).await?;
    Ok(())
}
