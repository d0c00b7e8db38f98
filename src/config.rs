use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{defaults, env_keys};
use crate::error::TradingError;
use crate::exchange::symbols::TradingPair;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// Simulated balances, live market prices.
    #[default]
    Demo,
    /// Real market orders on the exchange.
    Live,
}

impl FromStr for TradingMode {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "demo" | "paper" => Ok(TradingMode::Demo),
            "live" | "real" => Ok(TradingMode::Live),
            other => Err(TradingError::Config(format!(
                "Unknown trading mode '{}' (expected demo|live)",
                other
            ))),
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Demo => write!(f, "demo"),
            TradingMode::Live => write!(f, "live"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    /// How long the engine waits on an empty queue before re-checking for shutdown
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive internal faults tolerated before the engine gives up
    #[serde(default = "default_max_consecutive_faults")]
    pub max_consecutive_faults: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_faults: default_max_consecutive_faults(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DemoConfig {
    /// Starting base balance; defaults to `fixed_amount`
    pub initial_base_balance: Option<f64>,
    #[serde(default)]
    pub initial_quote_balance: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct KucoinConfig {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub passphrase: Option<String>,
    #[serde(default = "default_kucoin_url")]
    pub base_url: String,
}

impl Default for KucoinConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            secret_key: None,
            passphrase: None,
            base_url: default_kucoin_url(),
        }
    }
}

impl KucoinConfig {
    pub fn has_credentials(&self) -> bool {
        [&self.api_key, &self.secret_key, &self.passphrase]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

// Secrets stay out of the startup log.
impl fmt::Debug for KucoinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KucoinConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub bot_id: Option<String>,
    pub symbol: String,
    #[serde(default)]
    pub mode: TradingMode,
    /// Base-currency amount sold on every SELL signal
    pub fixed_amount: f64,
    #[serde(default = "default_exchange")]
    pub exchange: String, // "kucoin"

    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub kucoin: KucoinConfig,
}

impl AppConfig {
    /// Load from `$CONFIG_PATH` (default `config.yaml`), then apply environment overrides.
    pub fn load() -> Result<Self, TradingError> {
        let path = std::env::var(env_keys::CONFIG_PATH)
            .unwrap_or_else(|_| defaults::CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, TradingError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TradingError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse_yaml(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate without consulting the environment.
    pub fn from_yaml_str(content: &str) -> Result<Self, TradingError> {
        let config = Self::parse_yaml(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_yaml(content: &str) -> Result<Self, TradingError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<(), TradingError> {
        if let Ok(v) = std::env::var(env_keys::KUCOIN_API_KEY) {
            self.kucoin.api_key = Some(v);
        }
        if let Ok(v) = std::env::var(env_keys::KUCOIN_API_SECRET) {
            self.kucoin.secret_key = Some(v);
        }
        if let Ok(v) = std::env::var(env_keys::KUCOIN_API_PASSPHRASE) {
            self.kucoin.passphrase = Some(v);
        }
        if let Ok(v) = std::env::var(env_keys::TRADING_MODE) {
            self.mode = v.parse()?;
        }
        if let Ok(v) = std::env::var(env_keys::WEBHOOK_PORT) {
            self.server.port = v.trim().parse().map_err(|_| {
                TradingError::Config(format!("{} must be a port number, got '{}'", env_keys::WEBHOOK_PORT, v))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        self.pair()?;

        if self.fixed_amount <= 0.0 || !self.fixed_amount.is_finite() {
            return Err(TradingError::Config(format!(
                "fixed_amount must be positive, got {}",
                self.fixed_amount
            )));
        }

        let (base, quote) = self.initial_balances();
        if base < 0.0 || quote < 0.0 {
            return Err(TradingError::Config(
                "demo balances must not be negative".to_string(),
            ));
        }

        if self.engine.poll_interval_ms == 0 {
            return Err(TradingError::Config(
                "engine.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.mode == TradingMode::Live && !self.kucoin.has_credentials() {
            return Err(TradingError::Config(
                "API key, secret, and passphrase are required for live mode".to_string(),
            ));
        }

        Ok(())
    }

    pub fn pair(&self) -> Result<TradingPair, TradingError> {
        TradingPair::parse(&self.symbol).map_err(|e| TradingError::Config(e.to_string()))
    }

    /// Explicit `bot_id`, or one derived from the symbol ("XRP/USDT" -> "xrp_usdt").
    pub fn bot_id(&self) -> String {
        match &self.bot_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => self.symbol.replace('/', "_").to_lowercase(),
        }
    }

    /// (base, quote) starting balances for demo mode
    pub fn initial_balances(&self) -> (f64, f64) {
        (
            self.demo.initial_base_balance.unwrap_or(self.fixed_amount),
            self.demo.initial_quote_balance,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.engine.poll_interval_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn trade_history_path(&self) -> PathBuf {
        PathBuf::from(&self.logging.dir).join(format!("trade_history_{}.jsonl", self.bot_id()))
    }
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_poll_interval_ms() -> u64 {
    defaults::POLL_INTERVAL_MS
}

fn default_max_consecutive_faults() -> u32 {
    defaults::MAX_CONSECUTIVE_FAULTS
}

fn default_log_dir() -> String {
    defaults::LOG_DIR.to_string()
}

fn default_kucoin_url() -> String {
    defaults::KUCOIN_BASE_URL.to_string()
}

fn default_exchange() -> String {
    "kucoin".to_string()
}
