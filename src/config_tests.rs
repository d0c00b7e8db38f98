//! Unit tests for configuration structures and parsing.

#[cfg(test)]
mod config_tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::config::*;
    use crate::error::TradingError;

    const MINIMAL: &str = r#"
symbol: XRP/USDT
fixed_amount: 1000
"#;

    // ============= Defaults Tests =============

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();

        assert_eq!(config.mode, TradingMode::Demo);
        assert_eq!(config.exchange, "kucoin");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.engine.max_consecutive_faults, 5);
        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.kucoin.base_url, "https://api.kucoin.com");
        assert!(!config.kucoin.has_credentials());
    }

    #[test]
    fn test_bot_id_derived_from_symbol() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.bot_id(), "xrp_usdt");
        assert_eq!(
            config.trade_history_path(),
            PathBuf::from("logs").join("trade_history_xrp_usdt.jsonl")
        );
    }

    #[test]
    fn test_explicit_bot_id_wins() {
        let yaml = format!("{}bot_id: \"xrp-scalper \"\n", MINIMAL);
        let config = AppConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.bot_id(), "xrp-scalper");
    }

    #[test]
    fn test_demo_balances_default_to_fixed_amount() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.initial_balances(), (1000.0, 0.0));

        let yaml = format!(
            "{}demo:\n  initial_base_balance: 250\n  initial_quote_balance: 75.5\n",
            MINIMAL
        );
        let config = AppConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.initial_balances(), (250.0, 75.5));
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
bot_id: xrp_live
symbol: xrp/usdt
mode: live
fixed_amount: 12.5
exchange: kucoin
server:
  host: 127.0.0.1
  port: 8080
engine:
  poll_interval_ms: 250
  max_consecutive_faults: 2
logging:
  dir: /var/log/signal_trader
kucoin:
  api_key: key
  secret_key: secret
  passphrase: phrase
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.mode, TradingMode::Live);
        assert_eq!(config.fixed_amount, 12.5);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.engine.max_consecutive_faults, 2);
        assert!(config.kucoin.has_credentials());

        let pair = config.pair().unwrap();
        assert_eq!(pair.base, "XRP");
        assert_eq!(pair.quote, "USDT");
    }

    #[test]
    fn test_bom_is_ignored() {
        let yaml = format!("\u{feff}{}", MINIMAL);
        assert!(AppConfig::from_yaml_str(&yaml).is_ok());
    }

    // ============= Validation Tests =============

    #[test]
    fn test_live_mode_requires_credentials() {
        let yaml = format!("{}mode: live\nkucoin:\n  api_key: key\n  secret_key: \"\"\n", MINIMAL);
        match AppConfig::from_yaml_str(&yaml) {
            Err(TradingError::Config(msg)) => assert!(msg.contains("required for live mode")),
            other => panic!("Expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_fixed_amount_must_be_positive() {
        for amount in ["0", "-5", ".nan"] {
            let yaml = format!("symbol: XRP/USDT\nfixed_amount: {}\n", amount);
            assert!(
                matches!(AppConfig::from_yaml_str(&yaml), Err(TradingError::Config(_))),
                "fixed_amount {} should be rejected",
                amount
            );
        }
    }

    #[test]
    fn test_bad_symbol_is_rejected() {
        let yaml = "symbol: XRPUSDT\nfixed_amount: 10\n";
        assert!(matches!(
            AppConfig::from_yaml_str(yaml),
            Err(TradingError::Config(_))
        ));
    }

    #[test]
    fn test_negative_demo_balance_is_rejected() {
        let yaml = format!("{}demo:\n  initial_quote_balance: -1\n", MINIMAL);
        assert!(AppConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let yaml = format!("{}engine:\n  poll_interval_ms: 0\n", MINIMAL);
        assert!(AppConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_missing_required_field_is_config_error() {
        assert!(matches!(
            AppConfig::from_yaml_str("symbol: XRP/USDT\n"),
            Err(TradingError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AppConfig::load_from("/nonexistent/signal_trader.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    // ============= TradingMode Tests =============

    #[test]
    fn test_trading_mode_from_str() {
        assert_eq!("demo".parse::<TradingMode>().unwrap(), TradingMode::Demo);
        assert_eq!("PAPER".parse::<TradingMode>().unwrap(), TradingMode::Demo);
        assert_eq!(" live ".parse::<TradingMode>().unwrap(), TradingMode::Live);
        assert_eq!("real".parse::<TradingMode>().unwrap(), TradingMode::Live);
        assert!("sandbox".parse::<TradingMode>().is_err());
    }

    #[test]
    fn test_trading_mode_serde() {
        assert_eq!(serde_json::to_string(&TradingMode::Live).unwrap(), "\"live\"");
        assert_eq!(TradingMode::Demo.to_string(), "demo");
    }

    // ============= KucoinConfig Tests =============

    #[test]
    fn test_kucoin_debug_masks_secrets() {
        let kucoin = KucoinConfig {
            api_key: Some("my-key".to_string()),
            secret_key: Some("my-secret".to_string()),
            passphrase: Some("my-phrase".to_string()),
            ..KucoinConfig::default()
        };

        let debug = format!("{:?}", kucoin);
        assert!(!debug.contains("my-key"));
        assert!(!debug.contains("my-secret"));
        assert!(!debug.contains("my-phrase"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_blank_credentials_do_not_count() {
        let kucoin = KucoinConfig {
            api_key: Some("key".to_string()),
            secret_key: Some("secret".to_string()),
            passphrase: Some("   ".to_string()),
            ..KucoinConfig::default()
        };
        assert!(!kucoin.has_credentials());
    }
}
