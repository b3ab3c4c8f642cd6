use crate::domain::{Decimal, FeeSchedule, RiskParameters, Symbol};
use std::collections::HashMap;
use thiserror::Error;

/// Default A-share symbol universe: six large caps across both exchanges.
const DEFAULT_SYMBOLS: &str = "600519,000858,601318,600036,000333,300750";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub symbols: Vec<Symbol>,
    /// Symbols under the tighter 5% daily price limit (ST tier).
    pub restricted_symbols: Vec<Symbol>,
    pub cycle_interval_secs: u64,
    pub quote_timeout_secs: u64,
    pub quote_cache_ttl_secs: u64,
    pub risk: RiskParameters,
    pub fees: FeeSchedule,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let symbols = parse_symbol_list(
            env_map.get("SYMBOLS").map(|s| s.as_str()).unwrap_or(DEFAULT_SYMBOLS),
        );
        if symbols.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SYMBOLS".to_string(),
                "must contain at least one symbol".to_string(),
            ));
        }

        let restricted_symbols = parse_symbol_list(
            env_map
                .get("RESTRICTED_SYMBOLS")
                .map(|s| s.as_str())
                .unwrap_or(""),
        );

        let cycle_interval_secs = parse_u64(&env_map, "CYCLE_INTERVAL_SECS", 300)?;
        let quote_timeout_secs = parse_u64(&env_map, "QUOTE_TIMEOUT_SECS", 5)?;
        let quote_cache_ttl_secs = parse_u64(&env_map, "QUOTE_CACHE_TTL_SECS", 5)?;

        let defaults = RiskParameters::default();
        let risk = RiskParameters {
            pullback_tolerance: parse_decimal(&env_map, "PULLBACK_TOLERANCE", defaults.pullback_tolerance)?,
            rsi_buy_low: parse_decimal(&env_map, "RSI_BUY_LOW", defaults.rsi_buy_low)?,
            rsi_neutral_low: parse_decimal(&env_map, "RSI_NEUTRAL_LOW", defaults.rsi_neutral_low)?,
            rsi_neutral_high: parse_decimal(&env_map, "RSI_NEUTRAL_HIGH", defaults.rsi_neutral_high)?,
            rsi_sell_high: parse_decimal(&env_map, "RSI_SELL_HIGH", defaults.rsi_sell_high)?,
            position_limit_pct: parse_decimal(&env_map, "POSITION_LIMIT_PCT", defaults.position_limit_pct)?,
            stop_loss_pct: parse_decimal(&env_map, "STOP_LOSS_PCT", defaults.stop_loss_pct)?,
            take_profit_breakout: defaults.take_profit_breakout,
            take_profit_pullback: defaults.take_profit_pullback,
            take_profit_continuation: defaults.take_profit_continuation,
        };

        let fee_defaults = FeeSchedule::default();
        let fees = FeeSchedule {
            commission_rate: parse_decimal(&env_map, "COMMISSION_RATE", fee_defaults.commission_rate)?,
            commission_floor: parse_decimal(&env_map, "COMMISSION_FLOOR", fee_defaults.commission_floor)?,
            levy_rate: parse_decimal(&env_map, "LEVY_RATE", fee_defaults.levy_rate)?,
            lot_size: fee_defaults.lot_size,
            normal_limit_pct: fee_defaults.normal_limit_pct,
            restricted_limit_pct: fee_defaults.restricted_limit_pct,
        };

        Ok(Config {
            port,
            database_path,
            symbols,
            restricted_symbols,
            cycle_interval_secs,
            quote_timeout_secs,
            quote_cache_ttl_secs,
            risk,
            fees,
        })
    }

    pub fn is_restricted(&self, symbol: &Symbol) -> bool {
        self.restricted_symbols.contains(symbol)
    }
}

fn parse_symbol_list(raw: &str) -> Vec<Symbol> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Symbol::new)
        .collect()
}

fn parse_u64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
        }),
    }
}

fn parse_decimal(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Decimal,
) -> Result<Decimal, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => Decimal::from_str_canonical(raw).map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_default_universe_and_interval() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.symbols.len(), 6);
        assert_eq!(config.symbols[0], Symbol::new("600519"));
        assert_eq!(config.cycle_interval_secs, 300);
        assert_eq!(config.quote_cache_ttl_secs, 5);
        assert!(config.restricted_symbols.is_empty());
    }

    #[test]
    fn test_custom_symbols() {
        let mut env_map = setup_required_env();
        env_map.insert("SYMBOLS".to_string(), "600036, 000333 ,".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.symbols,
            vec![Symbol::new("600036"), Symbol::new("000333")]
        );
    }

    #[test]
    fn test_empty_symbols_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("SYMBOLS".to_string(), " , ".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "SYMBOLS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_risk_override() {
        let mut env_map = setup_required_env();
        env_map.insert("STOP_LOSS_PCT".to_string(), "0.08".to_string());
        env_map.insert("RSI_BUY_LOW".to_string(), "25".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.risk.stop_loss_pct.to_canonical_string(), "0.08");
        assert_eq!(config.risk.rsi_buy_low.to_canonical_string(), "25");
        // Untouched fields keep their defaults.
        assert_eq!(config.risk.position_limit_pct.to_canonical_string(), "0.3");
    }

    #[test]
    fn test_invalid_risk_value() {
        let mut env_map = setup_required_env();
        env_map.insert("STOP_LOSS_PCT".to_string(), "five percent".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "STOP_LOSS_PCT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_restricted_symbols() {
        let mut env_map = setup_required_env();
        env_map.insert("RESTRICTED_SYMBOLS".to_string(), "600519".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.is_restricted(&Symbol::new("600519")));
        assert!(!config.is_restricted(&Symbol::new("000858")));
    }
}
