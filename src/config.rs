use crate::core::money::Money;
use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;

pub struct Config {
    pub log_level: String,
    pub default_currency: String,
    /// Upper bound for any single expense, payment or ledger entry.
    pub max_amount: Money,
    pub strict_settlement_default: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("default_currency", &self.default_currency)
            .field("max_amount", &self.max_amount.to_string())
            .field("strict_settlement_default", &self.strict_settlement_default)
            .finish()
    }
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            default_currency: env::var("DEFAULT_CURRENCY")
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|_| "INR".to_string()),
            max_amount: env::var("MAX_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Money::from_major(1_000_000)),
            strict_settlement_default: env::var("STRICT_SETTLEMENT_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

// Global static accessible everywhere
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Input bounds the service enforces.
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_amount: Money,
    pub default_currency: String,
    pub strict_settlement_default: bool,
    pub max_text_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits::from(&*CONFIG)
    }
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Limits {
            max_amount: config.max_amount,
            default_currency: config.default_currency.clone(),
            strict_settlement_default: config.strict_settlement_default,
            max_text_length: 255,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_follow_config() {
        let config = Config {
            log_level: "debug".to_string(),
            default_currency: "EUR".to_string(),
            max_amount: Money::from_major(500),
            strict_settlement_default: false,
        };
        let limits = Limits::from(&config);
        assert_eq!(limits.max_amount, Money::from_major(500));
        assert_eq!(limits.default_currency, "EUR");
        assert!(!limits.strict_settlement_default);
        assert!(format!("{:?}", config).contains("max_amount: \"500.00\""));
    }
}
