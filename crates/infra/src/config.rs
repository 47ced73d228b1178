//! Runtime configuration.
//!
//! Layered with figment: built-in defaults, then an optional
//! `stockwise.toml` in the working directory, then `STOCKWISE_*`
//! environment variables (`STOCKWISE_LOCK_TIMEOUT_MS=250`).

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwise_core::Currency;

pub const CONFIG_FILE: &str = "stockwise.toml";
pub const ENV_PREFIX: &str = "STOCKWISE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] figment::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockwiseConfig {
    /// How long a posting or transition waits for its row locks.
    pub lock_timeout_ms: u64,
    /// Budget for one currency-rate lookup before falling back.
    pub rate_lookup_timeout_ms: u64,
    /// Currency cost records are converted into.
    pub reference_currency: Currency,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for StockwiseConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            rate_lookup_timeout_ms: 2_000,
            reference_currency: Currency::Try,
            log_filter: "info".to_string(),
        }
    }
}

impl StockwiseConfig {
    /// Defaults, `stockwise.toml`, then the environment.
    pub fn figment() -> Figment {
        Self::figment_from(CONFIG_FILE)
    }

    pub fn figment_from(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(StockwiseConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::figment().extract()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment_from(path).extract()?)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn rate_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_lookup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config: StockwiseConfig = StockwiseConfig::figment().extract()?;
            assert_eq!(config, StockwiseConfig::default());
            assert_eq!(config.lock_timeout(), Duration::from_secs(5));
            Ok(())
        });
    }

    #[test]
    fn file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                    lock_timeout_ms = 250
                    reference_currency = "EUR"
                "#,
            )?;
            jail.set_env("STOCKWISE_REFERENCE_CURRENCY", "USD");
            jail.set_env("STOCKWISE_RATE_LOOKUP_TIMEOUT_MS", "10");

            let config: StockwiseConfig = StockwiseConfig::figment().extract()?;
            assert_eq!(config.lock_timeout_ms, 250);
            assert_eq!(config.reference_currency, Currency::Usd);
            assert_eq!(config.rate_lookup_timeout(), Duration::from_millis(10));
            assert_eq!(config.log_filter, "info");
            Ok(())
        });
    }

    #[test]
    fn bad_values_are_reported() {
        Jail::expect_with(|jail| {
            jail.set_env("STOCKWISE_LOCK_TIMEOUT_MS", "soon");
            assert!(StockwiseConfig::load().is_err());
            Ok(())
        });
    }
}
