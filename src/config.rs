use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Engine configuration, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub betting: BettingConfig,
    pub storage: StorageConfig,
}

/// Betting floor and pricing knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BettingConfig {
    /// Smallest stake a placement will accept, in C$.
    pub minimum_stake: Decimal,
}

/// Storage contention knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite busy timeout applied per connection, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Attempts per operation before surfacing `Unavailable`.
    pub max_retries: u32,
    /// Connection pool size.
    pub pool_size: u32,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.betting.minimum_stake <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "betting.minimum_stake",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.storage.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_retries",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.storage.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.pool_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            betting: BettingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            minimum_stake: dec!(1.00),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            max_retries: 3,
            pool_size: 5,
        }
    }
}
