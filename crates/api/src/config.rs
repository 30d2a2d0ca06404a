//! Configuration - TOML file, environment overrides, validation

use horizon_core::{AccountId, Amount};
use horizon_index::NetworkSettings;
use horizon_store::StoreOptions;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DATABASE_URL: &str = "HORIZON_DATABASE_URL";
pub const ENV_LISTEN: &str = "HORIZON_LISTEN";
pub const ENV_NETWORK_PASSPHRASE: &str = "HORIZON_NETWORK_PASSPHRASE";

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HorizonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,

    /// Permissive CORS on every route
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            cors: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_url() -> String {
    "sqlite://horizon.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_passphrase")]
    pub passphrase: String,

    /// Stroops
    #[serde(default = "default_base_fee")]
    pub base_fee: i64,

    #[serde(default = "default_base_reserve")]
    pub base_reserve: Amount,

    /// Receives the whole native supply at genesis
    #[serde(default = "default_root_account")]
    pub root_account: String,

    #[serde(default = "default_total_coins")]
    pub total_coins: Amount,
}

fn default_passphrase() -> String {
    "Horizon Local Network ; 2024".to_string()
}

fn default_base_fee() -> i64 {
    100
}

fn default_base_reserve() -> Amount {
    Amount::from_stroops(5_000_000)
}

fn default_root_account() -> String {
    "GROOT".to_string()
}

fn default_total_coins() -> Amount {
    Amount::from_stroops(100_000_000_000 * 10_000_000)
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            passphrase: default_passphrase(),
            base_fee: default_base_fee(),
            base_reserve: default_base_reserve(),
            root_account: default_root_account(),
            total_coins: default_total_coins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Seconds between automatic closes; 0 disables the closer
    #[serde(default = "default_close_interval")]
    pub close_interval_secs: u64,
}

fn default_close_interval() -> u64 {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            close_interval_secs: default_close_interval(),
        }
    }
}

impl HorizonConfig {
    /// Load from an optional file, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `HORIZON_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(listen) = lookup(ENV_LISTEN) {
            self.server.listen = listen.parse().map_err(|_| {
                ConfigError::Validation(format!("{} is not a socket address: {}", ENV_LISTEN, listen))
            })?;
        }
        if let Some(passphrase) = lookup(ENV_NETWORK_PASSPHRASE) {
            self.network.passphrase = passphrase;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url is empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.network.passphrase.trim().is_empty() {
            return Err(ConfigError::Validation(
                "network.passphrase is empty".to_string(),
            ));
        }
        self.root_account()?;
        if self.network.base_fee < 0 {
            return Err(ConfigError::Validation(format!(
                "network.base_fee must not be negative: {}",
                self.network.base_fee
            )));
        }
        if self.network.base_reserve.is_negative() {
            return Err(ConfigError::Validation(format!(
                "network.base_reserve must not be negative: {}",
                self.network.base_reserve
            )));
        }
        if !self.network.total_coins.is_positive() {
            return Err(ConfigError::Validation(format!(
                "network.total_coins must be positive: {}",
                self.network.total_coins
            )));
        }
        Ok(())
    }

    pub fn root_account(&self) -> Result<AccountId, ConfigError> {
        self.network.root_account.parse().map_err(|e| {
            ConfigError::Validation(format!("network.root_account: {}", e))
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.database.max_connections,
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
        }
    }

    pub fn network_settings(&self) -> NetworkSettings {
        NetworkSettings {
            passphrase: self.network.passphrase.clone(),
            base_fee: self.network.base_fee,
            base_reserve: self.network.base_reserve,
        }
    }

    /// None when the automatic closer is disabled
    pub fn close_interval(&self) -> Option<Duration> {
        match self.ledger.close_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
