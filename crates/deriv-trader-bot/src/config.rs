/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed and validated bot configuration
[POS]:    Configuration layer - connection and trading setup
[UPDATE]: When adding new configuration options
*/

use std::fmt;
use std::time::Duration;

use anyhow::{Context, bail};
use deriv_trader_adapter::ClientConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trader::TraderSettings;

/// API token; never printed by `Debug`
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// Top-level configuration for the trading bot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Token forwarded in the authorize call
    #[serde(default)]
    pub api_token: ApiToken,
    /// Underlying symbol (e.g., "R_100")
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Stake per order, in account currency
    #[serde(default = "default_amount")]
    pub amount: Decimal,
    /// Seconds between order attempts
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Stop after this many attempts; runs until interrupted when unset
    #[serde(default)]
    pub max_trades: Option<u32>,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Socket endpoint and timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_app_id")]
    pub app_id: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            app_id: default_app_id(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            app_id: self.app_id,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_token: ApiToken::default(),
            symbol: default_symbol(),
            amount: default_amount(),
            interval_secs: default_interval_secs(),
            max_trades: None,
            connection: ConnectionConfig::default(),
        }
    }
}

fn default_symbol() -> String {
    "R_100".to_string()
}

fn default_amount() -> Decimal {
    Decimal::from(10)
}

fn default_interval_secs() -> u64 {
    60
}

fn default_endpoint() -> String {
    ClientConfig::default().endpoint
}

fn default_app_id() -> u32 {
    ClientConfig::default().app_id
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl BotConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Reject settings the trade loop cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_token.is_empty() {
            bail!("api_token is required (config file, --token or DERIV_API_TOKEN)");
        }
        if self.symbol.trim().is_empty() {
            bail!("symbol must not be empty");
        }
        if self.amount <= Decimal::ZERO {
            bail!("amount must be positive, got {}", self.amount);
        }
        if self.interval_secs == 0 {
            bail!("interval_secs must be at least 1");
        }
        if self.connection.request_timeout_secs == 0 || self.connection.connect_timeout_secs == 0 {
            bail!("connection timeouts must be at least 1 second");
        }
        self.connection
            .client_config()
            .url()
            .context("invalid connection.endpoint")?;
        Ok(())
    }

    pub fn trader_settings(&self) -> TraderSettings {
        TraderSettings {
            symbol: self.symbol.clone(),
            amount: self.amount,
            interval: Duration::from_secs(self.interval_secs),
            max_trades: self.max_trades,
        }
    }
}
