//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use database::sqlite_url_from_path;

/// Default SQLite file when neither `DATABASE_URL` nor `SQLITE_PATH` is set.
pub const DEFAULT_DATABASE_PATH: &str = "./data/support.db";

/// Service configuration. Billing, memory and generator settings are read
/// by their own crates.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Bearer token required on every route except `/health`.
    pub api_token: Option<String>,
    /// Receiving wallet for the crypto rail; unset disables the monitor feed.
    pub wallet_address: Option<String>,
    pub toncenter_api_url: String,
    pub toncenter_api_key: Option<String>,
    /// Bot token for notices and invoices; unset logs notices instead.
    pub telegram_bot_token: Option<String>,
    /// Card rail token; unset disables card checkout and renewal invoices.
    pub payment_provider_token: Option<String>,
    /// Invoice gateway payee; unset disables the gateway.
    pub mixpay_payee_id: Option<String>,
    /// How long background tasks get to stop on shutdown.
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `API_ADDR` | Server bind address | `127.0.0.1:8787` |
    /// | `DATABASE_URL` / `SQLITE_PATH` | SQLite URL or path | `./data/support.db` |
    /// | `API_TOKEN` | Bearer token | (none, auth disabled) |
    /// | `WALLET_ADDRESS` | Crypto rail wallet | (none) |
    /// | `TONCENTER_API_URL` | Explorer endpoint | `https://toncenter.com/api/v2` |
    /// | `TONCENTER_API_KEY` | Explorer key | (none) |
    /// | `TELEGRAM_BOT_TOKEN` | Notification channel | (none) |
    /// | `PAYMENT_PROVIDER_TOKEN` | Card rail | (none) |
    /// | `MIXPAY_PAYEE_ID` | Invoice gateway | (none) |
    /// | `SHUTDOWN_GRACE_SECS` | Task stop deadline | `10` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = optional("DATABASE_URL")
            .or_else(|| optional("SQLITE_PATH"))
            .map(|value| sqlite_url_from_path(&value))
            .unwrap_or_else(|| sqlite_url_from_path(DEFAULT_DATABASE_PATH));

        let shutdown_grace = match optional("SHUTDOWN_GRACE_SECS") {
            Some(value) => Duration::from_secs(
                value
                    .parse()
                    .map_err(|_| ConfigError::Invalid("SHUTDOWN_GRACE_SECS"))?,
            ),
            None => Duration::from_secs(10),
        };

        Ok(Self {
            addr,
            database_url,
            api_token: optional("API_TOKEN"),
            wallet_address: optional("WALLET_ADDRESS"),
            toncenter_api_url: optional("TONCENTER_API_URL")
                .unwrap_or_else(|| payment_rails::TonCenterConfig::DEFAULT_API_URL.to_string()),
            toncenter_api_key: optional("TONCENTER_API_KEY"),
            telegram_bot_token: optional("TELEGRAM_BOT_TOKEN"),
            payment_provider_token: optional("PAYMENT_PROVIDER_TOKEN"),
            mixpay_payee_id: optional("MIXPAY_PAYEE_ID"),
            shutdown_grace,
        })
    }

    /// Filesystem path behind `database_url`, when it points at a file.
    pub fn database_path(&self) -> Option<&str> {
        let rest = self.database_url.strip_prefix("sqlite:")?;
        let path = rest.split('?').next().unwrap_or(rest).trim_start_matches("//");
        (!path.is_empty() && !path.starts_with(":memory:")).then_some(path)
    }
}

/// Non-empty env var.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API_ADDR format")]
    InvalidAddr,

    #[error("Invalid value for {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> Config {
        Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            database_url: url.to_string(),
            api_token: None,
            wallet_address: None,
            toncenter_api_url: String::new(),
            toncenter_api_key: None,
            telegram_bot_token: None,
            payment_provider_token: None,
            mixpay_payee_id: None,
            shutdown_grace: Duration::from_secs(1),
        }
    }

    #[test]
    fn database_path_from_url() {
        assert_eq!(
            config(&sqlite_url_from_path(DEFAULT_DATABASE_PATH)).database_path(),
            Some("./data/support.db")
        );
        assert_eq!(config("sqlite:///var/lib/bot.db").database_path(), Some("/var/lib/bot.db"));
        assert_eq!(config("sqlite::memory:").database_path(), None);
    }
}
