//! Billing configuration.

use std::env;
use std::time::Duration;

/// Limits, rails and loop periods read once at start.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Free messages per UTC day for users without a subscription.
    pub free_daily_messages: i64,

    /// Days an expired subscription keeps entitling its owner.
    pub grace_period_days: i64,

    /// Identity that bypasses the free-tier counter.
    pub admin_user_id: Option<i64>,

    /// Currency recorded on crypto-rail payments.
    pub wallet_currency: String,

    /// Sleep between scheduler sweeps.
    pub scheduler_interval: Duration,

    /// Sleep between payment monitor polls.
    pub monitor_interval: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            free_daily_messages: 3,
            grace_period_days: 3,
            admin_user_id: None,
            wallet_currency: "USDT".to_string(),
            scheduler_interval: Duration::from_secs(3600),
            monitor_interval: Duration::from_secs(30),
        }
    }
}

impl BillingConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `FREE_TIER_DAILY_MESSAGES` - daily free limit (default: 3)
    /// - `GRACE_PERIOD_DAYS` - grace days after expiry (default: 3)
    /// - `ADMIN_USER_ID` - privileged user id
    /// - `WALLET_CURRENCY` - crypto rail currency (default: USDT)
    /// - `SCHEDULER_INTERVAL_SECS` - scheduler period (default: 3600)
    /// - `MONITOR_INTERVAL_SECS` - payment monitor period (default: 30)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            free_daily_messages: parse_env("FREE_TIER_DAILY_MESSAGES")
                .unwrap_or(defaults.free_daily_messages),
            grace_period_days: parse_env("GRACE_PERIOD_DAYS").unwrap_or(defaults.grace_period_days),
            admin_user_id: parse_env("ADMIN_USER_ID"),
            wallet_currency: env::var("WALLET_CURRENCY")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.wallet_currency),
            scheduler_interval: parse_env("SCHEDULER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.scheduler_interval),
            monitor_interval: parse_env("MONITOR_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.monitor_interval),
        }
    }

    /// Builder-style admin override.
    pub fn with_admin(mut self, user_id: i64) -> Self {
        self.admin_user_id = Some(user_id);
        self
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_id == Some(user_id)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value, "Ignoring unparseable environment value");
            None
        }
    }
}
