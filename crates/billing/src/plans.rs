//! Plan catalogue.

use chrono::Duration;
use serde::Serialize;

use crate::error::{BillingError, Result};

/// A purchasable subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: &'static str,
    pub title: &'static str,
    /// Price in US cents on the card and crypto rails.
    pub price_cents: i64,
    /// Price in Telegram Stars.
    pub stars: i64,
    pub duration_days: i64,
}

pub const MONTHLY: Plan = Plan {
    id: "monthly",
    title: "Monthly subscription",
    price_cents: 2000,
    stars: 1000,
    duration_days: 30,
};

pub const YEARLY: Plan = Plan {
    id: "yearly",
    title: "Yearly subscription",
    price_cents: 16800,
    stars: 8400,
    duration_days: 365,
};

/// Every plan on sale.
pub const PLANS: [Plan; 2] = [MONTHLY, YEARLY];

impl Plan {
    pub fn find(id: &str) -> Option<&'static Plan> {
        PLANS.iter().find(|plan| plan.id == id)
    }

    /// Like [`Plan::find`], but an unknown id is a validation error.
    pub fn require(id: &str) -> Result<&'static Plan> {
        Self::find(id).ok_or_else(|| BillingError::UnknownPlan(id.to_string()))
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.duration_days)
    }

    /// Invoice description shown to the payer.
    pub fn description(&self) -> String {
        format!("{} ({} days of unlimited messages)", self.title, self.duration_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_lookup() {
        assert_eq!(Plan::find("monthly"), Some(&MONTHLY));
        assert_eq!(Plan::require("yearly").unwrap().price_cents, 16800);
        assert!(matches!(
            Plan::require("weekly"),
            Err(BillingError::UnknownPlan(id)) if id == "weekly"
        ));
    }

    #[test]
    fn durations() {
        assert_eq!(MONTHLY.duration(), Duration::days(30));
        assert_eq!(YEARLY.duration(), Duration::days(365));
        assert!(YEARLY.description().contains("365 days"));
    }
}
