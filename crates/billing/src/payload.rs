//! Invoice payload carried through the payment provider and back.
//!
//! Format: `{kind}:{plan}:{user_id}` with an optional `:{payment_id}` suffix
//! when the invoice was opened against an existing payment.

use std::fmt;
use std::str::FromStr;

use crate::error::BillingError;
use crate::plans::Plan;

/// Which flow produced the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Subscription,
    Stars,
    Renewal,
    Card,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Subscription => "subscription",
            PayloadKind::Stars => "stars",
            PayloadKind::Renewal => "renewal",
            PayloadKind::Card => "card",
        }
    }
}

impl FromStr for PayloadKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(PayloadKind::Subscription),
            "stars" => Ok(PayloadKind::Stars),
            "renewal" => Ok(PayloadKind::Renewal),
            "card" => Ok(PayloadKind::Card),
            other => Err(BillingError::InvalidPayload(format!("unknown kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPayload {
    pub kind: PayloadKind,
    pub plan: &'static Plan,
    pub user_id: i64,
    pub payment_id: Option<i64>,
}

impl ProviderPayload {
    pub fn new(kind: PayloadKind, plan: &'static Plan, user_id: i64) -> Self {
        Self {
            kind,
            plan,
            user_id,
            payment_id: None,
        }
    }

    pub fn with_payment(mut self, payment_id: i64) -> Self {
        self.payment_id = Some(payment_id);
        self
    }
}

impl fmt::Display for ProviderPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.plan.id, self.user_id)?;
        if let Some(payment_id) = self.payment_id {
            write!(f, ":{payment_id}")?;
        }
        Ok(())
    }
}

impl FromStr for ProviderPayload {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(BillingError::InvalidPayload(format!(
                "expected kind:plan:user[:payment], got '{s}'"
            )));
        }

        let kind = parts[0].parse()?;
        let plan = Plan::require(parts[1])?;
        let user_id = parse_id(parts[2], "user id")?;
        let payment_id = parts.get(3).map(|p| parse_id(p, "payment id")).transpose()?;

        Ok(Self {
            kind,
            plan,
            user_id,
            payment_id,
        })
    }
}

fn parse_id(raw: &str, what: &str) -> Result<i64, BillingError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(BillingError::InvalidPayload(format!("bad {what} '{raw}'"))),
    }
}
