//! Rail-neutral payment types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// On-chain micro-units (6 decimals) in one cent.
pub const MICRO_PER_CENT: i64 = 10_000;

/// An inbound transfer seen on the receiving wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Transaction hash, unique per transfer.
    pub hash: String,
    /// Amount in micro-units (1 USDT = 1_000_000).
    pub amount_micro: i64,
    pub received_at: DateTime<Utc>,
    /// Sender address, when reported.
    pub source: Option<String>,
    /// Attached text comment, when reported.
    pub comment: Option<String>,
}

/// Status of a hosted invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    /// Payment seen but not yet settled.
    Pending,
    Paid,
    Failed,
}

impl InvoiceStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

/// A created hosted invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub order_id: String,
    /// Gateway-side invoice code.
    pub code: String,
    /// Link the user opens to pay.
    pub pay_url: String,
}

pub fn cents_to_micro(cents: i64) -> i64 {
    cents.saturating_mul(MICRO_PER_CENT)
}

/// `2000` -> `"20.00"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Unique gateway order id: `psy-{user}-{plan}-{8 hex}`.
pub fn generate_order_id(user_id: i64, plan_type: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("psy-{user_id}-{plan_type}-{}", &suffix[..8])
}
