//! Hourly subscription sweeps.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::lifecycle::SubscriptionManager;

/// Counts from one scheduler pass. A failed step counts as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub reminders_sent: usize,
    pub renewal_invoices_sent: usize,
    pub deactivated: u64,
}

/// Runs reminders, renewal invoices and deactivation, in that order.
#[derive(Clone)]
pub struct Scheduler {
    subscriptions: Arc<SubscriptionManager>,
}

impl Scheduler {
    pub fn new(subscriptions: Arc<SubscriptionManager>) -> Self {
        Self { subscriptions }
    }

    /// One pass. Each step is isolated from the others' failures.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.subscriptions.sweep_reminders().await {
            Ok(sent) => report.reminders_sent = sent,
            Err(e) => error!(error = %e, "Reminder sweep failed"),
        }
        match self.subscriptions.sweep_auto_renew_invoices().await {
            Ok(sent) => report.renewal_invoices_sent = sent,
            Err(e) => error!(error = %e, "Renewal invoice sweep failed"),
        }
        match self.subscriptions.sweep_expirations().await {
            Ok(count) => report.deactivated = count,
            Err(e) => error!(error = %e, "Expiration sweep failed"),
        }

        if report != SweepReport::default() {
            info!(?report, "Scheduler pass complete");
        }
        report
    }
}
