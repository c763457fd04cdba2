//! Payment monitor: polls the transfer feed and open invoices.

use std::sync::Arc;

use payment_rails::TransferFeed;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::reconcile::{PaymentEngine, SeenTransfers};

pub struct PaymentMonitor {
    engine: Arc<PaymentEngine>,
    feed: Option<Arc<dyn TransferFeed>>,
    seen: Mutex<SeenTransfers>,
}

impl PaymentMonitor {
    pub fn new(engine: Arc<PaymentEngine>) -> Self {
        Self {
            engine,
            feed: None,
            seen: Mutex::new(SeenTransfers::default()),
        }
    }

    /// Watch a receiving wallet.
    pub fn with_feed(mut self, feed: Arc<dyn TransferFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Whether there is anything to poll.
    pub fn is_enabled(&self) -> bool {
        self.feed.is_some() || self.engine.has_gateway()
    }

    /// Match new transfers. Feed errors are returned for the caller to log;
    /// the next poll simply tries again.
    pub async fn poll_transfers(&self) -> Result<usize> {
        let Some(feed) = &self.feed else {
            return Ok(0);
        };
        let transfers = feed.recent_transfers().await?;
        let mut seen = self.seen.lock().await;
        self.engine.process_transfers(&transfers, &mut seen).await
    }

    /// One monitor iteration over both sources.
    pub async fn run_once(&self) -> usize {
        let mut confirmed = 0;

        match self.poll_transfers().await {
            Ok(count) => confirmed += count,
            Err(e) if e.is_transient() => warn!(error = %e, "Transfer poll failed, retrying next tick"),
            Err(e) => warn!(error = %e, "Transfer poll failed"),
        }
        match self.engine.check_open_invoices().await {
            Ok(count) => confirmed += count,
            Err(e) => warn!(error = %e, "Invoice poll failed"),
        }

        if confirmed > 0 {
            info!(confirmed, "Payments confirmed by monitor");
        }
        confirmed
    }
}
