//! Seams between reconciliation and the outside payment world.

use async_trait::async_trait;

use crate::error::RailError;
use crate::types::{Invoice, InvoiceStatus, Transfer};

/// Source of recent inbound transfers to the receiving wallet.
#[async_trait]
pub trait TransferFeed: Send + Sync {
    /// Most recent inbound transfers, newest first. May repeat earlier results.
    async fn recent_transfers(&self) -> Result<Vec<Transfer>, RailError>;

    fn name(&self) -> &str;
}

/// Hosted invoice provider polled for payment status.
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    /// Create a one-time invoice for `amount_cents` USD under `order_id`.
    async fn create_invoice(
        &self,
        order_id: &str,
        amount_cents: i64,
        description: &str,
    ) -> Result<Invoice, RailError>;

    /// Current status of the invoice created under `order_id`.
    async fn invoice_status(&self, order_id: &str) -> Result<InvoiceStatus, RailError>;

    fn name(&self) -> &str;
}
