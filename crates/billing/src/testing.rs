//! Scripted payment rails for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use payment_rails::{Invoice, InvoiceGateway, InvoiceStatus, RailError, Transfer, TransferFeed};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Transfer feed returning whatever was last pushed. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    transfers: Arc<Mutex<Vec<Transfer>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, transfer: Transfer) {
        lock(&self.transfers).push(transfer);
    }

    /// Make the next poll fail like an unreachable explorer.
    pub fn fail_next(&self) {
        *lock(&self.fail_next) = true;
    }
}

#[async_trait]
impl TransferFeed for ScriptedFeed {
    async fn recent_transfers(&self) -> Result<Vec<Transfer>, RailError> {
        if std::mem::take(&mut *lock(&self.fail_next)) {
            return Err(RailError::Api {
                status: 503,
                message: "explorer unavailable".to_string(),
            });
        }
        Ok(lock(&self.transfers).clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Invoice gateway with settable per-order statuses. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    statuses: Arc<Mutex<HashMap<String, InvoiceStatus>>>,
    created: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, order_id: &str, status: InvoiceStatus) {
        lock(&self.statuses).insert(order_id.to_string(), status);
    }

    /// Order ids of created invoices, in creation order.
    pub fn created(&self) -> Vec<String> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl InvoiceGateway for ScriptedGateway {
    async fn create_invoice(
        &self,
        order_id: &str,
        _amount_cents: i64,
        _description: &str,
    ) -> Result<Invoice, RailError> {
        lock(&self.created).push(order_id.to_string());
        lock(&self.statuses).insert(order_id.to_string(), InvoiceStatus::Unpaid);
        Ok(Invoice {
            order_id: order_id.to_string(),
            code: format!("code-{order_id}"),
            pay_url: format!("https://pay.test/{order_id}"),
        })
    }

    async fn invoice_status(&self, order_id: &str) -> Result<InvoiceStatus, RailError> {
        lock(&self.statuses)
            .get(order_id)
            .copied()
            .ok_or_else(|| RailError::Api {
                status: 404,
                message: format!("unknown order {order_id}"),
            })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
