//! Billing for the support bot.
//!
//! - [`entitlement`] - who may send a message, and the free-tier gate
//! - [`lifecycle`] - creating, cancelling and sweeping subscriptions
//! - [`reconcile`] - settling payments from admin, blockchain, provider and
//!   invoice-gateway confirmations
//! - [`scheduler`] / [`monitor`] - the periodic work, run under a
//!   [`TaskSupervisor`]
//!
//! Subscriptions are only ever created inside a transaction that also
//! moves the paying payment out of `awaiting_confirmation`, so one payment
//! activates at most one subscription.

pub mod clock;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod notifier;
pub mod payload;
pub mod plans;
pub mod reconcile;
pub mod scheduler;
pub mod tasks;
pub mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BillingConfig;
pub use entitlement::{Admission, Entitlement, EntitlementService, StatusView, SubscriptionStatus};
pub use error::{BillingError, Result};
pub use lifecycle::{CancelMode, SubscriptionManager};
pub use monitor::PaymentMonitor;
pub use notifier::{
    InvoiceSender, LoggingNotifier, NoOpNotifier, Notice, Notifier, RecordingNotifier,
};
pub use payload::{PayloadKind, ProviderPayload};
pub use plans::{Plan, PLANS};
pub use reconcile::{
    amount_matches, Completion, InvoiceCheck, PaymentEngine, ProviderCompletion, SeenTransfers,
};
pub use scheduler::{Scheduler, SweepReport};
pub use tasks::TaskSupervisor;
