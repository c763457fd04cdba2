//! Service wiring. Every collaborator is passed in explicitly so tests can
//! build the same graph with doubles.

use std::sync::Arc;

use billing::{
    BillingConfig, Clock, EntitlementService, InvoiceSender, LoggingNotifier, Notifier,
    PaymentEngine, PaymentMonitor, Scheduler, SubscriptionManager, TaskSupervisor,
};
use brain_core::Brain;
use database::Database;
use orchestrator::{ChatOrchestrator, OrchestratorConfig, Persona};
use payment_rails::{InvoiceGateway, TransferFeed};
use tracing::info;

use crate::state::AppState;
use crate::telegram::TelegramChannel;

/// Everything the service is built from.
pub struct Components {
    pub db: Database,
    pub brain: Arc<dyn Brain>,
    pub clock: Arc<dyn Clock>,
    pub persona: Persona,
    pub billing: BillingConfig,
    pub orchestrator: OrchestratorConfig,
    pub telegram: Option<TelegramChannel>,
    /// Overrides the notice channel; defaults to Telegram, else logging.
    pub notifier: Option<Arc<dyn Notifier>>,
    pub gateway: Option<Arc<dyn InvoiceGateway>>,
    pub feed: Option<Arc<dyn TransferFeed>>,
    pub wallet_address: Option<String>,
    pub api_token: Option<String>,
}

/// The built service: HTTP state plus the two background loops.
pub struct Service {
    pub state: AppState,
    pub scheduler: Scheduler,
    pub monitor: Arc<PaymentMonitor>,
}

impl Components {
    pub fn build(self) -> Service {
        let notifier: Arc<dyn Notifier> = match (self.notifier, &self.telegram) {
            (Some(notifier), _) => notifier,
            (None, Some(telegram)) => Arc::new(telegram.clone()),
            (None, None) => Arc::new(LoggingNotifier),
        };

        let entitlement = Arc::new(EntitlementService::new(
            self.db.clone(),
            self.clock.clone(),
            &self.billing,
        ));

        let mut subscriptions = SubscriptionManager::new(
            self.db.clone(),
            self.clock.clone(),
            notifier.clone(),
            self.billing.grace_period_days,
        );
        if let Some(telegram) = self.telegram.as_ref().filter(|t| t.card_payments_enabled()) {
            let sender: Arc<dyn InvoiceSender> = Arc::new(telegram.clone());
            subscriptions = subscriptions.with_invoice_sender(sender);
        }
        let subscriptions = Arc::new(subscriptions);

        let mut payments = PaymentEngine::new(
            self.db.clone(),
            self.clock.clone(),
            notifier,
            self.billing.wallet_currency.clone(),
        );
        if let Some(gateway) = self.gateway {
            payments = payments.with_gateway(gateway);
        }
        let payments = Arc::new(payments);

        let mut monitor = PaymentMonitor::new(payments.clone());
        if let Some(feed) = self.feed {
            monitor = monitor.with_feed(feed);
        }

        let orchestrator = Arc::new(ChatOrchestrator::new(
            self.db.clone(),
            self.brain,
            entitlement.clone(),
            self.clock,
            self.persona,
            self.orchestrator,
        ));

        info!(
            telegram = self.telegram.is_some(),
            gateway = payments.has_gateway(),
            monitor = monitor.is_enabled(),
            auth = self.api_token.is_some(),
            "Service wired"
        );

        Service {
            state: AppState {
                db: self.db,
                orchestrator,
                entitlement,
                subscriptions: subscriptions.clone(),
                payments,
                telegram: self.telegram,
                wallet_address: self.wallet_address,
                api_token: self.api_token.map(Arc::from),
            },
            scheduler: Scheduler::new(subscriptions),
            monitor: Arc::new(monitor),
        }
    }
}

impl Service {
    /// Start the scheduler and, when there is something to poll, the monitor.
    pub fn spawn_background(&self, billing: &BillingConfig) -> TaskSupervisor {
        let mut tasks = TaskSupervisor::new();

        let scheduler = self.scheduler.clone();
        tasks.spawn_periodic("scheduler", billing.scheduler_interval, move || {
            let scheduler = scheduler.clone();
            async move {
                scheduler.run_once().await;
            }
        });

        if self.monitor.is_enabled() {
            let monitor = self.monitor.clone();
            tasks.spawn_periodic("payment-monitor", billing.monitor_interval, move || {
                let monitor = monitor.clone();
                async move {
                    monitor.run_once().await;
                }
            });
        } else {
            info!("No transfer feed or invoice gateway configured, payment monitor disabled");
        }

        tasks
    }
}
