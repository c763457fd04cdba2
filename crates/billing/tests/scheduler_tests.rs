//! Scheduler passes over a small population of subscriptions.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use billing::{
    Admission, BillingConfig, Entitlement, EntitlementService, ManualClock, RecordingNotifier,
    Scheduler, SubscriptionManager, SweepReport, TaskSupervisor,
};
use chrono::{Duration, TimeZone, Utc};
use database::Database;

#[tokio::test]
async fn a_subscription_from_activation_to_expiry() {
    let db = Database::connect_in_memory().await.unwrap();
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let notifier = RecordingNotifier::new();
    let config = BillingConfig::default();

    let manager = Arc::new(
        SubscriptionManager::new(db.clone(), clock.clone(), Arc::new(notifier.clone()), 3)
            .with_invoice_sender(Arc::new(notifier.clone())),
    );
    let entitlement = EntitlementService::new(db.clone(), clock.clone(), &config);
    let scheduler = Scheduler::new(manager.clone());

    manager.create_subscription(1, "monthly", None).await.unwrap();
    assert_eq!(scheduler.run_once().await, SweepReport::default());

    // Three days out: first reminder.
    clock.set(start + Duration::days(27));
    assert_eq!(scheduler.run_once().await.reminders_sent, 1);

    // The day before: second reminder and the renewal invoice.
    clock.set(start + Duration::days(29));
    let report = scheduler.run_once().await;
    assert_eq!(report.reminders_sent, 1);
    assert_eq!(report.renewal_invoices_sent, 1);

    // Expiry day: last reminder, grace begins.
    clock.set(start + Duration::days(30) + Duration::hours(1));
    assert_eq!(scheduler.run_once().await.reminders_sent, 1);
    assert!(matches!(
        entitlement.evaluate(1).await.unwrap(),
        Entitlement::Grace { .. }
    ));
    assert!(matches!(
        entitlement.admit(1).await.unwrap(),
        Admission::Entitled(Entitlement::Grace { .. })
    ));

    // Past grace: deactivated, back on the free tier.
    clock.set(start + Duration::days(34));
    assert_eq!(scheduler.run_once().await.deactivated, 1);
    assert_eq!(
        entitlement.evaluate(1).await.unwrap(),
        Entitlement::FreeActive { remaining: 3 }
    );
    assert_eq!(notifier.invoices().len(), 1);
}

#[tokio::test]
async fn supervisor_runs_the_scheduler_until_shutdown() {
    let db = Database::connect_in_memory().await.unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let manager = Arc::new(SubscriptionManager::new(
        db,
        clock,
        Arc::new(RecordingNotifier::new()),
        3,
    ));
    let scheduler = Scheduler::new(manager);

    let mut supervisor = TaskSupervisor::new();
    supervisor.spawn_periodic("scheduler", StdDuration::from_millis(20), move || {
        let scheduler = scheduler.clone();
        async move {
            scheduler.run_once().await;
        }
    });

    tokio::time::sleep(StdDuration::from_millis(70)).await;
    let token = supervisor.token();
    supervisor.shutdown(StdDuration::from_secs(5)).await;
    assert!(token.is_cancelled());
}
