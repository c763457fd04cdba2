use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use billing::testing::{ScriptedFeed, ScriptedGateway};
use billing::{BillingConfig, ManualClock, Notice, RecordingNotifier};
use chrono::{TimeZone, Utc};
use database::Database;
use mock_brain::EchoBrain;
use orchestrator::{OrchestratorConfig, Persona};
use payment_rails::InvoiceStatus;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::app::Components;

const TOKEN: &str = "secret";
const ADMIN: i64 = 1;

struct TestApp {
    router: Router,
    notifier: RecordingNotifier,
    gateway: ScriptedGateway,
}

async fn app() -> TestApp {
    let db = Database::connect_in_memory().await.unwrap();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()));
    let notifier = RecordingNotifier::new();
    let gateway = ScriptedGateway::new();

    let service = Components {
        db,
        brain: Arc::new(EchoBrain::with_prefix("echo: ")),
        clock,
        persona: Persona::default(),
        billing: BillingConfig::default().with_admin(ADMIN),
        orchestrator: OrchestratorConfig::default(),
        telegram: None,
        notifier: Some(Arc::new(notifier.clone())),
        gateway: Some(Arc::new(gateway.clone())),
        feed: Some(Arc::new(ScriptedFeed::new())),
        wallet_address: Some("EQwallet".to_string()),
        api_token: Some(TOKEN.to_string()),
    }
    .build();

    TestApp {
        router: super::router(service.state),
        notifier,
        gateway,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, uri, Some(body), Some(TOKEN)).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri, None, Some(TOKEN)).await
}

#[tokio::test]
async fn health_is_public_and_v1_needs_the_token() {
    let app = app().await;

    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app.router, Method::GET, "/v1/users/7/status", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(&app.router, Method::GET, "/v1/users/7/status", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = get(&app.router, "/v1/users/7/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entitlement"]["state"], "free_active");
}

#[tokio::test]
async fn chat_turns_until_the_free_limit() {
    let app = app().await;
    let message = json!({"user_id": 7, "first_name": "Ann", "text": "hello"});

    for remaining in [2, 1, 0] {
        let (status, body) = post(&app.router, "/v1/messages", message.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "answer");
        assert_eq!(body["text"], "echo: hello");
        assert_eq!(body["free_remaining"], remaining);
    }

    let (_, body) = post(&app.router, "/v1/messages", message).await;
    assert_eq!(body, json!({"kind": "limit_reached", "limit": 3}));

    let (status, body) = post(&app.router, "/v1/users/7/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 6);

    let (status, _) = post(&app.router, "/v1/messages", json!({"user_id": 7, "text": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn crypto_checkout_confirmed_by_admin() {
    let app = app().await;

    let (status, body) = post(
        &app.router,
        "/v1/checkout",
        json!({"user_id": 7, "plan": "monthly", "rail": "crypto"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rail"], "crypto");
    assert_eq!(body["amount_cents"], 2000);
    assert_eq!(body["wallet_address"], "EQwallet");
    let payment_id = body["payment_id"].as_i64().unwrap();

    let (_, pending) = get(&app.router, &format!("/v1/admin/payments/pending?admin_id={ADMIN}")).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let confirm = format!("/v1/admin/payments/{payment_id}/confirm");
    let (status, _) = post(&app.router, &confirm, json!({"admin_id": 99})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&app.router, &confirm, json!({"admin_id": ADMIN})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan_type"], "monthly");
    assert_eq!(body["payment_id"], payment_id);

    let (status, _) = post(&app.router, &confirm, json!({"admin_id": ADMIN})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, status_view) = get(&app.router, "/v1/users/7/status").await;
    assert_eq!(status_view["entitlement"]["state"], "subscribed");
    assert_eq!(status_view["subscription"]["days_remaining"], 30);

    assert!(matches!(
        app.notifier.notices_for(7).as_slice(),
        [Notice::SubscriptionActivated { .. }]
    ));
}

#[tokio::test]
async fn rejected_and_self_cancelled_payments() {
    let app = app().await;
    let open = json!({"user_id": 7, "plan": "yearly", "rail": "crypto"});

    let (_, first) = post(&app.router, "/v1/checkout", open.clone()).await;
    let first = first["payment_id"].as_i64().unwrap();
    let (status, body) = post(
        &app.router,
        &format!("/v1/admin/payments/{first}/reject"),
        json!({"admin_id": ADMIN}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (_, second) = post(&app.router, "/v1/checkout", open).await;
    let second = second["payment_id"].as_i64().unwrap();
    let cancel = format!("/v1/payments/{second}/cancel");
    let (status, _) = post(&app.router, &cancel, json!({"user_id": 8})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = post(&app.router, &cancel, json!({"user_id": 7})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app.router,
        &format!("/v1/admin/payments/{second}/confirm"),
        json!({"admin_id": ADMIN}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(&app.router, "/v1/payments/999/cancel", json!({"user_id": 7})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoice_checkout_activates_on_check() {
    let app = app().await;

    let (status, body) = post(
        &app.router,
        "/v1/checkout",
        json!({"user_id": 7, "plan": "monthly", "rail": "invoice"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payment_id = body["payment_id"].as_i64().unwrap();
    assert!(body["pay_url"].as_str().unwrap().starts_with("https://pay.test/"));

    let check = format!("/v1/payments/{payment_id}/check");
    let (_, body) = post(&app.router, &check, json!({})).await;
    assert_eq!(body, json!({"status": "open", "invoice_status": "unpaid"}));

    let order_id = app.gateway.created().pop().unwrap();
    app.gateway.set_status(&order_id, InvoiceStatus::Paid);

    let (_, body) = post(&app.router, &check, json!({})).await;
    assert_eq!(body["status"], "activated");

    let (_, body) = post(&app.router, &check, json!({})).await;
    assert_eq!(body["status"], "already_completed");
}

#[tokio::test]
async fn provider_callbacks() {
    let app = app().await;

    let (status, body) = post(&app.router, "/v1/payments/pre-checkout", json!({"payload": "stars:monthly:7"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (_, body) = post(&app.router, "/v1/payments/pre-checkout", json!({"payload": "stars:weekly:7"})).await;
    assert_eq!(body["ok"], false);
    assert!(body["error_message"].as_str().unwrap().contains("weekly"));

    let completed = json!({
        "payload": "stars:monthly:7",
        "charge_id": "charge-1",
        "total_amount": 1000,
        "currency": "XTR"
    });
    let (status, body) = post(&app.router, "/v1/payments/completed", completed.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "activated");
    let payment_id = body["payment_id"].clone();

    let (_, body) = post(&app.router, "/v1/payments/completed", completed).await;
    assert_eq!(body, json!({"status": "duplicate", "payment_id": payment_id}));
}

#[tokio::test]
async fn grant_and_cancel_subscription() {
    let app = app().await;

    let (status, _) = post(&app.router, "/v1/users/7/subscription/cancel", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(
        &app.router,
        "/v1/admin/grants",
        json!({"admin_id": ADMIN, "user_id": 7, "plan": "yearly"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan_type"], "yearly");

    let (_, body) = post(&app.router, "/v1/users/7/subscription/cancel", json!({})).await;
    assert_eq!(body["auto_renew"], false);
    assert_eq!(body["cancelled"], false);

    let (_, body) = post(
        &app.router,
        "/v1/users/7/subscription/cancel",
        json!({"mode": "full", "reason": "moving on"}),
    )
    .await;
    assert_eq!(body["cancelled"], true);
}

#[tokio::test]
async fn checkout_validation() {
    let app = app().await;

    let (status, body) = post(
        &app.router,
        "/v1/checkout",
        json!({"user_id": 7, "plan": "weekly", "rail": "crypto"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown plan: weekly");

    let (status, _) = post(
        &app.router,
        "/v1/checkout",
        json!({"user_id": 7, "plan": "monthly", "rail": "stars"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn language_update() {
    let app = app().await;

    let (status, _) = post(&app.router, "/v1/users/7/language", json!({"language_code": "en"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post(&app.router, "/v1/messages", json!({"user_id": 7, "text": "hi"})).await;
    let (status, body) = post(&app.router, "/v1/users/7/language", json!({"language_code": "EN"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language_code"], "en");
}
