use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Duration, NaiveDateTime};
use tower::ServiceExt;

use garagebook::config::AppConfig;
use garagebook::db;
use garagebook::handlers;
use garagebook::services::activity::ActivityLog;
use garagebook::services::host::PeriodicHost;
use garagebook::services::messaging::{EmailChannel, TextChannel};
use garagebook::services::notifications::AlertHost;
use garagebook::services::run::RunGuard;
use garagebook::services::store::SqliteStore;
use garagebook::state::AppState;

// ── Mock Providers ──

#[derive(Clone)]
struct MockText {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl TextChannel for MockText {
    async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Clone)]
struct MockEmail {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl EmailChannel for MockEmail {
    async fn send_email(&self, to: &str, _subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

struct MockAlerts {
    scheduled: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AlertHost for MockAlerts {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn cancel_all(&self) -> anyhow::Result<()> {
        self.scheduled.lock().unwrap().clear();
        Ok(())
    }

    async fn schedule(
        &self,
        _trigger_at: &NaiveDateTime,
        _title: &str,
        _body: &str,
        correlation_id: &str,
    ) -> anyhow::Result<()> {
        self.scheduled
            .lock()
            .unwrap()
            .push(correlation_id.to_string());
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        business_name: "Miko's Garage".to_string(),
        text_provider: "log".to_string(),
        twilio_account_sid: "".to_string(),
        twilio_auth_token: "".to_string(), // empty = skip signature validation
        twilio_phone_number: "".to_string(),
        email_provider: "log".to_string(),
        mailgun_domain: "".to_string(),
        mailgun_api_key: "".to_string(),
        mailgun_from: "".to_string(),
        alert_provider: "log".to_string(),
        alert_gateway_url: "".to_string(),
        alert_gateway_token: "".to_string(),
        reminder_interval_secs: 3600,
    }
}

struct TestHarness {
    state: Arc<AppState>,
    texts: Arc<Mutex<Vec<(String, String)>>>,
    emails: Arc<Mutex<Vec<(String, String)>>>,
    alerts: Arc<Mutex<Vec<String>>>,
}

fn test_harness() -> TestHarness {
    let conn = db::init_db(":memory:").unwrap();
    let db = Arc::new(Mutex::new(conn));

    let texts = Arc::new(Mutex::new(vec![]));
    let emails = Arc::new(Mutex::new(vec![]));
    let alerts = Arc::new(Mutex::new(vec![]));

    let state = Arc::new(AppState {
        db: Arc::clone(&db),
        config: test_config(),
        store: Arc::new(SqliteStore::new(Arc::clone(&db))),
        text: Box::new(MockText {
            sent: Arc::clone(&texts),
        }),
        email: Box::new(MockEmail {
            sent: Arc::clone(&emails),
        }),
        alerts: Box::new(MockAlerts {
            scheduled: Arc::clone(&alerts),
        }),
        alerts_granted: true,
        activity: ActivityLog::new(Arc::clone(&db)),
        host: PeriodicHost::new(),
        run_guard: RunGuard::new(),
    });

    TestHarness {
        state,
        texts,
        emails,
        alerts,
    }
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/clients",
            post(handlers::clients::create_client).get(handlers::clients::list_clients),
        )
        .route("/api/vehicles", post(handlers::clients::create_vehicle))
        .route(
            "/api/appointments",
            post(handlers::appointments::create_appointment)
                .get(handlers::appointments::list_appointments),
        )
        .route(
            "/api/appointments/:id/cancel",
            post(handlers::appointments::cancel_appointment),
        )
        .route(
            "/api/availability",
            get(handlers::appointments::check_availability),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route(
            "/api/admin/reminders/run",
            post(handlers::admin::trigger_reminder_run),
        )
        .route("/api/admin/activity", get(handlers::admin::get_activity))
        .route(
            "/webhook/delivery-status",
            post(handlers::webhook::delivery_status),
        )
        .with_state(state)
}

fn authed_json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", "Bearer test-token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_test_client(app: &Router, name: &str) -> String {
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/clients",
            serde_json::json!({
                "name": name,
                "phone": "+15551110000",
                "email": "alice@example.com",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["id"].as_str().unwrap().to_string()
}

async fn create_test_appointment(app: &Router, client_id: &str, scheduled_at: &str) -> String {
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/appointments",
            serde_json::json!({
                "client_id": client_id,
                "scheduled_at": scheduled_at,
                "duration_minutes": 60,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["id"].as_str().unwrap().to_string()
}

fn tomorrow_at_14() -> String {
    (chrono::Local::now().naive_local() + Duration::days(1))
        .date()
        .and_hms_opt(14, 0, 0)
        .unwrap()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// ── Tests ──

#[tokio::test]
async fn test_health() {
    let harness = test_harness();
    let app = test_app(harness.state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_requires_token() {
    let harness = test_harness();
    let app = test_app(harness.state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_booking_conflict_is_rejected() {
    let harness = test_harness();
    let app = test_app(harness.state);
    let client_id = create_test_client(&app, "Alice").await;

    create_test_appointment(&app, &client_id, "2030-06-17 10:00:00").await;

    // Overlapping slot
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/appointments",
            serde_json::json!({
                "client_id": client_id,
                "scheduled_at": "2030-06-17 10:30:00",
                "duration_minutes": 60,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Back-to-back is fine
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/appointments",
            serde_json::json!({
                "client_id": client_id,
                "scheduled_at": "2030-06-17 11:00:00",
                "duration_minutes": 30,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_availability_probe() {
    let harness = test_harness();
    let app = test_app(harness.state);
    let client_id = create_test_client(&app, "Alice").await;
    create_test_appointment(&app, &client_id, "2030-06-17 10:00:00").await;

    let response = app
        .clone()
        .oneshot(authed_get(
            "/api/availability?start=2030-06-17%2010:30:00&duration_minutes=60",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["available"], false);

    let response = app
        .clone()
        .oneshot(authed_get(
            "/api/availability?start=2030-06-17%2014:00:00&duration_minutes=60",
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["available"], true);
}

#[tokio::test]
async fn test_canceled_appointment_releases_slot() {
    let harness = test_harness();
    let app = test_app(harness.state);
    let client_id = create_test_client(&app, "Alice").await;
    let appointment_id = create_test_appointment(&app, &client_id, "2030-06-17 10:00:00").await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/appointments/{appointment_id}/cancel"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed_get(
            "/api/availability?start=2030-06-17%2010:00:00&duration_minutes=60",
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["available"], true);
}

#[tokio::test]
async fn test_manual_run_sends_reminder_once() {
    let harness = test_harness();
    let app = test_app(Arc::clone(&harness.state));
    let client_id = create_test_client(&app, "Alice").await;
    create_test_appointment(&app, &client_id, &tomorrow_at_14()).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "new-data");
    assert_eq!(body["summary"]["reminders_sent"], 1);

    assert_eq!(harness.texts.lock().unwrap().len(), 1);
    assert_eq!(harness.emails.lock().unwrap().len(), 1);
    assert!(!harness.alerts.lock().unwrap().is_empty());

    // Second run: flag gates dispatch, no new channel calls
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["summary"]["reminders_sent"], 0);
    assert_eq!(harness.texts.lock().unwrap().len(), 1);
    assert_eq!(harness.emails.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_canceled_appointment_is_not_reminded() {
    let harness = test_harness();
    let app = test_app(Arc::clone(&harness.state));
    let client_id = create_test_client(&app, "Alice").await;
    let appointment_id = create_test_appointment(&app, &client_id, &tomorrow_at_14()).await;

    app.clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/api/appointments/{appointment_id}/cancel"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "no-data");

    assert!(harness.texts.lock().unwrap().is_empty());
    assert!(harness.emails.lock().unwrap().is_empty());
    assert!(harness.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_overdue_scheduled_resolves_to_no_show() {
    let harness = test_harness();
    let app = test_app(Arc::clone(&harness.state));
    let client_id = create_test_client(&app, "Alice").await;
    create_test_appointment(&app, &client_id, "2020-01-06 10:00:00").await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "new-data");
    assert_eq!(body["summary"]["overdue_resolved"], 1);

    let response = app
        .clone()
        .oneshot(authed_get("/api/appointments?status=no-show"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_trigger_while_busy_is_a_no_op() {
    let harness = test_harness();
    let app = test_app(Arc::clone(&harness.state));
    let client_id = create_test_client(&app, "Alice").await;
    create_test_appointment(&app, &client_id, &tomorrow_at_14()).await;

    // Hold the guard as if a run were mid-flight
    let permit = harness.state.run_guard.try_acquire().unwrap();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "busy");

    // No channel traffic happened
    assert!(harness.texts.lock().unwrap().is_empty());
    assert!(harness.emails.lock().unwrap().is_empty());
    assert!(harness.alerts.lock().unwrap().is_empty());

    // Released guard lets the next trigger through
    drop(permit);
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "new-data");
}

#[tokio::test]
async fn test_run_writes_activity_lines() {
    let harness = test_harness();
    let app = test_app(Arc::clone(&harness.state));
    let client_id = create_test_client(&app, "Alice").await;
    create_test_appointment(&app, &client_id, &tomorrow_at_14()).await;

    app.clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/admin/reminders/run",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_get("/api/admin/activity"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let lines = body.as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0]["line"].as_str().unwrap().contains("reminder text sent"));
    assert!(lines[1]["line"].as_str().unwrap().contains("reminder email sent"));
}

#[tokio::test]
async fn test_delivery_status_failure_is_recorded() {
    let harness = test_harness();
    let app = test_app(Arc::clone(&harness.state));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/delivery-status")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(
                    "MessageSid=SM123&MessageStatus=failed&To=%2B15551110000&ErrorCode=30003",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed_get("/api/admin/activity"))
        .await
        .unwrap();
    let body = json_body(response).await;
    let lines = body.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0]["line"].as_str().unwrap().contains("failed"));
}

#[tokio::test]
async fn test_vehicle_must_belong_to_client() {
    let harness = test_harness();
    let app = test_app(harness.state);
    let alice = create_test_client(&app, "Alice").await;
    let bob = create_test_client(&app, "Bob").await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/vehicles",
            serde_json::json!({
                "client_id": alice,
                "make": "Honda",
                "model": "Civic",
                "plate": "ABC-123",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let vehicle_id = json_body(response).await["id"].as_str().unwrap().to_string();

    // Booking Bob's appointment with Alice's vehicle is rejected
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/appointments",
            serde_json::json!({
                "client_id": bob,
                "vehicle_id": vehicle_id,
                "scheduled_at": "2030-06-17 10:00:00",
                "duration_minutes": 60,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
