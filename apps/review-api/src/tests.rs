//! Router and queue tests against an in-memory database
//!
//! Test categories:
//! - Order intake (validation, secret, idempotency, scheduling)
//! - Email queue processing (cancellation, failures, budget, leases)
//! - Review submission and the order-review flow
//! - Public display and moderation

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use review_core::{schedule, NewOrder, Review, ReviewStatus};
use review_mailer::{MailerError, ReviewEmailRequest, SendEmailResponse};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::db;
use crate::dispatch::EmailDispatcher;
use crate::processor::{process_due, MAX_TRANSITIONS_PER_RUN};
use crate::router;
use crate::state::AppState;

const SERVICE_KEY: &str = "svc-key";
const ADMIN_TOKEN: &str = "admin-token";

/// Records every email instead of sending it; fails for one chosen recipient
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<ReviewEmailRequest>>,
    fail_for: Option<(String, String)>,
}

impl RecordingMailer {
    fn failing_for(recipient: &str, body: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some((recipient.to_string(), body.to_string())),
        }
    }

    fn sent(&self) -> Vec<ReviewEmailRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailDispatcher for RecordingMailer {
    async fn dispatch(
        &self,
        request: &ReviewEmailRequest,
    ) -> Result<SendEmailResponse, MailerError> {
        if let Some((recipient, body)) = &self.fail_for {
            if recipient == &request.to {
                return Err(MailerError::Provider {
                    status: 500,
                    body: body.clone(),
                });
            }
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(SendEmailResponse {
            id: Some(format!("msg-{}", sent.len())),
            accepted_at: Utc::now(),
        })
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        webhook_secret: None,
        service_key: Some(SERVICE_KEY.to_string()),
        admin_token: Some(ADMIN_TOKEN.to_string()),
    }
}

async fn setup_with(config: AppConfig, mailer: Arc<RecordingMailer>) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::in_memory(config, mailer).await.unwrap());
    (router(state.clone()), state)
}

async fn setup() -> (Router, Arc<AppState>, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    let (app, state) = setup_with(test_config(), mailer.clone()).await;
    (app, state, mailer)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

fn order_payload(order_id: &str, email: &str) -> Value {
    json!({
        "orderId": order_id,
        "customerEmail": email,
        "customerName": "Jane Doe",
        "productId": "phone-x",
        "productName": "Phone X",
        "purchaseDate": "2024-01-01T00:00:00Z",
    })
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await.unwrap();
    n
}

/// Insert an order and its two jobs the way the webhook does
async fn seed_order(pool: &SqlitePool, order_id: &str, email: &str, purchase: DateTime<Utc>) {
    let new_order = NewOrder {
        order_id: order_id.to_string(),
        customer_email: email.to_string(),
        customer_name: "Jane Doe".to_string(),
        product_id: "phone-x".to_string(),
        product_name: "Phone X".to_string(),
        purchase_date: purchase,
    };
    let order = db::insert_order(pool, &new_order, Utc::now())
        .await
        .unwrap()
        .unwrap();
    for job in schedule(&order) {
        db::insert_email_job(pool, &job, Utc::now()).await.unwrap();
    }
}

fn review(id: &str, rating: u8, status: ReviewStatus, images: usize) -> Review {
    Review {
        id: id.to_string(),
        product_id: "phone-x".to_string(),
        author: "Sam".to_string(),
        avatar_url: None,
        author_email: None,
        created_at: Utc::now(),
        rating,
        text: "Solid phone, battery lasts".to_string(),
        images: (0..images)
            .map(|i| format!("https://cdn.test/{}-{}.jpg", id, i))
            .collect(),
        verified_purchase: false,
        status,
        order_id: None,
    }
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn health_reports_service() {
    let (app, _, _) = setup().await;
    let (status, body) = call(&app, "GET", "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "review-api");
}

// ============================================================
// Order intake
// ============================================================

#[tokio::test]
async fn webhook_schedules_two_emails() {
    let (app, state, _) = setup().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/orders/webhook",
        &[],
        Some(order_payload("ORD-1", "jane@example.com")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["orderId"], "ORD-1");
    assert_eq!(body["emailsScheduled"]["initialRequest"], "2024-01-08T00:00:00Z");
    assert_eq!(body["emailsScheduled"]["reminder"], "2024-01-16T00:00:00Z");

    let jobs: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT email_type, scheduled_for, status FROM email_queue ORDER BY scheduled_for",
    )
    .fetch_all(&state.db)
    .await
    .unwrap();
    assert_eq!(
        jobs,
        vec![
            (
                "initial_request".to_string(),
                "2024-01-08T00:00:00.000Z".to_string(),
                "pending".to_string()
            ),
            (
                "reminder".to_string(),
                "2024-01-16T00:00:00.000Z".to_string(),
                "pending".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn duplicate_order_is_acknowledged_without_rescheduling() {
    let (app, state, _) = setup().await;
    let payload = order_payload("ORD-1", "jane@example.com");

    call(&app, "POST", "/api/orders/webhook", &[], Some(payload.clone())).await;
    let (status, body) = call(&app, "POST", "/api/orders/webhook", &[], Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Order already exists");
    assert!(body.get("emailsScheduled").is_none());
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM orders").await, 1);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM email_queue").await, 2);
}

#[tokio::test]
async fn webhook_rejects_missing_fields() {
    let (app, state, _) = setup().await;
    let mut payload = order_payload("ORD-1", "jane@example.com");
    payload["productName"] = json!("  ");

    let (status, body) = call(&app, "POST", "/api/orders/webhook", &[], Some(payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(body["status"], 400);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM orders").await, 0);
}

#[tokio::test]
async fn webhook_rejects_purchase_date_past_the_schedule_horizon() {
    let (app, state, mailer) = setup().await;
    let mut payload = order_payload("ORD-FAR", "far@example.com");
    payload["purchaseDate"] = json!("9999-12-30");

    let (status, body) = call(&app, "POST", "/api/orders/webhook", &[], Some(payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid purchase date: 9999-12-30");
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM orders").await, 0);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM email_queue").await, 0);

    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 9)).await.unwrap();
    assert_eq!(summary.processed, 0);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn webhook_rejects_malformed_json() {
    let (app, _, _) = setup().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/orders/webhook")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_checks_secret_when_configured() {
    let config = AppConfig {
        webhook_secret: Some("hook-secret".to_string()),
        ..test_config()
    };
    let (app, state) = setup_with(config, Arc::new(RecordingMailer::default())).await;
    let payload = order_payload("ORD-1", "jane@example.com");

    let (status, body) =
        call(&app, "POST", "/api/orders/webhook", &[], Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid webhook secret");

    let (status, _) = call(
        &app,
        "POST",
        "/api/orders/webhook",
        &[("x-webhook-secret", "wrong")],
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM orders").await, 0);

    let (status, _) = call(
        &app,
        "POST",
        "/api/orders/webhook",
        &[("x-webhook-secret", "hook-secret")],
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================
// Email queue processing
// ============================================================

#[tokio::test]
async fn processing_requires_service_key() {
    let (app, _, _) = setup().await;

    let (status, _) = call(&app, "POST", "/api/email-queue/process", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/api/email-queue/process",
        &[("authorization", bearer(ADMIN_TOKEN).as_str())],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn service_endpoints_refuse_everyone_without_a_key() {
    let config = AppConfig {
        service_key: None,
        ..test_config()
    };
    let (app, _) = setup_with(config, Arc::new(RecordingMailer::default())).await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/email-queue/process",
        &[("authorization", "Bearer ")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_due_jobs_are_sent() {
    let (_, state, mailer) = setup().await;
    seed_order(&state.db, "ORD-1", "jane@example.com", at(2024, 1, 1)).await;

    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 9)).await.unwrap();
    assert_eq!((summary.processed, summary.sent), (1, 1));

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@example.com");
    assert_eq!(sent[0].product_name, "Phone X");
    assert_eq!(sent[0].email_type, review_core::EmailType::InitialRequest);

    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 16)).await.unwrap();
    assert_eq!((summary.processed, summary.sent), (1, 1));
    assert_eq!(mailer.sent()[1].email_type, review_core::EmailType::Reminder);
    assert_eq!(
        count(&state.db, "SELECT COUNT(*) FROM email_queue WHERE status = 'sent' AND sent_at IS NOT NULL").await,
        2
    );
}

#[tokio::test]
async fn process_endpoint_reports_results() {
    let (app, state, mailer) = setup().await;
    seed_order(&state.db, "ORD-1", "jane@example.com", at(2024, 1, 1)).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/email-queue/process",
        &[("authorization", bearer(SERVICE_KEY).as_str())],
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Email queue processed");
    assert_eq!(body["results"]["processed"], 2);
    assert_eq!(body["results"]["sent"], 2);
    assert_eq!(body["results"]["errors"], json!([]));
    assert_eq!(mailer.sent().len(), 2);

    let (_, body) = call(
        &app,
        "POST",
        "/api/email-queue/process",
        &[("authorization", bearer(SERVICE_KEY).as_str())],
        None,
    )
    .await;
    assert_eq!(body["message"], "No pending emails to process");
    assert_eq!(body["results"]["processed"], 0);
}

#[tokio::test]
async fn existing_review_cancels_the_whole_order() {
    let (_, state, mailer) = setup().await;
    seed_order(&state.db, "ORD-1", "jane@example.com", at(2024, 1, 1)).await;

    let mut existing = review("r-1", 4, ReviewStatus::Pending, 0);
    existing.author_email = Some("Jane@Example.com".to_string());
    db::insert_review(&state.db, &existing).await.unwrap();

    // Only the initial request is due, but the reminder goes with it
    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 9)).await.unwrap();

    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.processed, 2);
    assert!(mailer.sent().is_empty());
    assert_eq!(
        count(&state.db, "SELECT COUNT(*) FROM email_queue WHERE status = 'cancelled'").await,
        2
    );
}

#[tokio::test]
async fn provider_failure_marks_job_failed_with_truncated_error() {
    let mailer = Arc::new(RecordingMailer::failing_for(
        "bounce@example.com",
        &"x".repeat(800),
    ));
    let (_, state) = setup_with(test_config(), mailer.clone()).await;
    seed_order(&state.db, "ORD-1", "bounce@example.com", at(2024, 1, 1)).await;
    seed_order(&state.db, "ORD-2", "jane@example.com", at(2024, 1, 1)).await;

    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 9)).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.processed, summary.sent + summary.cancelled + summary.failed);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Email "));

    let (message,): (String,) =
        sqlx::query_as("SELECT error_message FROM email_queue WHERE status = 'failed'")
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(message.chars().count(), 500);
    assert!(message.starts_with("Email provider rejected the message (500)"));

    // Failed jobs are final
    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 9)).await.unwrap();
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn run_stops_at_transition_budget() {
    let (_, state, mailer) = setup().await;
    for i in 0..30 {
        seed_order(&state.db, &format!("ORD-{}", i), &format!("c{}@example.com", i), at(2024, 1, 1)).await;
    }

    let first = process_due(&state.db, mailer.as_ref(), at(2024, 2, 1)).await.unwrap();
    assert_eq!(first.processed, MAX_TRANSITIONS_PER_RUN);
    assert_eq!(first.sent, MAX_TRANSITIONS_PER_RUN);

    let second = process_due(&state.db, mailer.as_ref(), at(2024, 2, 1)).await.unwrap();
    assert_eq!(second.processed, 10);

    let third = process_due(&state.db, mailer.as_ref(), at(2024, 2, 1)).await.unwrap();
    assert_eq!(third.processed, 0);

    let mut ids: Vec<String> = mailer
        .sent()
        .iter()
        .map(|r| format!("{}/{}", r.to, r.email_type))
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 60);
}

#[tokio::test]
async fn sibling_cancellations_count_against_the_budget() {
    let (_, state, mailer) = setup().await;
    for i in 0..30 {
        let email = format!("c{}@example.com", i);
        seed_order(&state.db, &format!("ORD-{}", i), &email, at(2024, 1, 1)).await;
        let mut existing = review(&format!("r-{}", i), 3, ReviewStatus::Pending, 0);
        existing.author_email = Some(email);
        db::insert_review(&state.db, &existing).await.unwrap();
    }

    let first = process_due(&state.db, mailer.as_ref(), at(2024, 2, 1)).await.unwrap();
    assert!(first.processed <= MAX_TRANSITIONS_PER_RUN);
    assert_eq!(first.cancelled, 50);

    let second = process_due(&state.db, mailer.as_ref(), at(2024, 2, 1)).await.unwrap();
    assert_eq!(second.cancelled, 10);
    assert!(mailer.sent().is_empty());
    assert_eq!(
        count(&state.db, "SELECT COUNT(*) FROM email_queue WHERE status = 'pending'").await,
        0
    );
}

#[tokio::test]
async fn leased_jobs_are_left_to_their_run() {
    let (_, state, mailer) = setup().await;
    seed_order(&state.db, "ORD-1", "jane@example.com", at(2024, 1, 1)).await;
    let now = at(2024, 1, 9);

    let (job_id,): (String,) =
        sqlx::query_as("SELECT id FROM email_queue WHERE email_type = 'initial_request'")
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert!(db::claim_job(&state.db, &job_id, "other-run", now).await.unwrap());

    let summary = process_due(&state.db, mailer.as_ref(), now).await.unwrap();
    assert_eq!(summary.processed, 0);

    // Once the lease expires the job is up for grabs again
    let later = now + Duration::minutes(db::CLAIM_LEASE_MINUTES + 1);
    let summary = process_due(&state.db, mailer.as_ref(), later).await.unwrap();
    assert_eq!(summary.sent, 1);

    // The original run can no longer record anything
    assert!(!db::mark_failed(&state.db, &job_id, "other-run", "late", later).await.unwrap());
}

#[tokio::test]
async fn send_endpoint_dispatches_one_email() {
    let (app, _, mailer) = setup().await;
    let payload = json!({
        "to": "jane@example.com",
        "toName": "Jane Doe",
        "productId": "phone-x",
        "productName": "Phone X",
        "orderDate": "2024-01-01",
        "emailType": "reminder",
    });

    let (status, _) = call(&app, "POST", "/api/email/send", &[], Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        "POST",
        "/api/email/send",
        &[("authorization", bearer(SERVICE_KEY).as_str())],
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emailType"], "reminder");
    assert_eq!(body["recipient"], "jane@example.com");
    assert_eq!(body["messageId"], "msg-1");
    assert_eq!(mailer.sent().len(), 1);
}

// ============================================================
// Submission
// ============================================================

#[tokio::test]
async fn five_star_review_is_published_with_incentive_redirect() {
    let (app, _, _) = setup().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/reviews",
        &[],
        Some(json!({"productId": "phone-x", "rating": 5, "text": "Great product, love it!"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["review"]["status"], "approved");
    assert_eq!(body["review"]["author"], "Anonymous");
    assert_eq!(body["nextAction"]["type"], "redirect_to_incentive");
    assert_eq!(body["nextAction"]["delayMs"], 2000);

    let (_, body) = call(&app, "GET", "/api/products/phone-x/reviews", &[], None).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn four_star_review_waits_for_moderation() {
    let (app, _, _) = setup().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/reviews",
        &[],
        Some(json!({"productId": "phone-x", "rating": 4, "text": "Pretty good overall"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["review"]["status"], "pending");
    assert_eq!(body["nextAction"]["type"], "awaiting_approval");

    let (_, body) = call(&app, "GET", "/api/products/phone-x/reviews", &[], None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn missing_rating_stores_nothing() {
    let (app, state, _) = setup().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/reviews",
        &[],
        Some(json!({"productId": "phone-x", "rating": 0, "text": "Great product, love it!"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please select a rating");
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM reviews").await, 0);
}

#[tokio::test]
async fn public_review_cannot_claim_a_customer_email() {
    let (app, state, mailer) = setup().await;
    seed_order(&state.db, "ORD-1", "jane@example.com", at(2024, 1, 1)).await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/reviews",
        &[],
        Some(json!({
            "productId": "phone-x",
            "rating": 1,
            "text": "Not for me at all, sorry",
            "email": "jane@example.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        count(&state.db, "SELECT COUNT(*) FROM reviews WHERE author_email IS NOT NULL").await,
        0
    );

    let summary = process_due(&state.db, mailer.as_ref(), at(2024, 1, 9)).await.unwrap();
    assert_eq!(summary.cancelled, 0);
    assert_eq!(summary.sent, 1);
    assert_eq!(mailer.sent()[0].to, "jane@example.com");
}

#[tokio::test]
async fn review_requires_product() {
    let (app, _, _) = setup().await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/reviews",
        &[],
        Some(json!({"rating": 5, "text": "Great product, love it!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================
// Order-review flow
// ============================================================

#[tokio::test]
async fn order_review_is_verified_and_stops_emails() {
    let (app, state, mailer) = setup().await;
    call(
        &app,
        "POST",
        "/api/orders/webhook",
        &[],
        Some(order_payload("ORD-1", "jane@example.com")),
    )
    .await;

    let (status, body) = call(&app, "GET", "/api/orders/ORD-1/review-context", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderFound"], true);
    assert_eq!(body["context"]["productId"], "phone-x");
    assert_eq!(body["context"]["author"], "Jane Doe");
    assert!(body["context"].get("authorEmail").is_none());

    let (status, body) = call(
        &app,
        "POST",
        "/api/orders/ORD-1/reviews",
        &[],
        Some(json!({"rating": 3, "text": "Screen scratches easily"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["review"]["verifiedPurchase"], true);
    assert_eq!(body["review"]["status"], "pending");
    assert_eq!(body["nextAction"]["type"], "thank_you_for_feedback");

    let summary = process_due(&state.db, mailer.as_ref(), Utc::now()).await.unwrap();
    assert_eq!(summary.cancelled, 2);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn unknown_order_falls_back_to_product() {
    let (app, _, _) = setup().await;

    let (status, body) = call(&app, "GET", "/api/orders/phone-x/review-context", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderFound"], false);
    assert_eq!(body["context"]["productId"], "phone-x");
    assert_eq!(body["context"]["verifiedPurchase"], false);

    let (status, body) = call(
        &app,
        "POST",
        "/api/orders/phone-x/reviews",
        &[],
        Some(json!({"rating": 5, "text": "Great product, love it!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["review"]["productId"], "phone-x");
    assert_eq!(body["review"]["author"], "Customer");
    assert_eq!(body["review"]["verifiedPurchase"], false);
    assert!(body["review"].get("orderId").is_none());
}

// ============================================================
// Public display
// ============================================================

#[tokio::test]
async fn public_list_filters_sorts_and_reports_stats() {
    let (app, state, _) = setup().await;
    for r in [
        review("a", 5, ReviewStatus::Approved, 1),
        review("b", 3, ReviewStatus::Approved, 0),
        review("c", 5, ReviewStatus::Approved, 0),
        review("d", 4, ReviewStatus::Approved, 2),
        review("e", 1, ReviewStatus::Pending, 0),
        review("f", 2, ReviewStatus::Rejected, 0),
    ] {
        db::insert_review(&state.db, &r).await.unwrap();
    }

    let (status, body) = call(&app, "GET", "/api/products/phone-x/reviews", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["stats"]["totalReviews"], 4);
    assert_eq!(body["stats"]["averageRating"], 4.25);
    assert_eq!(body["stats"]["distribution"]["5"], 2);
    assert_eq!(body["stats"]["distribution"]["1"], 0);
    let ids: Vec<&str> = body["reviews"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["d", "c", "b", "a"]);

    let (_, body) = call(
        &app,
        "GET",
        "/api/products/phone-x/reviews?rating=5&sort=lowest_rated",
        &[],
        None,
    )
    .await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["stats"]["totalReviews"], 4);

    let (_, body) = call(
        &app,
        "GET",
        "/api/products/phone-x/reviews?with_photos=true&sort=highest_rated",
        &[],
        None,
    )
    .await;
    let ids: Vec<&str> = body["reviews"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "d"]);

    let (_, body) = call(
        &app,
        "GET",
        "/api/products/phone-x/reviews?limit=1&offset=1",
        &[],
        None,
    )
    .await;
    assert_eq!(body["total"], 4);
    assert_eq!(body["reviews"][0]["id"], "c");
    assert_eq!(body["reviews"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn public_list_rejects_bad_filters() {
    let (app, _, _) = setup().await;
    let (status, _) = call(&app, "GET", "/api/products/phone-x/reviews?rating=9", &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        call(&app, "GET", "/api/products/phone-x/reviews?sort=random", &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

// ============================================================
// Moderation
// ============================================================

#[tokio::test]
async fn moderation_requires_admin_token() {
    let (app, _, _) = setup().await;

    let (status, _) = call(&app, "GET", "/api/admin/reviews", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/api/admin/reviews/review-42/approve",
        &[("authorization", bearer(SERVICE_KEY).as_str())],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_review_moves_between_tabs() {
    let (app, state, _) = setup().await;
    db::insert_review(&state.db, &review("review-41", 2, ReviewStatus::Pending, 0))
        .await
        .unwrap();
    db::insert_review(&state.db, &review("review-42", 4, ReviewStatus::Pending, 0))
        .await
        .unwrap();
    let admin = bearer(ADMIN_TOKEN);
    let auth = [("authorization", admin.as_str())];

    let (_, body) = call(&app, "GET", "/api/admin/reviews", &auth, None).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["reviews"][0]["id"], "review-42");
    assert_eq!(body["reviews"][1]["id"], "review-41");

    let (status, body) =
        call(&app, "POST", "/api/admin/reviews/review-42/reject", &auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review"]["status"], "rejected");
    assert_eq!(body["changed"], true);

    let (_, body) = call(&app, "GET", "/api/admin/reviews?status=rejected", &auth, None).await;
    assert_eq!(body["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(body["reviews"][0]["id"], "review-42");

    let (_, body) = call(&app, "GET", "/api/admin/reviews?status=pending", &auth, None).await;
    let pending: Vec<&str> = body["reviews"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(pending, vec!["review-41"]);

    let (_, body) = call(&app, "GET", "/api/admin/reviews/counts", &auth, None).await;
    assert_eq!(body, json!({"pending": 1, "approved": 0, "rejected": 1}));
}

#[tokio::test]
async fn repeated_decisions_are_no_ops_and_reversals_apply() {
    let (app, state, _) = setup().await;
    db::insert_review(&state.db, &review("review-7", 4, ReviewStatus::Pending, 0))
        .await
        .unwrap();
    let admin = bearer(ADMIN_TOKEN);
    let auth = [("authorization", admin.as_str())];

    let (_, body) = call(&app, "POST", "/api/admin/reviews/review-7/approve", &auth, None).await;
    assert_eq!(body["changed"], true);

    let (status, body) =
        call(&app, "POST", "/api/admin/reviews/review-7/approve", &auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    assert_eq!(body["review"]["status"], "approved");

    let (_, body) = call(&app, "POST", "/api/admin/reviews/review-7/reject", &auth, None).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["review"]["status"], "rejected");

    let stored = db::get_review(&state.db, "review-7").await.unwrap().unwrap();
    assert_eq!(stored.status, ReviewStatus::Rejected);
}

#[tokio::test]
async fn moderating_unknown_review_is_not_found() {
    let (app, _, _) = setup().await;
    let admin = bearer(ADMIN_TOKEN);
    let (status, body) = call(
        &app,
        "POST",
        "/api/admin/reviews/nope/approve",
        &[("authorization", admin.as_str())],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Review not found: nope");
}
