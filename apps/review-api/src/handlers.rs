//! HTTP handlers for order intake and review-request email

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use review_core::{schedule, EmailType, OrderWebhook};
use review_mailer::ReviewEmailRequest;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{verify_bearer, verify_webhook_secret};
use crate::db;
use crate::error::ApiError;
use crate::processor::{process_due, ProcessSummary};
use crate::state::AppState;

/// Unwrap a JSON body, turning axum's plain-text rejection into an [`ApiError`]
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "review-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailsScheduled {
    pub initial_request: DateTime<Utc>,
    pub reminder: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWebhookResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails_scheduled: Option<EmailsScheduled>,
}

/// Handler: POST /api/orders/webhook
///
/// Records the order once per external order id and queues its two
/// review-request emails. A failed job insert is logged and does not undo
/// the order.
pub async fn order_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<OrderWebhook>, JsonRejection>,
) -> Result<Json<OrderWebhookResponse>, ApiError> {
    verify_webhook_secret(&headers, state.config.webhook_secret.as_deref())?;

    let new_order = json_body(body)?.validate()?;
    let now = Utc::now();

    let Some(order) = db::insert_order(&state.db, &new_order, now).await? else {
        info!(order_id = %new_order.order_id, "Order already exists");
        return Ok(Json(OrderWebhookResponse {
            success: true,
            message: "Order already exists",
            order_id: new_order.order_id,
            emails_scheduled: None,
        }));
    };

    info!(order_id = %order.order_id, id = %order.id, "Order received");

    let [initial, reminder] = schedule(&order);
    for job in [&initial, &reminder] {
        match db::insert_email_job(&state.db, job, now).await {
            Ok(job_id) => info!(
                order_id = %order.order_id,
                job_id = %job_id,
                email_type = %job.email_type,
                scheduled_for = %job.scheduled_for,
                "Scheduled review request"
            ),
            Err(e) => error!(
                order_id = %order.order_id,
                email_type = %job.email_type,
                error = %e,
                "Error scheduling review request"
            ),
        }
    }

    Ok(Json(OrderWebhookResponse {
        success: true,
        message: "Order received and emails scheduled",
        order_id: order.order_id,
        emails_scheduled: Some(EmailsScheduled {
            initial_request: initial.scheduled_for,
            reminder: reminder.scheduled_for,
        }),
    }))
}

#[derive(Debug, Serialize)]
pub struct ProcessQueueResponse {
    pub success: bool,
    pub message: &'static str,
    pub results: ProcessSummary,
}

/// Handler: POST /api/email-queue/process
pub async fn process_email_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProcessQueueResponse>, ApiError> {
    verify_bearer(&headers, state.config.service_key.as_deref())?;

    let results = process_due(&state.db, state.mailer.as_ref(), Utc::now()).await?;
    let message = if results.processed == 0 {
        "No pending emails to process"
    } else {
        "Email queue processed"
    };

    Ok(Json(ProcessQueueResponse {
        success: true,
        message,
        results,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    pub message: &'static str,
    pub email_type: EmailType,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Handler: POST /api/email/send
pub async fn send_review_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ReviewEmailRequest>, JsonRejection>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    verify_bearer(&headers, state.config.service_key.as_deref())?;

    let request = json_body(body)?;
    let response = state.mailer.dispatch(&request).await?;

    info!(email_type = %request.email_type, "Review request email sent");

    Ok(Json(SendEmailResponse {
        success: true,
        message: "Email sent successfully",
        email_type: request.email_type,
        recipient: request.to,
        message_id: response.id,
    }))
}
