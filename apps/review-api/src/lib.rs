//! Review API Server - Backend for review collection and review-request email
//!
//! Provides REST endpoints for:
//! - Order intake from the store webhook, scheduling two review-request emails
//! - Processing the email queue (cron-driven) and sending individual emails
//! - Review submission, public display and the order-review flow
//! - The admin moderation queue

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod processor;
pub mod reviews;
pub mod state;

#[cfg(test)]
mod tests;

pub use config::{AppConfig, Args};
pub use dispatch::EmailDispatcher;
pub use error::ApiError;
pub use processor::{process_due, ProcessSummary, MAX_TRANSITIONS_PER_RUN};
pub use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    // The widget is embedded on third-party storefronts
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Order intake and email
        .route("/api/orders/webhook", post(handlers::order_webhook))
        .route("/api/email-queue/process", post(handlers::process_email_queue))
        .route("/api/email/send", post(handlers::send_review_email))
        // Submission and public display
        .route("/api/reviews", post(reviews::create_review))
        .route(
            "/api/products/:product_id/reviews",
            get(reviews::list_product_reviews),
        )
        // Order-review flow
        .route(
            "/api/orders/:order_id/review-context",
            get(reviews::order_review_context),
        )
        .route(
            "/api/orders/:order_id/reviews",
            post(reviews::create_order_review),
        )
        // Moderation
        .route("/api/admin/reviews", get(reviews::list_for_moderation))
        .route("/api/admin/reviews/counts", get(reviews::moderation_counts))
        .route("/api/admin/reviews/:id/approve", post(reviews::approve_review))
        .route("/api/admin/reviews/:id/reject", post(reviews::reject_review))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
