//! HTTP handlers for review submission, public display and moderation

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use review_core::review::{MAX_RATING, MIN_RATING};
use review_core::{
    decide, submit, Decision, DisplayQuery, NextAction, OrderReviewContext, Review,
    ReviewStats, ReviewStatus, SortOrder, Submission, SubmissionInput, Transition,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::verify_bearer;
use crate::db::{self, StatusCounts};
use crate::error::ApiError;
use crate::handlers::json_body;
use crate::state::AppState;

/// Page size when `limit` is not given
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a caller may ask for
pub const MAX_PAGE_SIZE: usize = 100;

/// Attempts at a moderation update before giving up on a review that keeps changing
const MODERATION_ATTEMPTS: usize = 3;

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

/// Who is submitting and what the review is attached to
struct Attribution {
    product_id: String,
    author: String,
    avatar_url: Option<String>,
    author_email: Option<String>,
    order_id: Option<String>,
    verified_purchase: bool,
}

fn new_review(submission: Submission, attribution: Attribution) -> Review {
    Review {
        id: Uuid::new_v4().to_string(),
        product_id: attribution.product_id,
        author: attribution.author,
        avatar_url: attribution.avatar_url,
        author_email: attribution.author_email,
        created_at: Utc::now(),
        rating: submission.rating,
        text: submission.text,
        images: submission.images,
        verified_purchase: attribution.verified_purchase,
        status: submission.status,
        order_id: attribution.order_id,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReview {
    pub review: Review,
    pub next_action: NextAction,
}

async fn store_submission(
    state: &AppState,
    submission: Submission,
    attribution: Attribution,
) -> Result<(StatusCode, Json<CreatedReview>), ApiError> {
    let next_action = submission.next_action.clone();
    let review = new_review(submission, attribution);
    db::insert_review(&state.db, &review).await?;

    info!(
        review_id = %review.id,
        product_id = %review.product_id,
        rating = review.rating,
        status = %review.status,
        "Review submitted"
    );

    Ok((StatusCode::CREATED, Json(CreatedReview { review, next_action })))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Body of the public review form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub input: SubmissionInput,
}

/// Handler: POST /api/reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedReview>), ApiError> {
    let request = json_body(body)?;

    let product_id = request.product_id.trim();
    if product_id.is_empty() {
        return Err(ApiError::InvalidRequest("productId is required".to_string()));
    }

    let submission = submit(&request.input)?;
    let attribution = Attribution {
        product_id: product_id.to_string(),
        author: non_empty(request.author).unwrap_or_else(|| "Anonymous".to_string()),
        avatar_url: non_empty(request.avatar_url),
        // Only the order-review flow knows who the customer is
        author_email: None,
        order_id: None,
        verified_purchase: false,
    };

    store_submission(&state, submission, attribution).await
}

/// Query string of the public review list
#[derive(Debug, Default, Deserialize)]
pub struct ReviewListParams {
    #[serde(default)]
    pub sort: SortOrder,
    pub rating: Option<u8>,
    #[serde(default)]
    pub with_photos: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<Review>,
    /// Matches before pagination
    pub total: usize,
    /// Over every published review of the product, ignoring filters
    pub stats: ReviewStats,
}

/// Handler: GET /api/products/:product_id/reviews
pub async fn list_product_reviews(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    params: Result<Query<ReviewListParams>, QueryRejection>,
) -> Result<Json<ReviewListResponse>, ApiError> {
    let params = query_params(params)?;
    if let Some(rating) = params.rating {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ApiError::InvalidRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }
    }

    let approved = db::list_approved_for_product(&state.db, &product_id).await?;
    let stats = ReviewStats::from_reviews(&approved);

    let query = DisplayQuery {
        sort: params.sort,
        rating: params.rating,
        with_photos: params.with_photos,
    };
    let matching = query.apply(&approved);
    let total = matching.len();

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let reviews = matching
        .into_iter()
        .skip(params.offset.unwrap_or(0))
        .take(limit)
        .cloned()
        .collect();

    Ok(Json(ReviewListResponse {
        reviews,
        total,
        stats,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContextResponse {
    pub order_found: bool,
    pub context: OrderReviewContext,
    pub reviews: Vec<Review>,
    pub stats: ReviewStats,
}

/// Handler: GET /api/orders/:order_id/review-context
///
/// An unknown order id is not an error: it is treated as a product id so
/// links from outside the order system still land on a review form.
pub async fn order_review_context(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ReviewContextResponse>, ApiError> {
    let order = db::find_order(&state.db, &order_id).await?;
    if order.is_none() {
        warn!(order_id = %order_id, "Order not found, using id as product id");
    }

    let context = OrderReviewContext::resolve(&order_id, order.as_ref());
    let reviews = db::list_approved_for_product(&state.db, &context.product_id).await?;
    let stats = ReviewStats::from_reviews(&reviews);

    Ok(Json(ReviewContextResponse {
        order_found: order.is_some(),
        context,
        reviews,
        stats,
    }))
}

/// Handler: POST /api/orders/:order_id/reviews
pub async fn create_order_review(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    body: Result<Json<SubmissionInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedReview>), ApiError> {
    let input = json_body(body)?;
    let submission = submit(&input)?;

    let order = db::find_order(&state.db, &order_id).await?;
    let context = OrderReviewContext::resolve(&order_id, order.as_ref());

    let attribution = Attribution {
        product_id: context.product_id,
        author: context.author,
        avatar_url: None,
        author_email: context.author_email,
        order_id: context.order_ref,
        verified_purchase: context.verified_purchase,
    };

    store_submission(&state, submission, attribution).await
}

// ============================================================
// Moderation
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ModerationListParams {
    #[serde(default = "default_moderation_status")]
    pub status: ReviewStatus,
}

fn default_moderation_status() -> ReviewStatus {
    ReviewStatus::Pending
}

#[derive(Debug, Serialize)]
pub struct ModerationListResponse {
    pub status: ReviewStatus,
    pub reviews: Vec<Review>,
}

/// Handler: GET /api/admin/reviews?status=
pub async fn list_for_moderation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<ModerationListParams>, QueryRejection>,
) -> Result<Json<ModerationListResponse>, ApiError> {
    verify_bearer(&headers, state.config.admin_token.as_deref())?;
    let status = query_params(params)?.status;

    let reviews = db::list_reviews_by_status(&state.db, status).await?;
    Ok(Json(ModerationListResponse { status, reviews }))
}

/// Handler: GET /api/admin/reviews/counts
pub async fn moderation_counts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusCounts>, ApiError> {
    verify_bearer(&headers, state.config.admin_token.as_deref())?;
    Ok(Json(db::count_reviews_by_status(&state.db).await?))
}

#[derive(Debug, Serialize)]
pub struct ModerationResponse {
    pub review: Review,
    /// False when the review already had the requested status
    pub changed: bool,
}

async fn moderate(
    state: &AppState,
    id: &str,
    decision: Decision,
) -> Result<ModerationResponse, ApiError> {
    for _ in 0..MODERATION_ATTEMPTS {
        let mut review = db::get_review(&state.db, id)
            .await?
            .ok_or_else(|| ApiError::ReviewNotFound(id.to_string()))?;

        let target = match decide(review.status, decision)? {
            Transition::NoOp => {
                return Ok(ModerationResponse {
                    review,
                    changed: false,
                })
            }
            Transition::Apply(target) => target,
        };

        if db::update_review_status(&state.db, id, review.status, target, Utc::now()).await? {
            info!(review_id = %id, from = %review.status, to = %target, "Review moderated");
            review.status = target;
            return Ok(ModerationResponse {
                review,
                changed: true,
            });
        }

        warn!(review_id = %id, "Review changed during moderation, retrying");
    }

    Err(ApiError::Internal(anyhow::anyhow!(
        "Review {} kept changing during moderation",
        id
    )))
}

/// Handler: POST /api/admin/reviews/:id/approve
pub async fn approve_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ModerationResponse>, ApiError> {
    verify_bearer(&headers, state.config.admin_token.as_deref())?;
    Ok(Json(moderate(&state, &id, Decision::Approve).await?))
}

/// Handler: POST /api/admin/reviews/:id/reject
pub async fn reject_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ModerationResponse>, ApiError> {
    verify_bearer(&headers, state.config.admin_token.as_deref())?;
    Ok(Json(moderate(&state, &id, Decision::Reject).await?))
}
