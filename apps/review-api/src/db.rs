//! Database access for reviews, orders and the email queue
//!
//! Every status change is a conditional update: the `WHERE` clause names the
//! state the caller expects, and `rows_affected` tells whether it still held.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use review_core::{NewOrder, Order, Review, ReviewStatus, ScheduledEmail};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::ApiError;

/// How long a processing run may hold a job before another run can take it
pub const CLAIM_LEASE_MINUTES: i64 = 10;

/// Fixed-width UTC timestamp, so text comparison in SQL matches time order
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Claims taken before this instant have expired
pub fn lease_cutoff(now: DateTime<Utc>) -> String {
    timestamp(now - Duration::minutes(CLAIM_LEASE_MINUTES))
}

// ============================================================
// Reviews
// ============================================================

#[derive(Debug, Clone, FromRow)]
struct DbReview {
    id: String,
    product_id: String,
    author: String,
    avatar_url: Option<String>,
    author_email: Option<String>,
    created_at: DateTime<Utc>,
    rating: i64,
    text: String,
    images_json: String,
    verified_purchase: bool,
    status: String,
    order_id: Option<String>,
}

impl TryFrom<DbReview> for Review {
    type Error = anyhow::Error;

    fn try_from(row: DbReview) -> Result<Self, Self::Error> {
        let images: Vec<String> = serde_json::from_str(&row.images_json)
            .with_context(|| format!("Corrupt images for review {}", row.id))?;
        let status: ReviewStatus = row.status.parse().map_err(|e: String| anyhow!(e))?;
        let rating = u8::try_from(row.rating)
            .with_context(|| format!("Rating out of range for review {}", row.id))?;

        Ok(Review {
            id: row.id,
            product_id: row.product_id,
            author: row.author,
            avatar_url: row.avatar_url,
            author_email: row.author_email,
            created_at: row.created_at,
            rating,
            text: row.text,
            images,
            verified_purchase: row.verified_purchase,
            status,
            order_id: row.order_id,
        })
    }
}

const REVIEW_COLUMNS: &str = "id, product_id, author, avatar_url, author_email, created_at, \
                              rating, text, images_json, verified_purchase, status, order_id";

fn into_reviews(rows: Vec<DbReview>) -> Result<Vec<Review>, ApiError> {
    rows.into_iter()
        .map(|row| Review::try_from(row).map_err(ApiError::Internal))
        .collect()
}

pub async fn insert_review(pool: &SqlitePool, review: &Review) -> Result<(), ApiError> {
    let images_json = serde_json::to_string(&review.images).map_err(|e| anyhow!(e))?;
    let created_at = timestamp(review.created_at);

    sqlx::query(
        r#"
        INSERT INTO reviews (id, product_id, author, avatar_url, author_email, created_at,
                             rating, text, images_json, verified_purchase, status, order_id, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&review.id)
    .bind(&review.product_id)
    .bind(&review.author)
    .bind(&review.avatar_url)
    .bind(&review.author_email)
    .bind(&created_at)
    .bind(i64::from(review.rating))
    .bind(&review.text)
    .bind(&images_json)
    .bind(review.verified_purchase)
    .bind(review.status.as_str())
    .bind(&review.order_id)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_review(pool: &SqlitePool, id: &str) -> Result<Option<Review>, ApiError> {
    let row: Option<DbReview> =
        sqlx::query_as(&format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    row.map(|r| Review::try_from(r).map_err(ApiError::Internal))
        .transpose()
}

/// Reviews in `status`, newest first
pub async fn list_reviews_by_status(
    pool: &SqlitePool,
    status: ReviewStatus,
) -> Result<Vec<Review>, ApiError> {
    let rows: Vec<DbReview> = sqlx::query_as(&format!(
        "SELECT {} FROM reviews WHERE status = ? ORDER BY seq DESC",
        REVIEW_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    into_reviews(rows)
}

/// Published reviews of a product, newest first
pub async fn list_approved_for_product(
    pool: &SqlitePool,
    product_id: &str,
) -> Result<Vec<Review>, ApiError> {
    let rows: Vec<DbReview> = sqlx::query_as(&format!(
        "SELECT {} FROM reviews WHERE product_id = ? AND status = 'approved' ORDER BY seq DESC",
        REVIEW_COLUMNS
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    into_reviews(rows)
}

/// Number of reviews in each moderation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

pub async fn count_reviews_by_status(pool: &SqlitePool) -> Result<StatusCounts, ApiError> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM reviews GROUP BY status")
            .fetch_all(pool)
            .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        match status.parse::<ReviewStatus>() {
            Ok(ReviewStatus::Pending) => counts.pending = count,
            Ok(ReviewStatus::Approved) => counts.approved = count,
            Ok(ReviewStatus::Rejected) => counts.rejected = count,
            Err(e) => tracing::warn!("Ignoring reviews with {}", e),
        }
    }
    Ok(counts)
}

/// Move a review from `from` to `to`. Returns false if its status was no longer `from`.
pub async fn update_review_status(
    pool: &SqlitePool,
    id: &str,
    from: ReviewStatus,
    to: ReviewStatus,
    now: DateTime<Utc>,
) -> Result<bool, ApiError> {
    let result =
        sqlx::query("UPDATE reviews SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(timestamp(now))
            .bind(id)
            .bind(from.as_str())
            .execute(pool)
            .await?;

    Ok(result.rows_affected() == 1)
}

/// Whether `email` has already reviewed `product_id`, in any moderation state
pub async fn review_exists_for(
    pool: &SqlitePool,
    email: &str,
    product_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM reviews WHERE lower(author_email) = lower(?) AND product_id = ? LIMIT 1",
    )
    .bind(email)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

// ============================================================
// Orders
// ============================================================

#[derive(Debug, Clone, FromRow)]
struct DbOrder {
    id: String,
    order_id: String,
    customer_email: String,
    customer_name: String,
    product_id: String,
    product_name: String,
    purchase_date: DateTime<Utc>,
}

impl From<DbOrder> for Order {
    fn from(row: DbOrder) -> Self {
        Order {
            id: row.id,
            order_id: row.order_id,
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            product_id: row.product_id,
            product_name: row.product_name,
            purchase_date: row.purchase_date,
        }
    }
}

/// Insert an order unless one with the same external id exists.
///
/// Returns `None` for a duplicate.
pub async fn insert_order(
    pool: &SqlitePool,
    order: &NewOrder,
    now: DateTime<Utc>,
) -> Result<Option<Order>, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO orders (id, order_id, customer_email, customer_name, product_id,
                            product_name, purchase_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(order_id) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(&order.order_id)
    .bind(&order.customer_email)
    .bind(&order.customer_name)
    .bind(&order.product_id)
    .bind(&order.product_name)
    .bind(timestamp(order.purchase_date))
    .bind(timestamp(now))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    Ok(Some(Order {
        id,
        order_id: order.order_id.clone(),
        customer_email: order.customer_email.clone(),
        customer_name: order.customer_name.clone(),
        product_id: order.product_id.clone(),
        product_name: order.product_name.clone(),
        purchase_date: order.purchase_date,
    }))
}

pub async fn find_order(pool: &SqlitePool, order_id: &str) -> Result<Option<Order>, sqlx::Error> {
    let row: Option<DbOrder> = sqlx::query_as(
        r#"
        SELECT id, order_id, customer_email, customer_name, product_id, product_name, purchase_date
        FROM orders
        WHERE order_id = ?
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Order::from))
}

// ============================================================
// Email queue
// ============================================================

pub async fn insert_email_job(
    pool: &SqlitePool,
    job: &ScheduledEmail,
    now: DateTime<Utc>,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = timestamp(now);

    sqlx::query(
        r#"
        INSERT INTO email_queue (id, order_id, email_type, recipient_email, recipient_name,
                                 product_id, scheduled_for, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&job.order_ref)
    .bind(job.email_type.as_str())
    .bind(&job.recipient_email)
    .bind(&job.recipient_name)
    .bind(&job.product_id)
    .bind(timestamp(job.scheduled_for))
    .bind(job.status.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// A pending job joined with the order details its email needs
#[derive(Debug, Clone, FromRow)]
pub struct DueJob {
    pub id: String,
    /// Internal order id
    pub order_id: String,
    pub email_type: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub product_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub product_name: String,
    /// Purchase date as stored
    pub purchase_date: String,
}

/// Pending jobs due at `now` that no live run holds, oldest first
pub async fn due_jobs(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<DueJob>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT q.id, q.order_id, q.email_type, q.recipient_email, q.recipient_name,
               q.product_id, q.scheduled_for, o.product_name, o.purchase_date
        FROM email_queue q
        JOIN orders o ON o.id = q.order_id
        WHERE q.status = 'pending'
          AND q.scheduled_for <= ?
          AND (q.claimed_by IS NULL OR q.claimed_at < ?)
        ORDER BY q.scheduled_for ASC
        LIMIT ?
        "#,
    )
    .bind(timestamp(now))
    .bind(lease_cutoff(now))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Take the processing lease on a pending job. False if another live run holds it
/// or the job is no longer pending.
pub async fn claim_job(
    pool: &SqlitePool,
    id: &str,
    run: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE email_queue
        SET claimed_by = ?, claimed_at = ?
        WHERE id = ?
          AND status = 'pending'
          AND (claimed_by IS NULL OR claimed_by = ? OR claimed_at < ?)
        "#,
    )
    .bind(run)
    .bind(timestamp(now))
    .bind(id)
    .bind(run)
    .bind(lease_cutoff(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Give a claimed job back without changing its status
pub async fn release_job(pool: &SqlitePool, id: &str, run: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE email_queue SET claimed_by = NULL, claimed_at = NULL WHERE id = ? AND claimed_by = ?",
    )
    .bind(id)
    .bind(run)
    .execute(pool)
    .await?;

    Ok(())
}

/// Pending jobs of an order that `run` may cancel: unclaimed, claimed by
/// `run` itself, or with an expired lease
pub async fn cancellable_jobs(
    pool: &SqlitePool,
    order_id: &str,
    run: &str,
    now: DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT id FROM email_queue
        WHERE order_id = ?
          AND status = 'pending'
          AND (claimed_by IS NULL OR claimed_by = ? OR claimed_at < ?)
        ORDER BY scheduled_for ASC
        "#,
    )
    .bind(order_id)
    .bind(run)
    .bind(lease_cutoff(now))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Cancel one pending job unless another live run holds it
pub async fn cancel_job(
    pool: &SqlitePool,
    id: &str,
    run: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE email_queue
        SET status = 'cancelled', updated_at = ?
        WHERE id = ?
          AND status = 'pending'
          AND (claimed_by IS NULL OR claimed_by = ? OR claimed_at < ?)
        "#,
    )
    .bind(timestamp(now))
    .bind(id)
    .bind(run)
    .bind(lease_cutoff(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a successful send on a job this run has claimed
pub async fn mark_sent(
    pool: &SqlitePool,
    id: &str,
    run: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let now = timestamp(now);
    let result = sqlx::query(
        r#"
        UPDATE email_queue
        SET status = 'sent', sent_at = ?, updated_at = ?
        WHERE id = ? AND status = 'pending' AND claimed_by = ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .bind(run)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a failed send on a job this run has claimed
pub async fn mark_failed(
    pool: &SqlitePool,
    id: &str,
    run: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE email_queue
        SET status = 'failed', error_message = ?, updated_at = ?
        WHERE id = ? AND status = 'pending' AND claimed_by = ?
        "#,
    )
    .bind(error_message)
    .bind(timestamp(now))
    .bind(id)
    .bind(run)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
