//! Email queue processor
//!
//! One run picks up to [`MAX_TRANSITIONS_PER_RUN`] due jobs and moves each
//! out of `pending` exactly once. A job whose recipient has already reviewed
//! the product is cancelled together with the rest of its order; every other
//! job is handed to the dispatcher and marked `sent` or `failed`. There are no
//! retries.
//!
//! Overlapping runs are kept apart by a claim lease on each job (see
//! [`crate::db::claim_job`]); a run that crashes mid-job leaves its lease to
//! expire after [`crate::db::CLAIM_LEASE_MINUTES`].

use chrono::{DateTime, Utc};
use review_core::{truncate_error, EmailType};
use review_mailer::ReviewEmailRequest;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, DueJob};
use crate::dispatch::EmailDispatcher;

/// Upper bound on status transitions in one run, sibling cancellations included
pub const MAX_TRANSITIONS_PER_RUN: usize = 50;

/// Outcome of one processing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    /// Jobs moved out of pending; always `sent + cancelled + failed`
    pub processed: usize,
    pub sent: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl ProcessSummary {
    fn remaining_budget(&self) -> usize {
        MAX_TRANSITIONS_PER_RUN.saturating_sub(self.processed)
    }

    fn record_sent(&mut self) {
        self.sent += 1;
        self.processed += 1;
    }

    fn record_cancelled(&mut self, count: usize) {
        self.cancelled += count;
        self.processed += count;
    }

    fn record_failed(&mut self, job_id: &str, error: &str) {
        self.failed += 1;
        self.processed += 1;
        self.errors.push(format!("Email {}: {}", job_id, error));
    }
}

fn email_request(job: &DueJob) -> Result<ReviewEmailRequest, String> {
    let email_type: EmailType = job.email_type.parse()?;
    Ok(ReviewEmailRequest {
        to: job.recipient_email.clone(),
        to_name: job.recipient_name.clone(),
        product_id: job.product_id.clone(),
        product_name: job.product_name.clone(),
        order_date: job.purchase_date.clone(),
        email_type,
        custom_token: None,
    })
}

/// Process every job due at `now`
pub async fn process_due(
    pool: &SqlitePool,
    dispatcher: &dyn EmailDispatcher,
    now: DateTime<Utc>,
) -> Result<ProcessSummary, sqlx::Error> {
    let run = Uuid::new_v4().to_string();
    let mut summary = ProcessSummary::default();

    let jobs = db::due_jobs(pool, now, MAX_TRANSITIONS_PER_RUN as i64).await?;
    info!(run = %run, due = jobs.len(), "Processing email queue");

    for job in &jobs {
        if summary.remaining_budget() == 0 {
            break;
        }

        // Lost to another run, or already cancelled alongside a sibling
        if !db::claim_job(pool, &job.id, &run, now).await? {
            continue;
        }

        if db::review_exists_for(pool, &job.recipient_email, &job.product_id).await? {
            let ids = db::cancellable_jobs(pool, &job.order_id, &run, now).await?;
            if ids.len() > summary.remaining_budget() {
                db::release_job(pool, &job.id, &run).await?;
                info!(
                    job_id = %job.id,
                    order_id = %job.order_id,
                    "Transition budget exhausted, leaving job for the next run"
                );
                break;
            }

            let mut cancelled = 0;
            for id in &ids {
                if db::cancel_job(pool, id, &run, now).await? {
                    cancelled += 1;
                }
            }
            info!(
                job_id = %job.id,
                order_id = %job.order_id,
                cancelled,
                "Recipient already reviewed, cancelled pending emails for order"
            );
            summary.record_cancelled(cancelled);
            continue;
        }

        let outcome = match email_request(job) {
            Ok(request) => dispatcher
                .dispatch(&request)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                if db::mark_sent(pool, &job.id, &run, now).await? {
                    info!(job_id = %job.id, message_id = ?response.id, "Review request sent");
                    summary.record_sent();
                } else {
                    warn!(job_id = %job.id, "Lease lost before the send could be recorded");
                }
            }
            Err(error) => {
                warn!(job_id = %job.id, error = %error, "Review request failed");
                if db::mark_failed(pool, &job.id, &run, &truncate_error(&error), now).await? {
                    summary.record_failed(&job.id, &error);
                } else {
                    warn!(job_id = %job.id, "Lease lost before the failure could be recorded");
                }
            }
        }
    }

    info!(
        run = %run,
        processed = summary.processed,
        sent = summary.sent,
        cancelled = summary.cancelled,
        failed = summary.failed,
        "Email queue processed"
    );

    Ok(summary)
}
