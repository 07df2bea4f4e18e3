//! Review-request email scheduling
//!
//! Each new order gets exactly two jobs: an initial request a week after
//! purchase and a reminder a week after that.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::order::Order;

/// Days after purchase for the first review request
pub const INITIAL_REQUEST_DELAY_DAYS: i64 = 7;

/// Days after purchase for the reminder
pub const REMINDER_DELAY_DAYS: i64 = 15;

/// Maximum stored length of a job's error message
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Which review-request email a job sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    InitialRequest,
    Reminder,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::InitialRequest => "initial_request",
            EmailType::Reminder => "reminder",
        }
    }

    /// Offset from the purchase date
    pub fn delay(&self) -> Duration {
        match self {
            EmailType::InitialRequest => Duration::days(INITIAL_REQUEST_DELAY_DAYS),
            EmailType::Reminder => Duration::days(REMINDER_DELAY_DAYS),
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_request" => Ok(EmailType::InitialRequest),
            "reminder" => Ok(EmailType::Reminder),
            other => Err(format!("Unknown email type: {}", other)),
        }
    }
}

/// Email job status
///
/// `Pending` moves to exactly one of the other three, which are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Sent,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Sent => "sent",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        *self == JobStatus::Pending && next.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "sent" => Ok(JobStatus::Sent),
            "cancelled" => Ok(JobStatus::Cancelled),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

/// A job to enqueue for an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEmail {
    /// Internal id of the order
    pub order_ref: String,
    pub email_type: EmailType,
    pub recipient_email: String,
    pub recipient_name: String,
    pub product_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
}

/// Build the initial request and the reminder for `order`
pub fn schedule(order: &Order) -> [ScheduledEmail; 2] {
    [EmailType::InitialRequest, EmailType::Reminder].map(|email_type| ScheduledEmail {
        order_ref: order.id.clone(),
        email_type,
        recipient_email: order.customer_email.clone(),
        recipient_name: order.customer_name.clone(),
        product_id: order.product_id.clone(),
        scheduled_for: order.purchase_date + email_type.delay(),
        status: JobStatus::Pending,
    })
}

/// Cut an error message down to what a job row keeps
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}
