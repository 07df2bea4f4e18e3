//! Email types and request/response structures

use chrono::{DateTime, Utc};
use review_core::EmailType;
use serde::{Deserialize, Serialize};

/// An address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(email: &str, name: Option<&str>) -> Self {
        Self {
            email: email.to_string(),
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
        }
    }
}

/// A fully rendered email ready for the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub from: Mailbox,

    pub to: Vec<Mailbox>,

    pub subject: String,

    /// HTML body
    pub html: String,

    /// Plain text body (sent alongside the HTML for deliverability)
    pub text: String,

    /// Categories for provider-side tracking
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl SendEmailRequest {
    /// Validate the request
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from.email.is_empty() {
            return Err(ValidationError::MissingField("from"));
        }
        if !is_valid_email(&self.from.email) {
            return Err(ValidationError::InvalidEmail(self.from.email.clone()));
        }

        if self.to.is_empty() {
            return Err(ValidationError::MissingField("to"));
        }
        for mailbox in &self.to {
            if !is_valid_email(&mailbox.email) {
                return Err(ValidationError::InvalidEmail(mailbox.email.clone()));
            }
        }

        if self.subject.is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }

        if self.html.is_empty() && self.text.is_empty() {
            return Err(ValidationError::MissingContent);
        }

        Ok(())
    }
}

/// Request body of the email send endpoint, and what the queue
/// processor dispatches for each job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEmailRequest {
    pub to: String,
    pub to_name: String,
    pub product_id: String,
    pub product_name: String,
    /// Purchase date as received from the store
    pub order_date: String,
    pub email_type: EmailType,
    /// Optional token appended to the review link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_token: Option<String>,
}

/// Response from a successful send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailResponse {
    /// Provider message id, when the provider returned one
    pub id: Option<String>,

    /// When the provider accepted the message
    pub accepted_at: DateTime<Utc>,
}

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Email must have either html or text content")]
    MissingContent,
}

/// Check if email address is valid
pub fn is_valid_email(email: &str) -> bool {
    email_address::EmailAddress::is_valid(email.trim())
}
