//! Review-request mailer
//!
//! Renders the "how was your purchase?" emails and hands them to a
//! SendGrid-compatible transactional provider.
//!
//! ## Architecture
//!
//! ```text
//! queue processor ─┐
//!                  ├─► ReviewEmailRequest ─► template::render ─► SendGridSender ─► provider
//! POST /email/send ┘
//! ```
//!
//! Two templates exist, chosen by [`review_core::EmailType`]: the initial
//! request (sent a week after purchase) and the reminder.

pub mod sendgrid;
pub mod template;
pub mod types;

pub use sendgrid::{MailerError, SendGridSender};
pub use template::{render, RenderedEmail};
pub use types::{
    Mailbox, ReviewEmailRequest, SendEmailRequest, SendEmailResponse, ValidationError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the mailer
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Provider API key; sending fails with [`MailerError::NotConfigured`] when unset
    pub api_key: Option<String>,

    /// Sender address
    pub from_email: String,

    /// Sender display name
    pub from_name: String,

    /// Base URL of the review form linked from every email
    pub app_url: String,

    /// Provider API root
    pub api_base_url: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_email: "reviews@example.com".to_string(),
            from_name: "Reviews".to_string(),
            app_url: "http://localhost:5173".to_string(),
            api_base_url: "https://api.sendgrid.com".to_string(),
        }
    }
}

impl MailerConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("SENDGRID_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            from_email: std::env::var("SENDGRID_FROM_EMAIL").unwrap_or(defaults.from_email),
            from_name: std::env::var("SENDGRID_FROM_NAME").unwrap_or(defaults.from_name),
            app_url: std::env::var("APP_URL").unwrap_or(defaults.app_url),
            api_base_url: std::env::var("SENDGRID_API_BASE_URL").unwrap_or(defaults.api_base_url),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
