//! SendGrid v3 client
//!
//! Sends multipart (plain text + HTML) email through `POST /v3/mail/send`.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::template::render;
use crate::types::{Mailbox, ReviewEmailRequest, SendEmailRequest, SendEmailResponse, ValidationError};
use crate::MailerConfig;

/// Mailer errors
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Email provider API key not configured")]
    NotConfigured,

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Email provider request failed: {0}")]
    Transport(String),

    #[error("Email provider rejected the message ({status}): {body}")]
    Provider { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: &'a [Mailbox],
    subject: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: &'a str,
}

/// SendGrid API request payload
#[derive(Debug, Serialize)]
struct SendGridPayload<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: &'a Mailbox,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    categories: &'a [String],
}

impl<'a> SendGridPayload<'a> {
    fn from_request(request: &'a SendEmailRequest) -> Self {
        // text/plain must come before text/html
        let mut content = Vec::with_capacity(2);
        if !request.text.is_empty() {
            content.push(Content {
                content_type: "text/plain",
                value: &request.text,
            });
        }
        if !request.html.is_empty() {
            content.push(Content {
                content_type: "text/html",
                value: &request.html,
            });
        }

        Self {
            personalizations: vec![Personalization {
                to: &request.to,
                subject: &request.subject,
            }],
            from: &request.from,
            content,
            categories: &request.categories,
        }
    }
}

/// SendGrid email sender
#[derive(Debug, Clone)]
pub struct SendGridSender {
    client: reqwest::Client,
    config: MailerConfig,
}

impl SendGridSender {
    pub fn new(config: MailerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Turn a review-request into a complete email from the configured sender
    pub fn build_review_email(&self, request: &ReviewEmailRequest) -> SendEmailRequest {
        let rendered = render(request, &self.config.app_url);
        SendEmailRequest {
            from: Mailbox::new(&self.config.from_email, Some(&self.config.from_name)),
            to: vec![Mailbox::new(&request.to, Some(&request.to_name))],
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
            categories: vec!["review-request".to_string(), request.email_type.to_string()],
        }
    }

    /// Render and send a review-request email
    pub async fn send_review_request(
        &self,
        request: &ReviewEmailRequest,
    ) -> Result<SendEmailResponse, MailerError> {
        let email = self.build_review_email(request);
        self.send(&email).await
    }

    /// Send an email
    #[instrument(skip(self, request), fields(to = ?request.to, subject = %request.subject))]
    pub async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, MailerError> {
        let api_key = self.config.api_key.as_deref().ok_or(MailerError::NotConfigured)?;

        request.validate()?;

        let url = format!("{}/v3/mail/send", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&SendGridPayload::from_request(request))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Email provider request failed");
                MailerError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Email provider rejected message");
            return Err(MailerError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!(message_id = ?id, "Email accepted by provider");

        Ok(SendEmailResponse {
            id,
            accepted_at: Utc::now(),
        })
    }
}
