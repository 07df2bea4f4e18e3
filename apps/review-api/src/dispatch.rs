//! Seam between the API and the email provider

use async_trait::async_trait;
use review_mailer::{MailerError, ReviewEmailRequest, SendEmailResponse, SendGridSender};

/// Something that can deliver a review-request email
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn dispatch(&self, request: &ReviewEmailRequest)
        -> Result<SendEmailResponse, MailerError>;
}

#[async_trait]
impl EmailDispatcher for SendGridSender {
    async fn dispatch(
        &self,
        request: &ReviewEmailRequest,
    ) -> Result<SendEmailResponse, MailerError> {
        self.send_review_request(request).await
    }
}
