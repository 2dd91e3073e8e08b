use std::sync::Arc;

use async_trait::async_trait;

use quiz_core::model::{ContactMessage, ValidContactMessage};

use crate::error::ContactServiceError;

/// Outgoing mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// # Errors
    ///
    /// Returns a human readable reason when the mail could not be sent.
    async fn send(&self, reply_to: &str, subject: &str, body: &str) -> Result<(), String>;
}

/// Writes mails to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, reply_to: &str, subject: &str, body: &str) -> Result<(), String> {
        tracing::info!(reply_to, subject, body, "contact mail");
        Ok(())
    }
}

#[derive(Clone)]
pub struct ContactService {
    mailer: Arc<dyn Mailer>,
}

impl ContactService {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Validate a contact form submission and pass it to the mailer.
    ///
    /// # Errors
    ///
    /// Returns `ContactServiceError::Contact` for missing or invalid fields.
    /// Returns `ContactServiceError::Delivery` when the mailer fails.
    pub async fn send(
        &self,
        message: ContactMessage,
    ) -> Result<ValidContactMessage, ContactServiceError> {
        let message = message.validate()?;
        let subject = message.mail_subject();
        if let Err(reason) = self
            .mailer
            .send(message.reply_to().as_str(), &subject, &message.mail_body())
            .await
        {
            tracing::warn!(%reason, subject = %subject, "contact mail failed");
            return Err(ContactServiceError::Delivery(reason));
        }
        Ok(message)
    }
}
