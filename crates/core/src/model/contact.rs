use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::user::Email;

const MAX_FIELD_LEN: usize = 150;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContactError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is longer than {MAX_FIELD_LEN} characters")]
    TooLong(&'static str),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

/// A message submitted through the contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactMessage {
    /// Trim every field and check the form rules.
    ///
    /// # Errors
    ///
    /// Returns the first `ContactError` found.
    pub fn validate(self) -> Result<ValidContactMessage, ContactError> {
        let name = required("name", &self.name, Some(MAX_FIELD_LEN))?;
        let email = Email::parse(&self.email)
            .map_err(|_| ContactError::InvalidEmail(self.email.trim().to_string()))?;
        let subject = required("subject", &self.subject, Some(MAX_FIELD_LEN))?;
        let message = required("message", &self.message, None)?;
        Ok(ValidContactMessage {
            name,
            email,
            subject,
            message,
        })
    }
}

fn required(field: &'static str, value: &str, max: Option<usize>) -> Result<String, ContactError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ContactError::Missing(field));
    }
    if max.is_some_and(|max| value.chars().count() > max) {
        return Err(ContactError::TooLong(field));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidContactMessage {
    name: String,
    email: Email,
    subject: String,
    message: String,
}

impl ValidContactMessage {
    #[must_use]
    pub fn reply_to(&self) -> &Email {
        &self.email
    }

    #[must_use]
    pub fn mail_subject(&self) -> String {
        format!("[Contact on Quiz] {}", self.subject)
    }

    #[must_use]
    pub fn mail_body(&self) -> String {
        format!("Message from {}:\n\n{}", self.name, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ContactMessage {
        ContactMessage {
            name: " Ann ".into(),
            email: "ann@example.com".into(),
            subject: "Hello".into(),
            message: "Nice quizzes".into(),
        }
    }

    #[test]
    fn mail_is_formatted() {
        let valid = message().validate().unwrap();
        assert_eq!(valid.mail_subject(), "[Contact on Quiz] Hello");
        assert_eq!(valid.mail_body(), "Message from Ann:\n\nNice quizzes");
        assert_eq!(valid.reply_to().as_str(), "ann@example.com");
    }

    #[test]
    fn required_fields_are_checked() {
        let err = ContactMessage {
            subject: "  ".into(),
            ..message()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ContactError::Missing("subject"));

        let err = ContactMessage {
            email: "bad".into(),
            ..message()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ContactError::InvalidEmail(_)));
    }

    #[test]
    fn long_name_is_rejected() {
        let err = ContactMessage {
            name: "x".repeat(151),
            ..message()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ContactError::TooLong("name"));
    }
}
