//! Prepared message with a fluent builder

use serde::{Deserialize, Serialize};

use super::EmailError;

/// One outgoing plain-text message addressed to a single recipient
///
/// ```rust
/// use safe_mail::email::Email;
///
/// let email = Email::new()
///     .from_named("Alice", "alice@example.com")
///     .to("bob@example.com")
///     .reply_to("alice@example.com")
///     .subject("Quarterly numbers")
///     .text("Hello Bob");
///
/// assert!(email.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Sender address (From)
    pub from: Option<String>,

    /// Display name shown next to the sender address
    pub from_name: Option<String>,

    /// Single recipient (To)
    pub to: Option<String>,

    /// Reply-To address
    pub reply_to: Option<String>,

    /// Subject line
    pub subject: Option<String>,

    /// Plain text body
    pub text: Option<String>,
}

impl Email {
    /// Create a new empty email
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address
    #[must_use]
    pub fn from(mut self, address: &str) -> Self {
        self.from = Some(address.to_string());
        self
    }

    /// Set the sender address together with a display name
    ///
    /// An empty name is treated as no name.
    #[must_use]
    pub fn from_named(mut self, name: &str, address: &str) -> Self {
        self.from = Some(address.to_string());
        self.from_name = Some(name.trim())
            .filter(|name| !name.is_empty())
            .map(ToString::to_string);
        self
    }

    /// Set the recipient
    #[must_use]
    pub fn to(mut self, address: &str) -> Self {
        self.to = Some(address.to_string());
        self
    }

    /// Set the reply-to address
    #[must_use]
    pub fn reply_to(mut self, address: &str) -> Self {
        self.reply_to = Some(address.to_string());
        self
    }

    /// Set the subject
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Set the plain text body
    #[must_use]
    pub fn text(mut self, body: &str) -> Self {
        self.text = Some(body.to_string());
        self
    }

    /// Check that all required fields are present
    ///
    /// # Errors
    ///
    /// Returns the first missing part: recipient, sender, subject or body
    pub fn validate(&self) -> Result<(), EmailError> {
        if self.to.is_none() {
            return Err(EmailError::NoRecipients);
        }

        if self.from.is_none() {
            return Err(EmailError::NoSender);
        }

        if self.subject.is_none() {
            return Err(EmailError::NoSubject);
        }

        if self.text.is_none() {
            return Err(EmailError::NoContent);
        }

        Ok(())
    }
}
