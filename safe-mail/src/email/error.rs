//! Email error types

use thiserror::Error;

/// Errors raised by the mail capability
#[derive(Debug, Error)]
pub enum EmailError {
    /// Email has no recipient
    #[error("email must have a recipient")]
    NoRecipients,

    /// Email has no sender
    #[error("email must have a from address")]
    NoSender,

    /// Email has no subject
    #[error("email must have a subject")]
    NoSubject,

    /// Email has no body content
    #[error("email must have text content")]
    NoContent,

    /// Invalid email address format
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// The relay rejected the supplied credentials or could not be reached
    #[error("SMTP verification failed: {0}")]
    Verification(String),

    /// SMTP transport error
    #[error("SMTP error: {0}")]
    SmtpError(String),

    /// Email configuration error
    #[error("email configuration error: {0}")]
    ConfigError(String),
}

impl EmailError {
    /// Create an SMTP error from a string message
    #[must_use]
    pub fn smtp<T: Into<String>>(msg: T) -> Self {
        Self::SmtpError(msg.into())
    }

    /// Create a verification error from a string message
    #[must_use]
    pub fn verification<T: Into<String>>(msg: T) -> Self {
        Self::Verification(msg.into())
    }

    /// Create a configuration error from a string message
    #[must_use]
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::ConfigError(msg.into())
    }
}
