//! Mail capability traits
//!
//! [`MailConnector`] creates a sender bound to one account's credentials;
//! [`EmailSender`] is the resulting capability used for a single request.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Email, EmailError};

/// Account credentials used to authenticate against the relay
#[derive(Clone)]
pub struct SenderCredentials {
    /// Account identity, also the From address
    pub identity: String,

    /// Opaque secret (an app password)
    pub secret: String,
}

impl SenderCredentials {
    /// Create credentials from an identity and secret
    #[must_use]
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for SenderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderCredentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A mail-sending capability bound to one set of credentials
///
/// Implemented by the SMTP backend and by test doubles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Confirm the capability is usable, e.g. by authenticating
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the relay is unreachable or rejects the
    /// credentials
    async fn verify(&self) -> Result<(), EmailError>;

    /// Submit one message
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the message is invalid or the relay rejects it
    async fn send(&self, email: Email) -> Result<(), EmailError>;

    /// Release pooled connections
    async fn close(&self);
}

/// Factory producing a fresh [`EmailSender`] per request
pub trait MailConnector: Send + Sync {
    /// Build a sender for `credentials` that allows at most
    /// `max_concurrency` submissions in flight
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the transport cannot be configured
    fn connect(
        &self,
        credentials: &SenderCredentials,
        max_concurrency: usize,
    ) -> Result<Arc<dyn EmailSender>, EmailError>;
}
