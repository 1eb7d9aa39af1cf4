//! SMTP backend for sending emails
//!
//! Uses the `lettre` crate to relay messages through an authenticated SMTP
//! server. Each request gets its own pooled transport bound to the caller's
//! credentials; the pool size matches the dispatcher's batch size.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use crate::config::{SmtpSecurity, SmtpSettings};
use crate::email::{Email, EmailError, EmailSender, MailConnector, SenderCredentials};

/// SMTP email backend bound to one account
pub struct SmtpBackend {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpBackend {
    /// Build a pooled transport for `credentials`
    ///
    /// # Errors
    ///
    /// Returns `EmailError::ConfigError` if the relay host is unusable for TLS
    pub fn new(
        settings: &SmtpSettings,
        credentials: &SenderCredentials,
        max_concurrency: usize,
    ) -> Result<Self, EmailError> {
        let builder = match settings.security {
            SmtpSecurity::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| EmailError::config(e.to_string()))?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| EmailError::config(e.to_string()))?
            }
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };

        let max_size = u32::try_from(max_concurrency.max(1)).unwrap_or(u32::MAX);
        let pool = PoolConfig::new()
            .max_size(max_size)
            .idle_timeout(Duration::from_secs(settings.pool_idle_timeout_secs));

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                credentials.identity.clone(),
                credentials.secret.clone(),
            ))
            .timeout(Some(Duration::from_secs(settings.timeout_secs)))
            .pool_config(pool)
            .build();

        Ok(Self { transport })
    }

    fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, EmailError> {
        let address: Address = address
            .parse()
            .map_err(|_| EmailError::InvalidAddress(address.to_string()))?;
        Ok(Mailbox::new(name.map(ToString::to_string), address))
    }

    /// Build lettre Message from Email
    fn build_message(email: &Email) -> Result<Message, EmailError> {
        email.validate()?;

        let from_addr = email.from.as_deref().ok_or(EmailError::NoSender)?;
        let to_addr = email.to.as_deref().ok_or(EmailError::NoRecipients)?;
        let subject = email.subject.as_deref().ok_or(EmailError::NoSubject)?;
        let text = email.text.clone().ok_or(EmailError::NoContent)?;

        let mut builder = Message::builder()
            .from(Self::mailbox(email.from_name.as_deref(), from_addr)?)
            .to(Self::mailbox(None, to_addr)?)
            .subject(subject);

        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(Self::mailbox(None, reply_to)?);
        }

        builder
            .header(header::ContentType::TEXT_PLAIN)
            .body(text)
            .map_err(|e| EmailError::smtp(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for SmtpBackend {
    async fn verify(&self) -> Result<(), EmailError> {
        let connected = self
            .transport
            .test_connection()
            .await
            .map_err(|e| EmailError::verification(e.to_string()))?;

        if connected {
            Ok(())
        } else {
            Err(EmailError::verification("relay rejected test connection"))
        }
    }

    async fn send(&self, email: Email) -> Result<(), EmailError> {
        let message = Self::build_message(&email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::smtp(e.to_string()))?;

        Ok(())
    }

    async fn close(&self) {
        self.transport.shutdown().await;
        debug!("SMTP transport closed");
    }
}

/// Creates an [`SmtpBackend`] per request from shared relay settings
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    settings: SmtpSettings,
}

impl SmtpConnector {
    /// Create a connector for the configured relay
    #[must_use]
    pub const fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// Relay settings in use
    #[must_use]
    pub const fn settings(&self) -> &SmtpSettings {
        &self.settings
    }
}

impl MailConnector for SmtpConnector {
    fn connect(
        &self,
        credentials: &SenderCredentials,
        max_concurrency: usize,
    ) -> Result<Arc<dyn EmailSender>, EmailError> {
        let backend = SmtpBackend::new(&self.settings, credentials, max_concurrency)?;
        Ok(Arc::new(backend))
    }
}
