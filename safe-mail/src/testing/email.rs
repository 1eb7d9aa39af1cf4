//! Recording mail senders for tests
//!
//! [`RecordingSender`] captures submitted messages in memory and can be told
//! to fail verification or individual recipients. [`StaticConnector`] hands
//! out a shared `RecordingSender` and records every connect call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::email::{Email, EmailError, EmailSender, MailConnector, SenderCredentials};

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<Email>,
    attempts: usize,
    start_times: Vec<Instant>,
    in_flight: usize,
    max_in_flight: usize,
    verify_calls: usize,
    closed: bool,
}

/// Mock sender capturing messages for assertions
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    recorded: Arc<Mutex<Recorded>>,
    failing: Arc<HashSet<String>>,
    reject_verification: bool,
    latency: Duration,
}

impl RecordingSender {
    /// Sender that accepts everything instantly
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail submissions addressed to any of `recipients`
    #[must_use]
    pub fn failing_for<'a>(mut self, recipients: impl IntoIterator<Item = &'a str>) -> Self {
        self.failing = Arc::new(recipients.into_iter().map(ToString::to_string).collect());
        self
    }

    /// Reject credential verification
    #[must_use]
    pub const fn rejecting_credentials(mut self) -> Self {
        self.reject_verification = true;
        self
    }

    /// Hold each submission for `latency` before settling
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Successfully sent messages, in settle order
    #[must_use]
    pub fn sent_emails(&self) -> Vec<Email> {
        self.recorded.lock().sent.clone()
    }

    /// Number of successfully sent messages
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.recorded.lock().sent.len()
    }

    /// Whether a message to `address` was accepted
    #[must_use]
    pub fn was_sent_to(&self, address: &str) -> bool {
        self.recorded
            .lock()
            .sent
            .iter()
            .any(|email| email.to.as_deref() == Some(address))
    }

    /// Submissions attempted, successful or not
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.recorded.lock().attempts
    }

    /// When each submission started
    #[must_use]
    pub fn start_times(&self) -> Vec<Instant> {
        self.recorded.lock().start_times.clone()
    }

    /// Highest number of concurrent submissions observed
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.recorded.lock().max_in_flight
    }

    /// Number of verification calls
    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.recorded.lock().verify_calls
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.recorded.lock().closed
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn verify(&self) -> Result<(), EmailError> {
        self.recorded.lock().verify_calls += 1;
        if self.reject_verification {
            return Err(EmailError::verification("535 5.7.8 Username and Password not accepted"));
        }
        Ok(())
    }

    async fn send(&self, email: Email) -> Result<(), EmailError> {
        {
            let mut recorded = self.recorded.lock();
            recorded.attempts += 1;
            recorded.start_times.push(Instant::now());
            recorded.in_flight += 1;
            recorded.max_in_flight = recorded.max_in_flight.max(recorded.in_flight);
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.recorded.lock().in_flight -= 1;

        email.validate()?;
        let recipient = email.to.clone().unwrap_or_default();
        if self.failing.contains(&recipient) {
            return Err(EmailError::smtp(format!("550 mailbox unavailable: {recipient}")));
        }

        self.recorded.lock().sent.push(email);
        Ok(())
    }

    async fn close(&self) {
        self.recorded.lock().closed = true;
    }
}

/// Connector returning one shared [`RecordingSender`]
#[derive(Debug, Clone, Default)]
pub struct StaticConnector {
    sender: RecordingSender,
    connections: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StaticConnector {
    /// Connector handing out `sender`
    #[must_use]
    pub fn new(sender: RecordingSender) -> Self {
        Self {
            sender,
            connections: Arc::default(),
        }
    }

    /// The shared sender
    #[must_use]
    pub const fn sender(&self) -> &RecordingSender {
        &self.sender
    }

    /// `(identity, max_concurrency)` of every connect call
    #[must_use]
    pub fn connections(&self) -> Vec<(String, usize)> {
        self.connections.lock().clone()
    }
}

impl MailConnector for StaticConnector {
    fn connect(
        &self,
        credentials: &SenderCredentials,
        max_concurrency: usize,
    ) -> Result<Arc<dyn EmailSender>, EmailError> {
        self.connections
            .lock()
            .push((credentials.identity.clone(), max_concurrency));
        Ok(Arc::new(self.sender.clone()))
    }
}
