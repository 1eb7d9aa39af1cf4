//! Batched, paced delivery
//!
//! Messages are submitted in consecutive batches. Every message of a batch is
//! in flight at once, the batch is a barrier (all submissions settle before
//! the next batch starts), and a fixed pause separates batches so the relay's
//! abuse heuristics are not triggered.
//!
//! Individual failures are not retried and do not abort the dispatch; each
//! one is logged and left out of the sent count.

use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::DispatchSettings;
use crate::email::{Email, EmailSender};

/// Batch size and pacing for one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Maximum messages in flight at once
    pub batch_size: usize,

    /// Pause between consecutive batches
    pub delay: Duration,
}

impl BatchPolicy {
    /// Create a policy; a zero batch size is treated as one
    #[must_use]
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    /// Number of batches needed for `messages` messages
    #[must_use]
    pub const fn batches_for(&self, messages: usize) -> usize {
        messages.div_ceil(self.batch_size)
    }
}

impl From<&DispatchSettings> for BatchPolicy {
    fn from(settings: &DispatchSettings) -> Self {
        Self::new(settings.batch_size, settings.batch_delay())
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from(&DispatchSettings::default())
    }
}

/// Send `messages` through `sender` in paced batches
///
/// Returns the number of messages the sender accepted. Batch N+1 never starts
/// before every submission of batch N has settled. The pause is skipped after
/// the final batch.
pub async fn send_batched(sender: &dyn EmailSender, messages: &[Email], policy: BatchPolicy) -> usize {
    let total = messages.len();
    let batches = policy.batches_for(total);
    let mut sent = 0;

    for (index, batch) in messages.chunks(policy.batch_size).enumerate() {
        let results = join_all(batch.iter().cloned().map(|email| async move {
            let recipient = email.to.clone().unwrap_or_default();
            (recipient, sender.send(email).await)
        }))
        .await;

        let mut delivered = 0;
        for (recipient, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(error) => warn!(recipient = %recipient, %error, "Message submission failed"),
            }
        }
        sent += delivered;

        debug!(
            batch = index + 1,
            batches,
            size = batch.len(),
            delivered,
            "Batch settled"
        );

        if index + 1 < batches && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }

    info!(total, sent, failed = total - sent, batches, "Dispatch finished");
    sent
}
