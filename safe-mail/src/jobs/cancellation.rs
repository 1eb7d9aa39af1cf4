//! Cancellation for background jobs

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Signals background jobs to stop
///
/// Clones share state: cancelling one clone cancels all of them.
///
/// ```rust
/// use safe_mail::jobs::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let observer = token.clone();
///
/// token.cancel();
/// observer.cancelled().await;
/// assert!(observer.is_cancelled());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a token that is not yet cancelled
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.tx.send_replace(true);
        debug!("Cancellation requested");
    }

    /// Resolve once cancellation has been requested
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot fail here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
