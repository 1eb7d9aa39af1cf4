//! Per-identity hourly send quotas
//!
//! Every sender identity gets a counter of messages sent in the current
//! window. The window is a hard wall-clock interval: a scheduled job (see
//! [`crate::jobs::QuotaResetJob`]) clears every counter at once, regardless of
//! when each identity last sent. There is no sliding window and no burst
//! allowance.
//!
//! A request first reserves capacity for its recipients, then commits the
//! number of messages that were actually delivered. Reservations count
//! against remaining capacity, so concurrent requests for the same identity
//! cannot jointly exceed the limit.
//!
//! # Example
//!
//! ```rust
//! use safe_mail::config::QuotaSettings;
//! use safe_mail::quota::QuotaTracker;
//!
//! let tracker = QuotaTracker::new(&QuotaSettings::default());
//!
//! let reservation = tracker.check_and_reserve("me@gmail.com", 2).unwrap();
//! assert_eq!(reservation.remaining(), 28);
//!
//! // One of the two messages failed
//! assert_eq!(reservation.commit(1), 1);
//! assert_eq!(tracker.count("me@gmail.com"), 1);
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::QuotaSettings;

/// Quota state for one identity in the current window
#[derive(Debug, Clone, Copy, Default)]
struct QuotaRecord {
    /// Messages delivered this window
    count: u32,
    /// Capacity held by in-flight requests
    reserved: u32,
}

/// All records of the current window
#[derive(Debug, Default)]
struct QuotaWindow {
    /// Incremented on every reset so stale reservations can be recognised
    epoch: u64,
    records: HashMap<String, QuotaRecord>,
}

/// Process-wide quota state, cheap to clone
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    limit: u32,
    window: Duration,
    state: Arc<RwLock<QuotaWindow>>,
}

impl QuotaTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new(settings: &QuotaSettings) -> Self {
        Self {
            limit: settings.hourly_limit,
            window: settings.window(),
            state: Arc::new(RwLock::new(QuotaWindow::default())),
        }
    }

    /// Messages allowed per identity per window
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Length of the reset window
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Messages sent by `identity` this window, zero if unknown
    #[must_use]
    pub fn count(&self, identity: &str) -> u32 {
        self.state
            .read()
            .records
            .get(identity)
            .map_or(0, |record| record.count)
    }

    /// Number of identities with a record in the current window
    #[must_use]
    pub fn tracked_identities(&self) -> usize {
        self.state.read().records.len()
    }

    /// Fail if `identity` has already used its whole quota
    ///
    /// Creates the identity's record on first sight. Returns the current count.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::LimitReached`] when the count is at the limit
    pub fn check(&self, identity: &str) -> Result<u32, QuotaError> {
        let count = {
            let mut state = self.state.write();
            state.records.entry(identity.to_string()).or_default().count
        };

        if count >= self.limit {
            warn!(identity = %identity, count, limit = self.limit, "Hourly limit reached");
            return Err(QuotaError::LimitReached { count });
        }

        Ok(count)
    }

    /// Check both limits and hold `requested` units of capacity
    ///
    /// # Errors
    ///
    /// - [`QuotaError::LimitReached`] when the count is at the limit
    /// - [`QuotaError::LimitFull`] when `requested` exceeds remaining capacity
    pub fn check_and_reserve(
        &self,
        identity: &str,
        requested: usize,
    ) -> Result<QuotaReservation, QuotaError> {
        let requested_units = u32::try_from(requested).unwrap_or(u32::MAX);

        let (epoch, outcome) = {
            let mut state = self.state.write();
            let epoch = state.epoch;
            let record = state.records.entry(identity.to_string()).or_default();

            let outcome = if record.count >= self.limit {
                Err(QuotaError::LimitReached {
                    count: record.count,
                })
            } else {
                let remaining = self
                    .limit
                    .saturating_sub(record.count)
                    .saturating_sub(record.reserved);
                if requested_units > remaining {
                    Err(QuotaError::LimitFull {
                        count: record.count,
                        requested,
                        remaining,
                    })
                } else {
                    record.reserved += requested_units;
                    Ok((record.count, remaining))
                }
            };
            (epoch, outcome)
        };

        match outcome {
            Ok((current_count, remaining)) => {
                debug!(
                    identity = %identity,
                    requested,
                    current_count,
                    remaining,
                    "Quota reserved"
                );
                Ok(QuotaReservation {
                    tracker: self.clone(),
                    identity: identity.to_string(),
                    reserved: requested_units,
                    epoch,
                    current_count,
                    remaining,
                    settled: false,
                })
            }
            Err(error) => {
                warn!(identity = %identity, requested, limit = self.limit, %error, "Quota check failed");
                Err(error)
            }
        }
    }

    /// Add `sent` to the identity's counter, creating the record if needed
    pub fn commit(&self, identity: &str, sent: usize) {
        self.settle(identity, 0, None, sent);
    }

    /// Atomically clear every record
    ///
    /// Returns the number of identities that were cleared.
    #[must_use]
    pub fn reset(&self) -> usize {
        let cleared = {
            let mut state = self.state.write();
            let cleared = state.records.len();
            state.records.clear();
            state.epoch = state.epoch.wrapping_add(1);
            cleared
        };

        debug!(cleared, "Quota window reset");
        cleared
    }

    fn settle(&self, identity: &str, reserved: u32, epoch: Option<u64>, sent: usize) -> u32 {
        let sent = u32::try_from(sent).unwrap_or(u32::MAX);
        let mut state = self.state.write();
        let same_window = epoch.is_none_or(|epoch| epoch == state.epoch);
        let record = state.records.entry(identity.to_string()).or_default();

        if same_window {
            record.reserved = record.reserved.saturating_sub(reserved);
        }
        record.count = record.count.saturating_add(sent);
        record.count
    }

    fn release(&self, identity: &str, reserved: u32, epoch: u64) {
        let mut state = self.state.write();
        if state.epoch != epoch {
            return;
        }
        if let Some(record) = state.records.get_mut(identity) {
            record.reserved = record.reserved.saturating_sub(reserved);
        }
    }
}

/// Capacity held for one in-flight request
///
/// Call [`commit`](Self::commit) with the delivered count once dispatch is
/// done. Dropping an uncommitted reservation releases the capacity without
/// touching the counter.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it without recording sends"]
pub struct QuotaReservation {
    tracker: QuotaTracker,
    identity: String,
    reserved: u32,
    epoch: u64,
    current_count: u32,
    remaining: u32,
    settled: bool,
}

impl QuotaReservation {
    /// Identity's count when the reservation was taken
    #[must_use]
    pub const fn current_count(&self) -> u32 {
        self.current_count
    }

    /// Capacity that was available before this reservation
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Units held by this reservation
    #[must_use]
    pub const fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Record `sent` deliveries and release the reservation
    ///
    /// Returns the identity's new count. If a reset happened since the
    /// reservation was taken, the deliveries are counted in the new window.
    #[must_use]
    pub fn commit(mut self, sent: usize) -> u32 {
        self.settled = true;
        self.tracker
            .settle(&self.identity, self.reserved, Some(self.epoch), sent)
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.release(&self.identity, self.reserved, self.epoch);
        }
    }
}

/// Quota check failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// The identity has no capacity left this window
    #[error("hourly limit reached ({count} sent)")]
    LimitReached {
        /// Current count
        count: u32,
    },

    /// The request asks for more messages than remain
    #[error("requested {requested} messages but only {remaining} remain ({count} sent)")]
    LimitFull {
        /// Current count
        count: u32,
        /// Recipients in the request
        requested: usize,
        /// Capacity left
        remaining: u32,
    },
}

impl QuotaError {
    /// Identity's count at the time of the failure
    #[must_use]
    pub const fn count(&self) -> u32 {
        match self {
            Self::LimitReached { count } | Self::LimitFull { count, .. } => *count,
        }
    }
}
