//! Background jobs
//!
//! The service runs a single scheduled job, [`QuotaResetJob`], owned by the
//! process lifecycle and stopped through a [`CancellationToken`] on shutdown.

mod cancellation;
mod reset;

pub use cancellation::CancellationToken;
pub use reset::QuotaResetJob;
