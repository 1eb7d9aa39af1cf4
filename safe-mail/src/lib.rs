//! safe-mail: quota-gated bulk mail relay
//!
//! Accepts a bulk send request over HTTP, enforces a per-account hourly quota,
//! lightly rewrites subject and body, and relays one message per recipient
//! through the account's SMTP provider in small, paced batches.
//!
//! # Architecture
//!
//! - [`content`] - subject/body normalization and soften rules
//! - [`recipients`] - recipient list parsing
//! - [`quota`] - per-identity counters with reservations
//! - [`dispatch`] - batched, paced delivery
//! - [`email`] - message type, sender capability, SMTP backend
//! - [`jobs`] - scheduled hourly quota reset
//! - [`handlers`] - the `POST /send` pipeline
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use safe_mail::{config::SafeMailConfig, jobs::{CancellationToken, QuotaResetJob}, router, state::AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SafeMailConfig::load()?;
//!     let state = AppState::new(config)?;
//!
//!     let token = CancellationToken::new();
//!     let reset = QuotaResetJob::new(state.quota().clone()).spawn(token.clone());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router::router(state)).await?;
//!
//!     token.cancel();
//!     reset.await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod observability;
pub mod quota;
pub mod recipients;
pub mod router;
pub mod state;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types

    pub use crate::config::SafeMailConfig;
    pub use crate::content::ContentNormalizer;
    pub use crate::dispatch::{send_batched, BatchPolicy};
    pub use crate::email::{Email, EmailError, EmailSender, MailConnector, SenderCredentials, SmtpConnector};
    pub use crate::error::{SendError, SendResponse};
    pub use crate::jobs::{CancellationToken, QuotaResetJob};
    pub use crate::quota::{QuotaError, QuotaReservation, QuotaTracker};
    pub use crate::recipients::parse_recipients;
    pub use crate::router::router;
    pub use crate::state::AppState;
}
