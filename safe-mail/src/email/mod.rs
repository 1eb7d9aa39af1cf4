//! Outgoing mail capability
//!
//! This module provides:
//! - [`Email`], the prepared single-recipient message
//! - [`EmailSender`], a capability bound to one account's credentials
//! - [`MailConnector`], the per-request factory for senders
//! - An SMTP backend built on `lettre`
//!
//! # Example
//!
//! ```rust,no_run
//! use safe_mail::config::SmtpSettings;
//! use safe_mail::email::{Email, MailConnector, SenderCredentials, SmtpConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = SmtpConnector::new(SmtpSettings::default());
//! let sender = connector.connect(&SenderCredentials::new("me@gmail.com", "app-pass"), 3)?;
//!
//! sender.verify().await?;
//! sender
//!     .send(
//!         Email::new()
//!             .from_named("Me", "me@gmail.com")
//!             .to("you@example.com")
//!             .subject("Hello")
//!             .text("Hello!"),
//!     )
//!     .await?;
//! sender.close().await;
//! # Ok(())
//! # }
//! ```

mod backend;
mod builder;
mod error;
mod sender;

pub use backend::smtp::{SmtpBackend, SmtpConnector};
pub use builder::Email;
pub use error::EmailError;
pub use sender::{EmailSender, MailConnector, SenderCredentials};

#[cfg(test)]
pub use sender::MockEmailSender;
