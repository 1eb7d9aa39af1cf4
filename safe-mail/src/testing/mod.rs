//! Test doubles for the mail capability
//!
//! - [`RecordingSender`] - in-memory [`EmailSender`](crate::email::EmailSender)
//! - [`StaticConnector`] - [`MailConnector`](crate::email::MailConnector)
//!   handing out a shared `RecordingSender`
//!
//! The mockall-generated `MockEmailSender` is available from
//! [`crate::email`] in test builds.

pub mod email;

pub use email::{RecordingSender, StaticConnector};
