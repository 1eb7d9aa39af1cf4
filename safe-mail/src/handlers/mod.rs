//! HTTP handlers

pub mod send;

pub use send::{process, send, SendRequest};
