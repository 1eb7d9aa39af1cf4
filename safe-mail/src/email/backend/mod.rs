//! Email backend implementations

pub mod smtp;
