//! Error types and error handling
//!
//! Every failure of a send request is recovered into a structured JSON body
//! with HTTP 200, so callers always receive `{success, msg, count}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quota::QuotaError;

/// Terminal failures of a send request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// A required field was absent or empty
    #[error("Missing Fields ❌")]
    MissingFields,

    /// The identity already used its whole quota this window
    #[error("Hourly Limit Reached ❌")]
    LimitReached {
        /// Identity's current count
        count: u32,
    },

    /// More recipients than remaining quota
    #[error("Mail Limit Full ❌")]
    LimitFull {
        /// Identity's current count
        count: u32,
        /// Recipients in the request
        requested: usize,
        /// Capacity left
        remaining: u32,
    },

    /// The relay rejected the credentials
    #[error("Wrong App Password ❌")]
    WrongCredential {
        /// Identity's current count
        count: u32,
    },
}

impl SendError {
    /// Identity's count reported alongside the failure
    #[must_use]
    pub const fn count(&self) -> u32 {
        match self {
            Self::MissingFields => 0,
            Self::LimitReached { count }
            | Self::LimitFull { count, .. }
            | Self::WrongCredential { count } => *count,
        }
    }
}

impl From<QuotaError> for SendError {
    fn from(error: QuotaError) -> Self {
        match error {
            QuotaError::LimitReached { count } => Self::LimitReached { count },
            QuotaError::LimitFull {
                count,
                requested,
                remaining,
            } => Self::LimitFull {
                count,
                requested,
                remaining,
            },
        }
    }
}

/// JSON body returned by `POST /send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Whether the dispatch ran
    pub success: bool,

    /// Human readable failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    /// Messages delivered by this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,

    /// Identity's running count for the window
    pub count: u32,
}

impl SendResponse {
    /// Successful dispatch
    #[must_use]
    pub const fn delivered(sent: usize, count: u32) -> Self {
        Self {
            success: true,
            msg: None,
            sent: Some(sent),
            count,
        }
    }

    /// Failed request
    #[must_use]
    pub fn failure(error: &SendError) -> Self {
        Self {
            success: false,
            msg: Some(error.to_string()),
            sent: None,
            count: error.count(),
        }
    }
}

impl IntoResponse for SendError {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(SendResponse::failure(&self))).into_response()
    }
}
