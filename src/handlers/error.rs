// src/handlers/error.rs
use std::fmt;

use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, e.g. a missing `ids` parameter.
    Validation,
    /// The backend authoritatively reported no such account.
    NotFound,
    /// Backend trouble with no stale fallback available.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub trace_id: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        ApiError {
            kind: ErrorKind::Validation,
            message: message.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        ApiError {
            kind: ErrorKind::NotFound,
            message: message.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        ApiError {
            kind: ErrorKind::Unavailable,
            message: message.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
