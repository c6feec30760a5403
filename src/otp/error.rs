//! OTP error taxonomy and its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Stable, fieldless category of an [`OtpError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    RateLimited,
    QuotaExceeded,
    DeliveryFailed,
    NotFound,
    AlreadyUsed,
    Expired,
    TooManyAttempts,
    InvalidCode,
    Internal,
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Please wait before resending.")]
    RateLimited,

    #[error("Resend limit reached.")]
    QuotaExceeded,

    /// The record stays committed; `trace` carries the transport diagnostic.
    #[error("Failed to send email")]
    DeliveryFailed { trace: String },

    #[error("No OTP requested.")]
    NotFound,

    #[error("Code already used.")]
    AlreadyUsed,

    #[error("Code expired.")]
    Expired,

    #[error("Too many attempts.")]
    TooManyAttempts,

    #[error("Invalid code.")]
    InvalidCode,

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl OtpError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::QuotaExceeded => ErrorKind::QuotaExceeded,
            Self::DeliveryFailed { .. } => ErrorKind::DeliveryFailed,
            Self::NotFound => ErrorKind::NotFound,
            Self::AlreadyUsed => ErrorKind::AlreadyUsed,
            Self::Expired => ErrorKind::Expired,
            Self::TooManyAttempts => ErrorKind::TooManyAttempts,
            Self::InvalidCode => ErrorKind::InvalidCode,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput
            | ErrorKind::NotFound
            | ErrorKind::AlreadyUsed
            | ErrorKind::Expired
            | ErrorKind::InvalidCode => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited | ErrorKind::QuotaExceeded | ErrorKind::TooManyAttempts => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ErrorKind::DeliveryFailed | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body: `{ "error": ..., "trace"?: ... }`.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl From<&OtpError> for ErrorBody {
    fn from(err: &OtpError) -> Self {
        let trace = match err {
            OtpError::DeliveryFailed { trace } => Some(trace.clone()),
            _ => None,
        };
        Self {
            error: err.to_string(),
            trace,
        }
    }
}

impl IntoResponse for OtpError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            // Only the generic message leaves the process.
            error!("otp request failed: {err:#}");
        }
        (self.status_code(), Json(ErrorBody::from(&self))).into_response()
    }
}
