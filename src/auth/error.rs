//! Error taxonomy for the login handshake, identity resolution and token checks.
//!
//! Every variant maps to an HTTP status and a short machine-readable `error`
//! string; where the failure has a useful cause it is carried as `detail`.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Which user-store round-trip failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Lookup,
    Create,
    Update,
}

impl StoreOperation {
    fn message(self) -> &'static str {
        match self {
            Self::Lookup => "db error",
            Self::Create => "create user failed",
            Self::Update => "update user failed",
        }
    }
}

/// Authentication errors.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// The OAuth provider was not configured at startup
    ConfigurationMissing,
    /// Callback state absent or not matching the state cookie
    InvalidState,
    /// Callback carried no authorization code
    MissingCode,
    /// Code-for-token exchange failed
    ExchangeFailed(String),
    /// Userinfo request failed or returned non-200
    ProfileFetchFailed(String),
    /// Userinfo body was not valid JSON
    ProfileDecodeFailed(String),
    /// Userinfo lacked an id or email
    IncompleteProfile,
    /// User store failure
    Store {
        operation: StoreOperation,
        detail: String,
    },
    /// Access token could not be signed
    SigningFailed(String),
    /// Missing, malformed, mis-signed or expired bearer token
    Unauthorized {
        error: &'static str,
        detail: Option<String>,
    },
}

impl AuthError {
    pub fn store(operation: StoreOperation, err: impl fmt::Display) -> Self {
        Self::Store {
            operation,
            detail: err.to_string(),
        }
    }

    pub fn unauthorized(error: &'static str) -> Self {
        Self::Unauthorized {
            error,
            detail: None,
        }
    }

    pub fn invalid_token(detail: impl fmt::Display) -> Self {
        Self::Unauthorized {
            error: "invalid token",
            detail: Some(detail.to_string()),
        }
    }

    /// HTTP status returned for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidState
            | Self::MissingCode
            | Self::ExchangeFailed(_)
            | Self::ProfileFetchFailed(_)
            | Self::IncompleteProfile => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::ConfigurationMissing
            | Self::ProfileDecodeFailed(_)
            | Self::Store { .. }
            | Self::SigningFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error string for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing => "oauth not configured",
            Self::InvalidState => "invalid oauth state",
            Self::MissingCode => "code missing",
            Self::ExchangeFailed(_) => "token exchange failed",
            Self::ProfileFetchFailed(_) => "failed get userinfo",
            Self::ProfileDecodeFailed(_) => "decode failed",
            Self::IncompleteProfile => "incomplete google data",
            Self::Store { operation, .. } => operation.message(),
            Self::SigningFailed(_) => "token sign failed",
            Self::Unauthorized { error, .. } => error,
        }
    }

    /// Human-readable cause, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::ExchangeFailed(detail)
            | Self::ProfileFetchFailed(detail)
            | Self::ProfileDecodeFailed(detail)
            | Self::SigningFailed(detail)
            | Self::Store { detail, .. } => Some(detail),
            Self::Unauthorized { detail, .. } => detail.as_deref(),
            Self::ConfigurationMissing
            | Self::InvalidState
            | Self::MissingCode
            | Self::IncompleteProfile => None,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.error_code(), detail),
            None => write!(f, "{}", self.error_code()),
        }
    }
}

impl std::error::Error for AuthError {}

/// JSON error body: `{"error": ..., "detail"?: ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'a str>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error_code(),
            detail: self.detail(),
        };
        (self.status(), Json(body)).into_response()
    }
}
