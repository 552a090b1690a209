//! Claims carried by an access token and attached to authenticated requests.

use serde::{Deserialize, Serialize};

/// Decoded access-token claims.
///
/// The authorization middleware inserts this into the request extensions; it
/// is immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    user_id: i64,
    email: String,
    /// Expiration time (Unix seconds)
    exp: i64,
}

impl AccessClaims {
    pub fn new(user_id: i64, email: impl Into<String>, exp: i64) -> Self {
        Self {
            user_id,
            email: email.into(),
            exp,
        }
    }

    /// Local user identifier.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Expiration as Unix seconds.
    pub fn exp(&self) -> i64 {
        self.exp
    }
}
