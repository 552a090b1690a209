//! NewType wrappers for the identity values that flow through the login path.
//!
//! These keep provider-issued identifiers, provider tags and CSRF state
//! values from being mixed up with each other or with plain emails.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the wrapped value is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Account identifier issued by the identity provider.
    ///
    /// For Google this is the `id` field of the userinfo response. It is
    /// stored on the local user as `external_id` and is unique per store.
    ExternalUserId
);

newtype_string!(
    /// Tag naming the provider that most recently linked a user (e.g. "google").
    ProviderTag
);

newtype_string!(
    /// Opaque CSRF state value round-tripped through the authorization redirect.
    StateToken
);

impl StateToken {
    /// Generate a fresh, unguessable state value.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ProviderTag {
    /// The tag recorded for Google-linked accounts.
    pub fn google() -> Self {
        Self::new("google")
    }
}
