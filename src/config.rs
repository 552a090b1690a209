//! Process-wide configuration, built once at startup and shared read-only.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

pub const GOOGLE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Default timeout for each outbound call to the provider.
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Lifetime of the `oauthstate` cookie and of server-side state entries.
pub const STATE_TTL_SECONDS: u64 = 300;

/// Default access-token lifetime.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// OAuth client configuration for the identity provider.
#[derive(Debug)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_url: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub scopes: Vec<String>,
    /// Timeout applied to the token exchange and the profile fetch
    pub timeout: Duration,
}

impl OAuthConfig {
    /// Google endpoints and scopes for the given client credentials.
    pub fn google(
        client_id: String,
        client_secret: String,
        redirect_url: &str,
    ) -> anyhow::Result<Self> {
        if client_id.is_empty() || client_secret.is_empty() {
            anyhow::bail!("Google client id and secret must not be empty");
        }

        Ok(Self {
            client_id,
            client_secret: SecretString::new(client_secret.into_boxed_str()),
            redirect_url: Url::parse(redirect_url)?,
            auth_url: Url::parse(GOOGLE_AUTH_URL)?,
            token_url: Url::parse(GOOGLE_TOKEN_URL)?,
            userinfo_url: Url::parse(GOOGLE_USERINFO_URL)?,
            scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECONDS),
        })
    }

    /// Point the token and userinfo calls somewhere else (a proxy, a test double).
    pub fn with_endpoints(mut self, auth_url: Url, token_url: Url, userinfo_url: Url) -> Self {
        self.auth_url = auth_url;
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Build the Google config only when every credential is present.
///
/// Returns `Ok(None)` if the provider is simply not configured, so the server
/// can still start and answer login attempts with "oauth not configured".
pub fn google_from_parts(
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: Option<String>,
) -> anyhow::Result<Option<OAuthConfig>> {
    match (client_id, client_secret, redirect_url) {
        (Some(id), Some(secret), Some(redirect)) if !id.is_empty() && !secret.is_empty() => {
            Ok(Some(OAuthConfig::google(id, secret, &redirect)?))
        }
        _ => Ok(None),
    }
}
