//! OAuth2 authorization-code handshake with the identity provider.
//!
//! ## Flow
//!
//! 1. [`begin_login`](HandshakeManager::begin_login) generates a state value
//!    and the provider authorization URL. The caller stores the state in the
//!    `oauthstate` cookie and redirects the user agent.
//! 2. [`handle_callback`](HandshakeManager::handle_callback) checks the
//!    returned `state` against the cookie, exchanges the code for a provider
//!    access token, fetches the userinfo profile and normalizes it.
//!
//! The manager holds no per-login state of its own; everything it needs is
//! in the injected [`OAuthConfig`] and the optional [`StateStore`].

use chrono::Duration;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::error::AuthError;
use crate::auth::state_store::StateStore;
use crate::config::{OAuthConfig, STATE_TTL_SECONDS};
use crate::types::{ExternalUserId, ProviderTag, StateToken};

const USER_AGENT: &str = "IdentityGateway/1.0";

/// Largest token or userinfo body accepted from the provider.
const MAX_PROVIDER_BODY_BYTES: usize = 64 * 1024;

/// Cookie carrying the CSRF state between login and callback.
pub const OAUTH_STATE_COOKIE: &str = "oauthstate";

/// Where to send the user agent, and the state it must come back with.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: Url,
    pub state: StateToken,
}

/// Normalized provider profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub external_id: ExternalUserId,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub provider: ProviderTag,
}

/// Successful code exchange.
#[derive(Debug)]
struct AuthorizationGrant {
    access_token: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Success {
        access_token: String,
        #[serde(default)]
        token_type: Option<String>,
    },
    Error {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

/// Userinfo response. Fields that are missing or not strings read as `None`.
#[derive(Debug, Default, Deserialize)]
struct GoogleUserInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    picture: Option<String>,
}

/// Read a provider response body, refusing anything over
/// [`MAX_PROVIDER_BODY_BYTES`].
async fn read_body(mut response: reqwest::Response) -> Result<Vec<u8>, String> {
    if response
        .content_length()
        .is_some_and(|len| len > MAX_PROVIDER_BODY_BYTES as u64)
    {
        return Err(format!("response body exceeds {} bytes", MAX_PROVIDER_BODY_BYTES));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        if body.len() + chunk.len() > MAX_PROVIDER_BODY_BYTES {
            return Err(format!("response body exceeds {} bytes", MAX_PROVIDER_BODY_BYTES));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

impl GoogleUserInfo {
    fn into_profile(self, provider: ProviderTag) -> Result<ProviderProfile, AuthError> {
        let (Some(id), Some(email)) = (self.id, self.email) else {
            return Err(AuthError::IncompleteProfile);
        };

        Ok(ProviderProfile {
            external_id: ExternalUserId::new(id),
            email,
            name: self.name,
            picture: self.picture,
            provider,
        })
    }
}

/// Drives the authorization-code exchange for one provider.
pub struct HandshakeManager {
    config: OAuthConfig,
    client: Client,
    provider: ProviderTag,
    state_store: Option<StateStore>,
}

impl HandshakeManager {
    /// Create a manager for Google using `config`.
    pub fn new(config: OAuthConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            provider: ProviderTag::google(),
            state_store: None,
        })
    }

    /// Require each state value to be consumed from `store` on callback.
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn state_store(&self) -> Option<&StateStore> {
        self.state_store.as_ref()
    }

    /// Start a login attempt.
    pub async fn begin_login(&self) -> LoginRedirect {
        let state = StateToken::generate();

        if let Some(store) = &self.state_store {
            store
                .issue(state.clone(), Duration::seconds(STATE_TTL_SECONDS as i64))
                .await;
        }

        LoginRedirect {
            url: self.authorize_url(&state),
            state,
        }
    }

    /// Provider authorization URL for `state`, requesting offline access.
    pub fn authorize_url(&self, state: &StateToken) -> Url {
        let mut url = self.config.auth_url.clone();
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("client_id", &self.config.client_id);
            qp.append_pair("redirect_uri", self.config.redirect_url.as_str());
            qp.append_pair("response_type", "code");
            qp.append_pair("scope", &self.config.scopes.join(" "));
            qp.append_pair("state", state.as_str());
            qp.append_pair("access_type", "offline");
        }
        url
    }

    /// Validate the callback and return the provider profile.
    ///
    /// State is checked before anything else; on a mismatch no request is
    /// made to the provider.
    pub async fn handle_callback(
        &self,
        query_state: Option<&str>,
        cookie_state: Option<&str>,
        code: Option<&str>,
    ) -> Result<ProviderProfile, AuthError> {
        self.check_state(query_state, cookie_state).await?;

        let code = code.filter(|c| !c.is_empty()).ok_or(AuthError::MissingCode)?;

        let grant = self.exchange_code(code).await?;
        let profile = self.fetch_profile(&grant).await?;

        info!(
            "Provider login for {} account {}",
            profile.provider, profile.external_id
        );
        Ok(profile)
    }

    async fn check_state(
        &self,
        query_state: Option<&str>,
        cookie_state: Option<&str>,
    ) -> Result<(), AuthError> {
        let (Some(query_state), Some(cookie_state)) = (
            query_state.filter(|s| !s.is_empty()),
            cookie_state.filter(|s| !s.is_empty()),
        ) else {
            warn!("OAuth callback without state or state cookie");
            return Err(AuthError::InvalidState);
        };

        if !bool::from(query_state.as_bytes().ct_eq(cookie_state.as_bytes())) {
            warn!("OAuth callback state does not match cookie");
            return Err(AuthError::InvalidState);
        }

        if let Some(store) = &self.state_store {
            if !store.consume(query_state).await {
                warn!("OAuth callback state unknown, expired or already used");
                return Err(AuthError::InvalidState);
            }
        }

        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthorizationGrant, AuthError> {
        debug!("Exchanging authorization code at {}", self.config.token_url);

        let response = self
            .client
            .post(self.config.token_url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        let status = response.status();
        let body = read_body(response).await.map_err(AuthError::ExchangeFailed)?;

        let parsed = serde_json::from_slice::<TokenResponse>(&body);

        match (status.is_success(), parsed) {
            (
                _,
                Ok(TokenResponse::Error {
                    error,
                    error_description,
                }),
            ) => {
                let detail = error_description.unwrap_or(error);
                warn!("Token exchange rejected ({}): {}", status, detail);
                Err(AuthError::ExchangeFailed(detail))
            }
            (false, _) => {
                warn!("Token exchange failed with HTTP {}", status);
                Err(AuthError::ExchangeFailed(format!(
                    "HTTP {} from token endpoint",
                    status
                )))
            }
            (
                true,
                Ok(TokenResponse::Success {
                    token_type: Some(token_type),
                    ..
                }),
            ) if !token_type.eq_ignore_ascii_case("bearer") => {
                warn!("Token endpoint issued unsupported token type {}", token_type);
                Err(AuthError::ExchangeFailed(format!(
                    "unsupported token type: {}",
                    token_type
                )))
            }
            (true, Ok(TokenResponse::Success { access_token, .. })) => Ok(AuthorizationGrant {
                access_token: SecretString::new(access_token.into_boxed_str()),
            }),
            (true, Err(e)) => Err(AuthError::ExchangeFailed(format!(
                "invalid token response: {}",
                e
            ))),
        }
    }

    async fn fetch_profile(&self, grant: &AuthorizationGrant) -> Result<ProviderProfile, AuthError> {
        let response = self
            .client
            .get(self.config.userinfo_url.as_str())
            .bearer_auth(grant.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.to_string()))?;

        if response.status() != StatusCode::OK {
            warn!("Userinfo request returned HTTP {}", response.status());
            return Err(AuthError::ProfileFetchFailed(format!(
                "userinfo status not OK: {}",
                response.status()
            )));
        }

        let body = read_body(response)
            .await
            .map_err(AuthError::ProfileFetchFailed)?;

        let info: GoogleUserInfo = serde_json::from_slice(&body)
            .map_err(|e| AuthError::ProfileDecodeFailed(e.to_string()))?;

        info.into_profile(self.provider.clone())
    }
}
