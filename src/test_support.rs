//! In-process stand-in for the identity provider's token and userinfo
//! endpoints, bound to an ephemeral local port.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use tokio::task::JoinHandle;
use url::Url;

use crate::config::OAuthConfig;

pub(crate) const MOCK_ACCESS_TOKEN: &str = "mock-access-token";

/// How the mock provider answers.
#[derive(Clone)]
pub(crate) struct ProviderBehaviour {
    pub token_status: StatusCode,
    pub token_body: String,
    pub userinfo_status: StatusCode,
    pub userinfo_body: String,
}

impl Default for ProviderBehaviour {
    fn default() -> Self {
        Self {
            token_status: StatusCode::OK,
            token_body: serde_json::json!({
                "access_token": MOCK_ACCESS_TOKEN,
                "token_type": "Bearer",
                "expires_in": 3599,
            })
            .to_string(),
            userinfo_status: StatusCode::OK,
            userinfo_body: serde_json::json!({
                "id": "g-100",
                "email": "ada@example.com",
                "verified_email": true,
                "name": "Ada Lovelace",
                "picture": "https://example.com/ada.png",
            })
            .to_string(),
        }
    }
}

#[derive(Clone)]
struct MockState {
    behaviour: ProviderBehaviour,
    token_hits: Arc<AtomicUsize>,
    userinfo_hits: Arc<AtomicUsize>,
}

pub(crate) struct MockProvider {
    pub base: Url,
    pub token_hits: Arc<AtomicUsize>,
    pub userinfo_hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockProvider {
    pub async fn start(behaviour: ProviderBehaviour) -> Self {
        let token_hits = Arc::new(AtomicUsize::new(0));
        let userinfo_hits = Arc::new(AtomicUsize::new(0));

        let state = MockState {
            behaviour,
            token_hits: token_hits.clone(),
            userinfo_hits: userinfo_hits.clone(),
        };

        let app = Router::new()
            .route("/token", post(token))
            .route("/userinfo", get(userinfo))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{}/", addr)).unwrap(),
            token_hits,
            userinfo_hits,
            handle,
        }
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client config pointing at `provider`.
pub(crate) fn mock_oauth_config(provider: &MockProvider) -> OAuthConfig {
    OAuthConfig::google(
        "test-client".to_string(),
        "test-secret".to_string(),
        "http://localhost:1000/auth/callback",
    )
    .unwrap()
    .with_endpoints(
        Url::parse("https://accounts.example.com/o/oauth2/auth").unwrap(),
        provider.base.join("token").unwrap(),
        provider.base.join("userinfo").unwrap(),
    )
}

async fn token(State(state): State<MockState>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.token_hits.fetch_add(1, Ordering::SeqCst);

    let well_formed = form.get("grant_type").map(String::as_str) == Some("authorization_code")
        && form.get("client_id").map(String::as_str) == Some("test-client")
        && form.get("client_secret").map(String::as_str) == Some("test-secret")
        && form.contains_key("redirect_uri");

    if !well_formed || form.get("code").map(String::as_str) == Some("bad-code") {
        return (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request",
            })
            .to_string(),
        )
            .into_response();
    }

    (
        state.behaviour.token_status,
        [(header::CONTENT_TYPE, "application/json")],
        state.behaviour.token_body.clone(),
    )
        .into_response()
}

async fn userinfo(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.userinfo_hits.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {}", MOCK_ACCESS_TOKEN);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    (
        state.behaviour.userinfo_status,
        [(header::CONTENT_TYPE, "application/json")],
        state.behaviour.userinfo_body.clone(),
    )
        .into_response()
}
