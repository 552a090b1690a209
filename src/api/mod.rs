// HTTP endpoints for Google sign-in and token-protected routes

use axum::{
    Extension, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{
    AccessClaims, AuthError, HandshakeManager, IdentityResolver, OAUTH_STATE_COOKIE, TokenSigner,
    require_bearer,
};
use crate::config::STATE_TTL_SECONDS;
use crate::db::UserRecord;
use crate::types::StateToken;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the provider credentials were not configured
    pub handshake: Option<Arc<HandshakeManager>>,
    pub resolver: Arc<IdentityResolver>,
    pub tokens: Arc<TokenSigner>,
}

impl AppState {
    pub fn new(
        handshake: Option<HandshakeManager>,
        resolver: IdentityResolver,
        tokens: TokenSigner,
    ) -> Self {
        Self {
            handshake: handshake.map(Arc::new),
            resolver: Arc::new(resolver),
            tokens: Arc::new(tokens),
        }
    }

    fn handshake(&self) -> Result<&HandshakeManager, AuthError> {
        self.handshake
            .as_deref()
            .ok_or(AuthError::ConfigurationMissing)
    }
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

fn state_cookie(state: &StateToken) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        OAUTH_STATE_COOKIE, state, STATE_TTL_SECONDS
    )
}

fn expired_state_cookie() -> String {
    format!(
        "{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax",
        OAUTH_STATE_COOKIE
    )
}

/// Start a login: set the state cookie and redirect to the provider.
async fn login(State(state): State<AppState>) -> Result<Response, AuthError> {
    let redirect = state.handshake()?.begin_login().await;

    Ok((
        [(header::SET_COOKIE, state_cookie(&redirect.state))],
        Redirect::temporary(redirect.url.as_str()),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    /// Set by the provider when the user declines consent
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallbackResponse {
    token: String,
    user: UserRecord,
}

/// Finish a login: validate, resolve the local user and mint a token.
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let handshake = state.handshake()?;

    if let Some(error) = &params.error {
        warn!("Provider returned error on callback: {}", error);
    }

    let profile = handshake
        .handle_callback(
            params.state.as_deref(),
            jar.get(OAUTH_STATE_COOKIE).map(|c| c.value()),
            params.code.as_deref(),
        )
        .await?;

    let user = state.resolver.resolve(&profile).await?;
    let token = state.tokens.issue(user.id, &user.email)?;

    info!("User {} signed in", user.id);

    Ok((
        [(header::SET_COOKIE, expired_state_cookie())],
        Json(CallbackResponse { token, user }),
    )
        .into_response())
}

async fn me(Extension(claims): Extension<AccessClaims>) -> Json<Value> {
    Json(serde_json::json!({ "me": claims }))
}
