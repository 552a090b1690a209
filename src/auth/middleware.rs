//! Bearer-token guard for protected routes.
//!
//! ```ignore
//! Router::new()
//!     .route("/me", get(me))
//!     .route_layer(middleware::from_fn_with_state(tokens, require_bearer))
//! ```
//!
//! On success the verified [`AccessClaims`] are available to handlers as
//! `Extension<AccessClaims>`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::auth::context::AccessClaims;
use crate::auth::error::AuthError;
use crate::auth::token::TokenSigner;

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::unauthorized("missing authorization header")),
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::unauthorized("invalid authorization header"))?;

    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next().map(str::trim)) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AuthError::unauthorized("invalid authorization header")),
    }
}

/// Verify the bearer token and attach its claims to the request.
pub async fn require_bearer(
    State(tokens): State<Arc<TokenSigner>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let claims: AccessClaims = match bearer_token(req.headers()).and_then(|t| tokens.verify(t)) {
        Ok(claims) => claims,
        Err(err) => {
            warn!("Rejected request to {}: {}", req.uri().path(), err);
            return err.into_response();
        }
    };

    req.extensions_mut().insert(claims);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Json, Router, middleware};
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new(SecretString::new("middleware-secret".into())))
    }

    fn app(tokens: Arc<TokenSigner>) -> Router {
        Router::new()
            .route(
                "/protected",
                get(|Extension(claims): Extension<AccessClaims>| async move {
                    Json(serde_json::json!({"user_id": claims.user_id()}))
                }),
            )
            .route_layer(middleware::from_fn_with_state(tokens, require_bearer))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            bearer_token(&headers).unwrap_err().error_code(),
            "missing authorization header"
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(""));
        assert_eq!(
            bearer_token(&headers).unwrap_err().error_code(),
            "missing authorization header"
        );

        for bad in ["Token abc", "Bearer", "Bearer ", "abc", "Basic dXNlcjpwYXNz"] {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(bad));
            assert_eq!(
                bearer_token(&headers).unwrap_err().error_code(),
                "invalid authorization header",
                "{}",
                bad
            );
        }

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bEaReR abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let tokens = signer();
        let token = tokens.issue(42, "ada@example.com").unwrap();

        let (status, body) = call(app(tokens), Some(&format!("Bearer {}", token))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], 42);
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (status, body) = call(app(signer()), None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({"error": "missing authorization header"}));
    }

    #[tokio::test]
    async fn test_wrong_scheme() {
        let (status, body) = call(app(signer()), Some("Token abc")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({"error": "invalid authorization header"}));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let tokens = signer();
        let token = tokens
            .issue_expiring_at(1, "ada@example.com", Utc::now() - Duration::minutes(5))
            .unwrap();

        let (status, body) = call(app(tokens), Some(&format!("Bearer {}", token))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_token_from_other_secret() {
        let other = TokenSigner::new(SecretString::new("another-secret".into()));
        let token = other.issue(1, "ada@example.com").unwrap();

        let (status, body) = call(app(signer()), Some(&format!("Bearer {}", token))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");
    }
}
