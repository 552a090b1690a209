//! Access-token signing and verification (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::auth::context::AccessClaims;
use crate::auth::error::AuthError;
use crate::config::DEFAULT_TOKEN_TTL_HOURS;

/// Algorithms `verify` accepts. Anything outside the HMAC family is rejected
/// before the signature is checked.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Mints and checks self-contained access tokens.
pub struct TokenSigner {
    secret: SecretString,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user_id` that expires `ttl` from now.
    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, AuthError> {
        self.issue_expiring_at(user_id, email, Utc::now() + self.ttl)
    }

    /// Issue a token with an explicit expiry instant.
    pub fn issue_expiring_at(
        &self,
        user_id: i64,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = AccessClaims::new(user_id, email, expires_at.timestamp());
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());

        encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Check signature, algorithm and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::invalid_token("empty token"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let data = decode::<AccessClaims>(token, &key, &validation).map_err(|e| {
            debug!("Rejected access token: {}", e);
            AuthError::invalid_token(e)
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(SecretString::new(secret.to_string().into_boxed_str()))
    }

    fn forge(header: &str, payload: &str, signature: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = signer("top-secret");
        let token = signer.issue(42, "ada@example.com").unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.user_id(), 42);
        assert_eq!(claims.email(), "ada@example.com");

        let expected = (Utc::now() + Duration::hours(24)).timestamp();
        assert!((claims.exp() - expected).abs() <= 5);
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let signer = signer("top-secret");
        let token = signer
            .issue_expiring_at(1, "ada@example.com", Utc::now() - Duration::seconds(5))
            .unwrap();

        let err = signer.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { error: "invalid token", .. }));
        assert!(err.detail().is_some());
    }

    #[test]
    fn test_custom_ttl() {
        let signer = signer("top-secret").with_ttl(Duration::minutes(5));
        let token = signer.issue(1, "ada@example.com").unwrap();

        let claims = signer.verify(&token).unwrap();
        let expected = (Utc::now() + Duration::minutes(5)).timestamp();
        assert!((claims.exp() - expected).abs() <= 5);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = signer("secret-a").issue(1, "ada@example.com").unwrap();

        let err = signer("secret-b").verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }

    #[test]
    fn test_non_hmac_algorithm_is_unauthorized() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let payload = format!(r#"{{"user_id":1,"email":"ada@example.com","exp":{}}}"#, exp);

        let rs256 = forge(r#"{"alg":"RS256","typ":"JWT"}"#, &payload, "not-a-signature");
        let err = signer("top-secret").verify(&rs256).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));

        let unsigned = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(&payload)
        );
        let err = signer("top-secret").verify(&unsigned).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }

    #[test]
    fn test_malformed_token_is_unauthorized() {
        let signer = signer("top-secret");

        for token in ["", "   ", "abc", "a.b.c"] {
            let err = signer.verify(token).unwrap_err();
            assert!(matches!(err, AuthError::Unauthorized { .. }), "token {:?}", token);
        }
    }

    #[test]
    fn test_tampered_payload_is_unauthorized() {
        let signer = signer("top-secret");
        let token = signer.issue(1, "ada@example.com").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"user_id":2,"email":"eve@example.com","exp":{}}}"#,
            exp
        ));
        let tampered = format!("{}.{}.{}", parts[0], payload, parts[2]);

        assert!(signer.verify(&tampered).is_err());
    }
}
