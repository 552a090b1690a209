// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    AccessClaims, AuthError, HandshakeManager, IdentityResolver, StateStore, SurrealUserStore,
    TokenSigner, UserStore,
};
pub use config::{OAuthConfig, google_from_parts};
pub use db::{DatabaseConfig, UserCreate, UserRecord, create_connection, ensure_schema};

use std::sync::Arc;

use anyhow::Result;
use secrecy::SecretString;
use tracing::{info, warn};

/// Everything needed to assemble the gateway.
pub struct GatewayConfig {
    pub database: DatabaseConfig,
    pub jwt_secret: SecretString,
    pub token_ttl: chrono::Duration,
    /// `None` leaves login disabled ("oauth not configured")
    pub oauth: Option<OAuthConfig>,
    /// Reject a callback whose state was not issued by this process, or was already used
    pub single_use_state: bool,
}

/// Convenience function to connect the store and build the shared app state.
///
/// This opens the database, applies the schema, and wires the handshake
/// manager, identity resolver and token signer together.
pub async fn create_app_state(config: GatewayConfig) -> Result<AppState> {
    let db = create_connection(config.database).await?;
    ensure_schema(&db).await?;

    let handshake = match config.oauth {
        Some(oauth) => {
            let manager = HandshakeManager::new(oauth)?;
            Some(if config.single_use_state {
                manager.with_state_store(StateStore::new())
            } else {
                manager
            })
        }
        None => {
            warn!("Google OAuth credentials not set; login endpoints will answer 500");
            None
        }
    };

    let store: Arc<dyn UserStore> = Arc::new(SurrealUserStore::new(db));
    let tokens = TokenSigner::new(config.jwt_secret).with_ttl(config.token_ttl);

    info!(
        "Gateway ready (oauth configured: {}, single-use state: {})",
        handshake.is_some(),
        config.single_use_state
    );

    Ok(AppState::new(handshake, IdentityResolver::new(store), tokens))
}
