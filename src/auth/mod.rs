//! Google sign-in and bearer-token authentication.
//!
//! ## Components
//!
//! - [`HandshakeManager`]: OAuth2 authorization-code flow against the provider
//!   (state cookie, code exchange, userinfo fetch)
//! - [`StateStore`]: optional server-side single-use registry of issued states
//! - [`IdentityResolver`]: maps a provider profile to a local user, linking
//!   by email when an account already exists
//! - [`TokenSigner`]: HS256 access tokens carrying [`AccessClaims`]
//! - [`require_bearer`]: axum middleware guarding protected routes
//!
//! ## Usage
//!
//! ```ignore
//! let profile = handshake.handle_callback(state, cookie, code).await?;
//! let user = resolver.resolve(&profile).await?;
//! let token = tokens.issue(user.id, &user.email)?;
//! ```

mod context;
pub mod error;
pub mod handshake;
pub mod middleware;
pub mod resolver;
pub mod state_store;
pub mod token;
pub mod user_store;

pub use context::AccessClaims;
pub use error::{AuthError, ErrorBody, StoreOperation};
pub use handshake::{HandshakeManager, LoginRedirect, OAUTH_STATE_COOKIE, ProviderProfile};
pub use middleware::{bearer_token, require_bearer};
pub use resolver::IdentityResolver;
pub use state_store::StateStore;
pub use token::TokenSigner;
pub use user_store::{SurrealUserStore, UserStore};
