//! Maps a provider identity onto a local user, creating or linking as needed.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::error::{AuthError, StoreOperation};
use crate::auth::handshake::ProviderProfile;
use crate::auth::user_store::UserStore;
use crate::db::schema::{UserCreate, UserRecord};

/// Identity resolver.
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve `profile` to a local user.
    ///
    /// In order:
    /// 1. a user already linked to this external id is returned unchanged;
    /// 2. a user with the same email gets the external id and provider tag
    ///    attached (account linking);
    /// 3. otherwise a new user is created.
    ///
    /// If the create loses a race against a concurrent first login, the
    /// winner's row is re-read once and returned.
    pub async fn resolve(&self, profile: &ProviderProfile) -> Result<UserRecord, AuthError> {
        let existing = self
            .store
            .find_by_external_id(&profile.external_id)
            .await
            .map_err(|e| AuthError::store(StoreOperation::Lookup, e))?;
        if let Some(user) = existing {
            return Ok(user);
        }

        let by_email = self
            .store
            .find_by_email(&profile.email)
            .await
            .map_err(|e| AuthError::store(StoreOperation::Lookup, e))?;
        if let Some(user) = by_email {
            let linked = self
                .store
                .link_external_id(user.id, &profile.external_id, &profile.provider)
                .await
                .map_err(|e| AuthError::store(StoreOperation::Update, e))?;
            info!(
                "Linked {} account {} to existing user {}",
                profile.provider, profile.external_id, linked.id
            );
            return Ok(linked);
        }

        let create = UserCreate {
            email: profile.email.clone(),
            name: profile.name.clone(),
            picture: profile.picture.clone(),
            external_id: Some(profile.external_id.to_string()),
            provider: Some(profile.provider.to_string()),
        };

        match self.store.create(&create).await {
            Ok(user) => {
                info!("Created user {} for {} account {}", user.id, profile.provider, profile.external_id);
                Ok(user)
            }
            Err(create_err) => {
                warn!("Create failed for {}, re-reading once: {}", profile.email, create_err);
                match self.reread(profile).await {
                    Some(user) => Ok(user),
                    None => Err(AuthError::store(StoreOperation::Create, create_err)),
                }
            }
        }
    }

    /// Find the row a concurrent login may have just written.
    async fn reread(&self, profile: &ProviderProfile) -> Option<UserRecord> {
        if let Ok(Some(user)) = self.store.find_by_external_id(&profile.external_id).await {
            return Some(user);
        }

        // Another login may have created the email-only row first; only accept
        // it if it's already linked to this identity.
        match self.store.find_by_email(&profile.email).await {
            Ok(Some(user)) if user.external_id.as_deref() == Some(profile.external_id.as_str()) => {
                Some(user)
            }
            _ => None,
        }
    }
}
