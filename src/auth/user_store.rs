//! User storage.
//!
//! [`UserStore`] is the seam the identity resolver talks to; the production
//! implementation is [`SurrealUserStore`]. Uniqueness of `email` and
//! `external_id` is enforced by the store's indexes, not by callers.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::Db;
use crate::db::schema::{USER_PROJECTION, UserCreate, UserRecord};
use crate::types::{ExternalUserId, ProviderTag};

/// Persistent user operations needed by the login flow.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by provider account id.
    async fn find_by_external_id(&self, external_id: &ExternalUserId)
    -> Result<Option<UserRecord>>;

    /// Look up a user by email (exact match).
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Look up a user by local id.
    async fn get(&self, id: i64) -> Result<Option<UserRecord>>;

    /// Insert a new user. Fails on a unique-index violation.
    async fn create(&self, create: &UserCreate) -> Result<UserRecord>;

    /// Attach a provider identity to an existing user.
    async fn link_external_id(
        &self,
        id: i64,
        external_id: &ExternalUserId,
        provider: &ProviderTag,
    ) -> Result<UserRecord>;
}

/// Attempts per write before a transaction conflict is reported.
const MAX_WRITE_ATTEMPTS: u32 = 20;

/// Whether `err` is SurrealDB's optimistic-transaction conflict, which
/// succeeds on a plain re-run.
fn is_write_conflict(err: &surrealdb::Error) -> bool {
    err.to_string().contains("can be retried")
}

/// Linear backoff with a little jitter so contending writers spread out.
fn conflict_backoff(attempt: u32) -> Duration {
    let jitter = (uuid::Uuid::new_v4().as_u128() % 8) as u64;
    Duration::from_millis(2 * attempt as u64 + jitter)
}

/// Run `op` again while it fails with a write conflict, up to
/// [`MAX_WRITE_ATTEMPTS`] times. Any other error is returned as is.
async fn retry_on_conflict<T, F, Fut>(mut op: F) -> surrealdb::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = surrealdb::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if is_write_conflict(&err) && attempt < MAX_WRITE_ATTEMPTS => {
                debug!("Write conflict on attempt {}, retrying", attempt);
                tokio::time::sleep(conflict_backoff(attempt)).await;
                attempt += 1;
            }
            Err(err) if is_write_conflict(&err) => {
                warn!("Write still conflicting after {} attempts", attempt);
                return Err(err);
            }
            other => return other,
        }
    }
}

/// SurrealDB-backed user store.
pub struct SurrealUserStore {
    db: Db,
}

impl SurrealUserStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Allocate the next integer user key.
    ///
    /// Every allocation writes the same sequence record, so concurrent
    /// allocations conflict and are re-run until each gets its own value.
    async fn next_id(&self) -> Result<i64> {
        let id = retry_on_conflict(move || self.bump_sequence()).await?;
        id.ok_or_else(|| anyhow::anyhow!("Failed to allocate user id"))
    }

    async fn bump_sequence(&self) -> surrealdb::Result<Option<i64>> {
        let mut res = self
            .db
            .query("UPSERT user_sequence:users SET last_id += 1 RETURN VALUE last_id")
            .await?;

        res.take(0)
    }

    async fn insert(&self, id: i64, create: &UserCreate) -> surrealdb::Result<()> {
        let query = r#"
            CREATE type::thing('user', $id) CONTENT {
                email: $email,
                name: $name,
                picture: $picture,
                external_id: $external_id,
                provider: $provider
            } RETURN NONE
        "#;

        self.db
            .query(query)
            .bind(("id", id))
            .bind(("email", create.email.clone()))
            .bind(("name", create.name.clone()))
            .bind(("picture", create.picture.clone()))
            .bind(("external_id", create.external_id.clone()))
            .bind(("provider", create.provider.clone()))
            .await?
            .check()?;

        Ok(())
    }

    async fn select_one(&self, filter: &str, key: &'static str, value: String) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {} FROM user WHERE {} LIMIT 1", USER_PROJECTION, filter);

        let mut res = self.db.query(query).bind((key, value)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// List users ordered by id.
    pub async fn list(&self, limit: u32) -> Result<Vec<UserRecord>> {
        let query = format!("SELECT {} FROM user ORDER BY id LIMIT $limit", USER_PROJECTION);

        let mut res = self.db.query(query).bind(("limit", limit)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users)
    }
}

#[async_trait]
impl UserStore for SurrealUserStore {
    async fn find_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<UserRecord>> {
        self.select_one(
            "external_id = $external_id",
            "external_id",
            external_id.to_string(),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.select_one("email = $email", "email", email.to_string())
            .await
    }

    async fn get(&self, id: i64) -> Result<Option<UserRecord>> {
        let query = format!(
            "SELECT {} FROM type::thing('user', $id)",
            USER_PROJECTION
        );

        let mut res = self.db.query(query).bind(("id", id)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    async fn create(&self, create: &UserCreate) -> Result<UserRecord> {
        let id = self.next_id().await?;

        // A conflicting write is re-run; a unique-index violation is not, and
        // reaches the caller as the create error.
        retry_on_conflict(move || self.insert(id, create)).await?;

        debug!("Created user {} for {}", id, create.email);

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))
    }

    async fn link_external_id(
        &self,
        id: i64,
        external_id: &ExternalUserId,
        provider: &ProviderTag,
    ) -> Result<UserRecord> {
        let query = r#"
            UPDATE type::thing('user', $id) SET
                external_id = $external_id,
                provider = $provider
            RETURN NONE
        "#;

        retry_on_conflict(move || async move {
            self.db
                .query(query)
                .bind(("id", id))
                .bind(("external_id", external_id.to_string()))
                .bind(("provider", provider.to_string()))
                .await?
                .check()
        })
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} disappeared during update", id))
    }
}
