use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| "identity".to_string()),
            database: env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| "gateway".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Apply the user schema. Safe to run on every startup.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Users. `id` is an integer record key handed out by `user_sequence`.
        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS name ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS picture ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS external_id ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS provider ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user VALUE $before OR time::now();
         DEFINE FIELD IF NOT EXISTS updated_at ON TABLE user VALUE time::now();",

        // Uniqueness is the only guard against concurrent first logins.
        "DEFINE INDEX IF NOT EXISTS user_email ON TABLE user COLUMNS email UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_external_id ON TABLE user COLUMNS external_id UNIQUE;",

        "DEFINE TABLE IF NOT EXISTS user_sequence SCHEMALESS;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
