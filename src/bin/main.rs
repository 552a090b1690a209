use anyhow::Result;
use clap::{Parser, Subcommand};
use identity_gateway::{
    DatabaseConfig, GatewayConfig, SurrealUserStore, UserCreate, UserStore, create_app_state,
    create_router, google_from_parts,
};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "identity-gateway")]
#[command(about = "Google sign-in gateway issuing bearer tokens")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(short, long, env = "PORT", default_value = "1000")]
        port: u16,
        #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
        bind_host: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
        /// HMAC secret for access tokens
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
        #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = 24)]
        token_ttl_hours: i64,
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        google_client_id: Option<String>,
        #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
        google_client_secret: Option<String>,
        /// Callback URL registered with Google, e.g. http://localhost:1000/auth/callback
        #[arg(long, env = "GOOGLE_REDIRECT_URL")]
        google_redirect_url: Option<String>,
        /// Timeout for each call to the provider
        #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 10)]
        provider_timeout_secs: u64,
        /// Accept each OAuth state only once, and only if this process issued it
        #[arg(long, env = "SINGLE_USE_STATE", default_value_t = true, action = clap::ArgAction::Set)]
        single_use_state: bool,
    },
    /// Initialize the database
    Init {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Pre-provision an account that a later Google login with the same email links to
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// List users
    ListUsers {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("identity_gateway=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            bind_host,
            db_url,
            jwt_secret,
            token_ttl_hours,
            google_client_id,
            google_client_secret,
            google_redirect_url,
            provider_timeout_secs,
            single_use_state,
        } => {
            if jwt_secret.is_empty() {
                anyhow::bail!("JWT_SECRET must not be empty");
            }

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for server: {}", db_config.url);

            let oauth = google_from_parts(google_client_id, google_client_secret, google_redirect_url)?
                .map(|c| c.with_timeout(Duration::from_secs(provider_timeout_secs)));

            let state = create_app_state(GatewayConfig {
                database: db_config,
                jwt_secret: SecretString::new(jwt_secret.into_boxed_str()),
                token_ttl: chrono::Duration::hours(token_ttl_hours),
                oauth,
                single_use_state,
            })
            .await?;

            let app = create_router(state);

            let bind = format!("{}:{}", bind_host, port);
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Server listening on http://{}", bind);

            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for initialization: {}", db_config.url);

            info!("Initializing database...");
            let db = identity_gateway::create_connection(db_config).await?;
            identity_gateway::ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateUser {
            email,
            name,
            db_url,
        } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let db = identity_gateway::create_connection(db_config).await?;
            identity_gateway::ensure_schema(&db).await?;

            let store = SurrealUserStore::new(db);
            if store.find_by_email(&email).await?.is_some() {
                println!("A user with email '{}' already exists.", email);
                return Ok(());
            }

            let user = store
                .create(&UserCreate {
                    email,
                    name,
                    ..Default::default()
                })
                .await?;

            println!("User created successfully!");
            println!();
            println!("  Id:    {}", user.id);
            println!("  Email: {}", user.email);
            if let Some(n) = &user.name {
                println!("  Name:  {}", n);
            }
            println!();
            println!("The account is linked on the first Google login with this email.");
        }
        Commands::ListUsers { limit, db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let db = identity_gateway::create_connection(db_config).await?;
            identity_gateway::ensure_schema(&db).await?;

            let users = SurrealUserStore::new(db).list(limit).await?;

            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            println!(
                "{:<8} {:<32} {:<24} {:<10} {:<25}",
                "ID", "EMAIL", "NAME", "PROVIDER", "CREATED"
            );
            println!("{}", "-".repeat(100));

            for user in users {
                let name = user.name.unwrap_or_else(|| "-".to_string());
                let provider = user.provider.unwrap_or_else(|| "-".to_string());
                let created = user
                    .created_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "-".to_string());

                println!(
                    "{:<8} {:<32} {:<24} {:<10} {:<25}",
                    user.id, user.email, name, provider, created
                );
            }
        }
    }

    Ok(())
}
