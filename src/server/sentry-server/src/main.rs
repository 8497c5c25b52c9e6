//! Sentry Server - Main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentry_api::{router, AppState};
use sentry_idgen::IdGenerator;
use sentry_keystore::KeyStore;
use sentry_store::{CredentialStore, MemoryCredentialStore};
use sentry_store_sqlite::SqliteCredentialStore;
use sentry_token::{TokenIssuer, TokenValidator};

#[derive(Parser)]
#[command(name = "sentry-server")]
#[command(about = "Nubster Sentry - Service-to-service authentication backend")]
#[command(version)]
struct Cli {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8300", env = "SENTRY_BIND_ADDRESS")]
    bind: String,

    /// Key repository directory (one subdirectory of PEM key pairs per epoch)
    #[arg(long, default_value = "keys", env = "SENTRY_KEYS_DIR")]
    keys_dir: String,

    /// Issuer identity stamped into minted tokens
    #[arg(long, default_value = "sessions", env = "SENTRY_ISSUER")]
    issuer: String,

    /// Additional trusted issuer identities; the server's own identity is
    /// always trusted
    #[arg(long = "trust", env = "SENTRY_TRUSTED_ISSUERS", value_delimiter = ',')]
    trusted: Vec<String>,

    /// Node id for identifier generation, unique per running instance
    #[arg(long, default_value = "0", env = "SENTRY_NODE_ID")]
    node_id: u16,

    /// Data directory for the credential database
    #[arg(long, default_value = "data", env = "SENTRY_DATA_DIR")]
    data_dir: String,

    /// Enable development mode (in-memory credential store)
    #[arg(long, env = "SENTRY_DEV_MODE")]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Sentry server...");

    if cli.dev {
        tracing::warn!("Development mode enabled - DO NOT USE IN PRODUCTION");
    }

    let key_store = Arc::new(KeyStore::load(&cli.keys_dir)?);
    if key_store.signing_key_id().is_none() {
        tracing::warn!(
            "no signing key in repository; this node can validate but not issue \
             until keys are provisioned"
        );
    }

    let ids = Arc::new(IdGenerator::new(cli.node_id)?);

    let credentials: Arc<dyn CredentialStore> = if cli.dev {
        Arc::new(MemoryCredentialStore::new())
    } else {
        Arc::new(SqliteCredentialStore::open(&cli.data_dir).await?)
    };

    let issuer = Arc::new(TokenIssuer::new(
        cli.issuer.clone(),
        Arc::clone(&key_store),
        Arc::clone(&ids),
    ));

    let mut trusted = cli.trusted;
    trusted.push(cli.issuer);
    let validator = Arc::new(TokenValidator::new(Arc::clone(&key_store), trusted));

    let app = router(AppState {
        issuer,
        validator,
        ids,
        key_store,
        credentials,
    });

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    tracing::info!("Sentry server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
}
