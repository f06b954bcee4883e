//! Tenant Portal API Server
//!
//! Run with: cargo run --bin tenant-portal -- --config config.toml
//!
//! Without `--config` the server looks in the usual places (see
//! [`Config::load_default`]) and falls back to defaults. `PORTAL_*`
//! environment variables override file settings; `RUST_LOG` overrides the
//! configured log level.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tenant_portal::api::{serve, AppState};
use tenant_portal::auth::AuthDirectory;
use tenant_portal::config::{Config, LoggingConfig};
use tenant_portal::store::DocumentStore;

#[derive(Parser)]
#[command(name = "tenant-portal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-tenant portal backend")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "PORTAL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting tenant portal v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Data directory: {:?}", config.data_dir());

    let store = Arc::new(
        DocumentStore::open(config.store_config())
            .await
            .context("opening document store")?,
    );
    let flush_handle = store.start_background_flush();

    let auth = Arc::new(AuthDirectory::open(config.directory_config()).context("opening user directory")?);
    tracing::info!("Loaded {} user(s)", auth.user_count().await);

    match config.bootstrap_admin() {
        Some((email, token)) => {
            let admin = auth.ensure_bootstrap_admin(email, token).await?;
            tracing::info!(uid = %admin.uid, email = %admin.email, "Bootstrap super admin ready");
        }
        None => tracing::info!("No bootstrap admin configured (set PORTAL_ADMIN_EMAIL and PORTAL_ADMIN_TOKEN)"),
    }

    let server_config = config.server_config();
    let state = AppState::with_ws_config(
        Arc::clone(&store),
        auth,
        server_config.clone(),
        config.hub_config(),
    );

    tracing::info!("Starting server on {}", server_config.addr());
    serve(state, &server_config).await?;

    tracing::info!("Flushing document store...");
    store.shutdown().await?;
    flush_handle.abort();
    tracing::info!("Tenant portal stopped");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tenant_portal={},tower_http=debug", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
