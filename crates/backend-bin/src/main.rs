// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the session server.
use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use sessionkeep_backend::{
    config::{LogSettings, Settings},
    create_router,
    mail::LogMailer,
    store::InMemoryUserStore,
    AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "sessionkeep-server", version, about = "Cookie-session authentication server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SESSIONKEEP_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// JSON file of users to seed the store with (overrides `server.users_file`)
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Address to listen on (overrides `server.bind_addr`)
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = Settings::load_from(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    init_tracing(&settings.log);

    let store = match args.users.as_ref().or(settings.server.users_file.as_ref()) {
        Some(path) => InMemoryUserStore::from_json_file(path, &settings.password.cost())
            .await
            .with_context(|| format!("seeding users from {}", path.display()))?,
        None => InMemoryUserStore::new(),
    };
    tracing::info!(users = store.len(), "user store ready");

    let addr = args.bind.unwrap_or(settings.server.bind_addr);
    let state = Arc::new(AppState::new(store, settings, Arc::new(LogMailer))?);
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
