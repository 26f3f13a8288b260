mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use inkwell_api::{AppState, MemorySessionStore};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkwell=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Creates tables and seeds roles if absent
    let db = inkwell_db::Database::open(&config.db_path)?;

    // Sessions live in this process only; a restart logs everyone out.
    let sessions = Arc::new(MemorySessionStore::new());
    let state = AppState::new(db, sessions, config.settings);

    let app = inkwell_api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Inkwell listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
