//! visitlog - blog API back end with privacy-preserving visit tracking
//!
//! Serves the public article API and the admin dashboard statistics:
//! - Visit logging with salted, hashed client addresses
//! - Per-article view counters
//! - Daily and rolling visit aggregates

mod config;
mod db;
mod error;
mod stats;
mod tracking;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // Missing salt or admin token is fatal here
    let config = config::Config::load()?;
    init_logging(&config.logging.level);
    info!("Starting visitlog...");

    let db = db::Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    // All tracking writes go through this task; the sender lives in the app state
    let (write_tx, writer) = db::start_write_buffer(db.clone());

    let state = Arc::new(web::AppState::new(&config, db.clone(), write_tx));
    web::start_server(&config, state).await?;

    // Router is gone, so the writer sees a closed channel and flushes what is left
    writer.await?;
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}
