//! Web server module

mod middleware;
mod routes;

use anyhow::Result;
use axum::{
    http::{HeaderName, HeaderValue},
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::info;

use crate::config::Config;
use crate::db::{Database, WriteSender};
use crate::tracking::Tracker;
use middleware::VisitTrackingLayer;

pub struct AppState {
    pub db: Database,
    pub tracker: Arc<Tracker>,
    pub admin_token: String,
}

impl AppState {
    pub fn new(config: &Config, db: Database, write_tx: WriteSender) -> Self {
        Self {
            db,
            tracker: Arc::new(Tracker::new(&config.tracking, write_tx)),
            admin_token: config.server.admin_token.clone(),
        }
    }
}

pub fn build_router(state: Arc<AppState>, uploads_dir: &str) -> Router {
    // Uploaded images are embedded cross-origin by the front end and are not tracked
    let uploads = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("cross-origin"),
        ))
        .service(ServeDir::new(uploads_dir));

    let api = Router::new()
        .route("/", get(routes::index))
        .route("/api/articles", get(routes::list_articles))
        .route("/api/articles/:id", get(routes::get_article))
        .route("/api/stats", get(routes::dashboard_stats))
        .layer(VisitTrackingLayer::new(state.tracker.clone()))
        .with_state(state);

    Router::new()
        .nest_service("/uploads", uploads)
        .merge(api)
        .layer(CorsLayer::permissive())
}

/// Serve until Ctrl-C or SIGTERM. Returns once in-flight requests have drained
/// and the router (with its tracking sender) has been dropped.
pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state, &config.server.uploads_dir);

    let addr = config.bind_addr();
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
