//! HTTP routes

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method},
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::db::Article;
use crate::error::AppError;
use crate::stats::{self, DashboardStats};
use crate::tracking::QualifiedVisit;

pub async fn index() -> Json<Value> {
    Json(json!({ "message": "Welcome to the blog API" }))
}

/// API: Published articles, newest first
pub async fn list_articles(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(state.db.list_published_articles().await?))
}

/// API: Single article. Qualifying GETs bump the view counter in the background;
/// HEAD is routed here too but never counts.
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(id): Path<Uuid>,
    qualified: Option<Extension<QualifiedVisit>>,
) -> Result<Json<Article>, AppError> {
    if method == Method::GET && qualified.is_some() {
        state.tracker.count_view(id);
    }

    state
        .db
        .get_article(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// API: Dashboard statistics (admin only)
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    require_admin(&headers, &state.admin_token)?;
    Ok(Json(stats::dashboard(&state.db, Utc::now()).await?))
}

fn require_admin(headers: &HeaderMap, admin_token: &str) -> Result<(), AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    // Compare digests so the check does not short-circuit on the first differing byte
    match token {
        Some(token) if Sha256::digest(token.as_bytes()) == Sha256::digest(admin_token.as_bytes()) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}
