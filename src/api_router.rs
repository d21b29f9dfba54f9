//! API Router
//!
//! Combines all API endpoints from the specialized modules into a unified
//! router.

use axum::{routing::get, Json, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::comments::configure_comments_routes())
        .merge(crate::notifications::configure_notifications_routes())
        .merge(crate::analytics::configure_analytics_routes())
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "DeskServer API" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
