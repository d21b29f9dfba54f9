//! Notification records and the fire-and-forget dispatcher.
//!
//! Dispatch never propagates an error to the triggering mutation: a failed
//! write is logged, counted, and dropped. Delivery is at-most-once.

use axum::{
    extract::{Path, State},
    routing::{delete, get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::shared::enums::NotificationType;
use crate::shared::error::ApiError;
use crate::shared::schema::notifications;
use crate::shared::state::AppState;

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticket_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub read: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
}

/// Create a notification record for one recipient. Failures are swallowed so
/// the triggering ticket/comment mutation is never rolled back or blocked.
pub async fn create_notification(
    state: &AppState,
    recipient: Uuid,
    ticket_id: Uuid,
    kind: NotificationType,
    message: String,
    metadata: NotificationMetadata,
) {
    let row = Notification {
        id: Uuid::new_v4(),
        user_id: recipient,
        ticket_id,
        kind,
        message,
        read: false,
        metadata: serde_json::to_value(&metadata).unwrap_or_else(|_| serde_json::json!({})),
        created_at: Utc::now(),
    };

    let result = state.conn.get().map_err(|e| e.to_string()).and_then(|mut conn| {
        diesel::insert_into(notifications::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| e.to_string())
    });

    match result {
        Ok(_) => state.metrics.increment("notifications.sent").await,
        Err(e) => {
            log::error!(
                "Failed to create {} notification for {}: {}",
                kind,
                recipient,
                e
            );
            state.metrics.increment("notifications.failures").await;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    pub message: String,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
) -> Result<Json<NotificationList>, ApiError> {
    let mut conn = state.conn.get()?;

    let rows: Vec<Notification> = notifications::table
        .filter(notifications::user_id.eq(actor.id))
        .order(notifications::created_at.desc())
        .load(&mut conn)?;

    let unread_count: i64 = notifications::table
        .filter(notifications::user_id.eq(actor.id))
        .filter(notifications::read.eq(false))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(NotificationList {
        notifications: rows,
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Confirmation>, ApiError> {
    let mut conn = state.conn.get()?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(id))
            .filter(notifications::user_id.eq(actor.id)),
    )
    .set(notifications::read.eq(true))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(Json(Confirmation {
        message: "Notification marked as read".to_string(),
    }))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
) -> Result<Json<Confirmation>, ApiError> {
    let mut conn = state.conn.get()?;

    diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(actor.id))
            .filter(notifications::read.eq(false)),
    )
    .set(notifications::read.eq(true))
    .execute(&mut conn)?;

    Ok(Json(Confirmation {
        message: "All notifications marked as read".to_string(),
    }))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Confirmation>, ApiError> {
    let mut conn = state.conn.get()?;

    let deleted = diesel::delete(
        notifications::table
            .filter(notifications::id.eq(id))
            .filter(notifications::user_id.eq(actor.id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(Json(Confirmation {
        message: "Notification deleted".to_string(),
    }))
}

pub fn configure_notifications_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/mark-all-read", put(mark_all_read))
        .route("/api/notifications/:id/read", put(mark_read))
        .route("/api/notifications/:id", delete(delete_notification))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_skips_absent_fields() {
        let metadata = NotificationMetadata {
            performed_by: Some("Dana".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value, serde_json::json!({ "performed_by": "Dana" }));
    }

    #[test]
    fn test_metadata_status_change_shape() {
        let metadata = NotificationMetadata {
            old_status: Some("Open".to_string()),
            new_status: Some("Resolved".to_string()),
            performed_by: Some("Dana".to_string()),
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["old_status"], "Open");
        assert_eq!(value["new_status"], "Resolved");
    }
}
