//! Ticket comments: immutable after creation, with `@name` mentions resolved
//! once at creation time. Every new comment appends one ticket-history entry
//! and notifies the ticket creator and assignee (never the commenter).

pub mod mentions;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::directory::{self, PublicUser};
use crate::notifications::{create_notification, NotificationMetadata};
use crate::shared::enums::{NotificationType, UserRole};
use crate::shared::error::ApiError;
use crate::shared::schema::{comments, tickets, users};
use crate::shared::state::AppState;
use crate::tickets::{history_list, HistoryEntry, Ticket};

diesel::define_sql_function! { fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text }

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub mentions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub ticket: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub ticket: Uuid,
    pub user: Option<PublicUser>,
    pub content: String,
    pub mentions: Vec<PublicUser>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    pub message: String,
}

/// Resolve `@name` tokens to user ids by case-insensitive exact name match.
/// Unknown names are dropped; duplicates collapse to one reference.
fn resolve_mentions(conn: &mut PgConnection, content: &str) -> QueryResult<Vec<Uuid>> {
    let mut ids = Vec::new();
    for name in mentions::mention_names(content) {
        let found: Option<Uuid> = users::table
            .filter(lower(users::name).eq(name.to_lowercase()))
            .select(users::id)
            .first(conn)
            .optional()?;
        if let Some(id) = found {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

fn expand_comments(
    conn: &mut PgConnection,
    rows: Vec<Comment>,
) -> Result<Vec<CommentResponse>, ApiError> {
    let mut ids: Vec<Uuid> = Vec::new();
    for comment in &rows {
        ids.push(comment.author_id);
        ids.extend(comment.mentions.iter().copied());
    }
    ids.sort();
    ids.dedup();

    let refs = directory::load_user_refs(conn, ids)?;

    Ok(rows
        .into_iter()
        .map(|comment| CommentResponse {
            id: comment.id,
            ticket: comment.ticket_id,
            user: refs.get(&comment.author_id).cloned(),
            content: comment.content,
            mentions: comment
                .mentions
                .iter()
                .filter_map(|id| refs.get(id).cloned())
                .collect(),
            created_at: comment.created_at,
        })
        .collect())
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::missing_field("content"));
    }

    let mut conn = state.conn.get()?;
    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(req.ticket))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    let mention_ids = resolve_mentions(&mut conn, &req.content)?;
    let now = Utc::now();

    let comment = Comment {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        author_id: actor.id,
        content: req.content,
        mentions: mention_ids,
        created_at: now,
    };

    diesel::insert_into(comments::table)
        .values(&comment)
        .execute(&mut conn)?;

    let mut history = history_list(&ticket);
    history.push(HistoryEntry {
        action: "Comment Added".to_string(),
        performed_by: actor.id,
        details: "New comment added".to_string(),
        timestamp: now,
    });
    diesel::update(tickets::table.filter(tickets::id.eq(ticket.id)))
        .set((
            tickets::history.eq(serde_json::to_value(&history)?),
            tickets::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    if ticket.created_by != actor.id {
        create_notification(
            &state,
            ticket.created_by,
            ticket.id,
            NotificationType::TicketCommented,
            format!("{} commented on your ticket: {}", actor.name, ticket.title),
            NotificationMetadata {
                performed_by: Some(actor.name.clone()),
                ..Default::default()
            },
        )
        .await;
    }

    if let Some(assignee) = ticket.assigned_to {
        if assignee != actor.id {
            create_notification(
                &state,
                assignee,
                ticket.id,
                NotificationType::TicketCommented,
                format!("{} commented on ticket: {}", actor.name, ticket.title),
                NotificationMetadata {
                    performed_by: Some(actor.name.clone()),
                    ..Default::default()
                },
            )
            .await;
        }
    }

    let mut expanded = expand_comments(&mut conn, vec![comment])?;
    expanded
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::Internal("Comment expansion produced no result".to_string()))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    _actor: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let mut conn = state.conn.get()?;

    let rows: Vec<Comment> = comments::table
        .filter(comments::ticket_id.eq(ticket_id))
        .order(comments::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(expand_comments(&mut conn, rows)?))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Confirmation>, ApiError> {
    let mut conn = state.conn.get()?;

    let comment: Comment = comments::table
        .filter(comments::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    if comment.author_id != actor.id && actor.role != UserRole::Admin {
        return Err(ApiError::forbidden("Not authorized to delete this comment"));
    }

    diesel::delete(comments::table.filter(comments::id.eq(id))).execute(&mut conn)?;

    Ok(Json(Confirmation {
        message: "Comment deleted".to_string(),
    }))
}

pub fn configure_comments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/comments", post(create_comment))
        .route("/api/comments/:id", get(list_comments).delete(delete_comment))
}
