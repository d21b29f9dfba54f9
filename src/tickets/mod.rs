//! Ticket lifecycle: creation with auto-priority and auto-assignment, role
//! scoped listing, assignment, status changes, and deletion. Every mutation
//! appends one history entry; status changes and assignments fan out to
//! notifications after the ticket write (mutate, persist, then notify).

pub mod assign;
pub mod priority;
pub mod sla;

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::directory::{self, PublicUser};
use crate::notifications::{create_notification, NotificationMetadata};
use crate::shared::enums::{NotificationType, TicketCategory, TicketPriority, TicketStatus, UserRole};
use crate::shared::error::ApiError;
use crate::shared::schema::tickets;
use crate::shared::state::AppState;

use self::sla::SlaState;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub sla_deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub attachments: serde_json::Value,
    pub history: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub path: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One append-only history record embedded in the ticket document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub performed_by: Uuid,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentUpload {
    pub filename: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTicketRequest {
    pub agent_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub sla_breach_only: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryView {
    pub action: String,
    pub performed_by: Option<PublicUser>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_by: Option<PublicUser>,
    pub assigned_to: Option<PublicUser>,
    pub sla_deadline: DateTime<Utc>,
    pub sla_state: SlaState,
    pub sla_breach: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    pub history: Vec<HistoryEntryView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct TicketPage {
    pub tickets: Vec<TicketResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    pub message: String,
}

/// Which tickets a role may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    CreatedBy(Uuid),
    AssignedTo(Uuid),
}

pub fn scope_for(role: UserRole, actor_id: Uuid) -> TicketScope {
    match role {
        UserRole::User => TicketScope::CreatedBy(actor_id),
        UserRole::Agent => TicketScope::AssignedTo(actor_id),
        UserRole::Admin => TicketScope::All,
    }
}

pub(crate) fn attachment_list(ticket: &Ticket) -> Vec<Attachment> {
    serde_json::from_value(ticket.attachments.clone()).unwrap_or_default()
}

pub(crate) fn history_list(ticket: &Ticket) -> Vec<HistoryEntry> {
    serde_json::from_value(ticket.history.clone()).unwrap_or_default()
}

fn to_response(
    ticket: Ticket,
    attachments: Vec<Attachment>,
    history: Vec<HistoryEntry>,
    refs: &HashMap<Uuid, PublicUser>,
    now: DateTime<Utc>,
) -> TicketResponse {
    TicketResponse {
        id: ticket.id,
        title: ticket.title,
        description: ticket.description,
        category: ticket.category,
        priority: ticket.priority,
        status: ticket.status,
        created_by: refs.get(&ticket.created_by).cloned(),
        assigned_to: ticket.assigned_to.and_then(|id| refs.get(&id).cloned()),
        sla_deadline: ticket.sla_deadline,
        sla_state: sla::sla_state(ticket.sla_deadline, ticket.status, now),
        sla_breach: sla::is_breached(ticket.sla_deadline, ticket.status, now),
        resolved_at: ticket.resolved_at,
        closed_at: ticket.closed_at,
        attachments,
        history: history
            .into_iter()
            .map(|entry| HistoryEntryView {
                action: entry.action,
                performed_by: refs.get(&entry.performed_by).cloned(),
                details: entry.details,
                timestamp: entry.timestamp,
            })
            .collect(),
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
    }
}

/// Expand creator/assignee/history-actor references for a page of tickets
/// with a single batched user lookup.
fn expand_tickets(
    conn: &mut PgConnection,
    rows: Vec<Ticket>,
    now: DateTime<Utc>,
) -> Result<Vec<TicketResponse>, ApiError> {
    let parsed: Vec<(Ticket, Vec<Attachment>, Vec<HistoryEntry>)> = rows
        .into_iter()
        .map(|t| {
            let attachments = attachment_list(&t);
            let history = history_list(&t);
            (t, attachments, history)
        })
        .collect();

    let mut ids: Vec<Uuid> = Vec::new();
    for (ticket, _, history) in &parsed {
        ids.push(ticket.created_by);
        if let Some(assignee) = ticket.assigned_to {
            ids.push(assignee);
        }
        for entry in history {
            ids.push(entry.performed_by);
        }
    }
    ids.sort();
    ids.dedup();

    let refs = directory::load_user_refs(conn, ids)?;

    Ok(parsed
        .into_iter()
        .map(|(ticket, attachments, history)| {
            to_response(ticket, attachments, history, &refs, now)
        })
        .collect())
}

fn expand_ticket(
    conn: &mut PgConnection,
    ticket: Ticket,
    now: DateTime<Utc>,
) -> Result<TicketResponse, ApiError> {
    let mut expanded = expand_tickets(conn, vec![ticket], now)?;
    expanded
        .pop()
        .ok_or_else(|| ApiError::Internal("Ticket expansion produced no result".to_string()))
}

fn load_ticket(conn: &mut PgConnection, id: Uuid) -> Result<Ticket, ApiError> {
    tickets::table
        .filter(tickets::id.eq(id))
        .first::<Ticket>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Ticket"))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::missing_field("title"));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::missing_field("description"));
    }

    let now = Utc::now();
    let detected = req
        .priority
        .unwrap_or_else(|| priority::classify(&req.title, &req.description));
    let deadline = sla::deadline(detected, now);
    let agent = assign::find_least_busy_agent(&state).await;

    let mut history = vec![HistoryEntry {
        action: "Created".to_string(),
        performed_by: actor.id,
        details: "Ticket created".to_string(),
        timestamp: now,
    }];
    if req.priority.is_none() && detected != TicketPriority::Low {
        history.push(HistoryEntry {
            action: "Auto-Prioritized".to_string(),
            performed_by: actor.id,
            details: format!("Priority automatically set to {} based on content", detected),
            timestamp: now,
        });
    }
    if let Some(agent) = &agent {
        history.push(HistoryEntry {
            action: "Auto-Assigned".to_string(),
            performed_by: actor.id,
            details: format!("Automatically assigned to {}", agent.name),
            timestamp: now,
        });
    }

    let attachments: Vec<Attachment> = req
        .attachments
        .into_iter()
        .map(|upload| Attachment {
            filename: upload.filename,
            path: upload.path,
            uploaded_at: now,
        })
        .collect();

    let ticket = Ticket {
        id: Uuid::new_v4(),
        title: req.title,
        description: req.description,
        category: req.category.unwrap_or_default(),
        priority: detected,
        status: TicketStatus::Open,
        created_by: actor.id,
        assigned_to: agent.as_ref().map(|a| a.id),
        sla_deadline: deadline,
        resolved_at: None,
        closed_at: None,
        attachments: serde_json::to_value(&attachments)?,
        history: serde_json::to_value(&history)?,
        created_at: now,
        updated_at: now,
    };

    let mut conn = state.conn.get()?;
    diesel::insert_into(tickets::table)
        .values(&ticket)
        .execute(&mut conn)?;

    Ok(Json(expand_ticket(&mut conn, ticket, now)?))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<TicketPage>, ApiError> {
    let mut conn = state.conn.get()?;
    let now = Utc::now();

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let build = || {
        let mut q = tickets::table.into_boxed();

        match scope_for(actor.role, actor.id) {
            TicketScope::All => {}
            TicketScope::CreatedBy(id) => q = q.filter(tickets::created_by.eq(id)),
            TicketScope::AssignedTo(id) => q = q.filter(tickets::assigned_to.eq(id)),
        }

        if let Some(status) = query.status {
            q = q.filter(tickets::status.eq(status));
        }
        if let Some(priority) = query.priority {
            q = q.filter(tickets::priority.eq(priority));
        }
        if let Some(category) = query.category {
            q = q.filter(tickets::category.eq(category));
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search);
            q = q.filter(
                tickets::title
                    .ilike(pattern.clone())
                    .or(tickets::description.ilike(pattern)),
            );
        }
        if let Some(from) = query.date_from {
            q = q.filter(tickets::created_at.ge(from));
        }
        if let Some(to) = query.date_to {
            q = q.filter(tickets::created_at.le(to));
        }
        if query.sla_breach_only.unwrap_or(false) {
            q = q
                .filter(tickets::sla_deadline.lt(now))
                .filter(tickets::status.ne(TicketStatus::Resolved))
                .filter(tickets::status.ne(TicketStatus::Closed));
        }
        q
    };

    let total: i64 = build().count().get_result(&mut conn)?;

    let descending = !matches!(query.sort_order.as_deref(), Some("asc"));
    let mut q = build();
    q = match query.sort_by.as_deref().unwrap_or("created_at") {
        "updated_at" => {
            if descending {
                q.order(tickets::updated_at.desc())
            } else {
                q.order(tickets::updated_at.asc())
            }
        }
        "title" => {
            if descending {
                q.order(tickets::title.desc())
            } else {
                q.order(tickets::title.asc())
            }
        }
        "priority" => {
            if descending {
                q.order(tickets::priority.desc())
            } else {
                q.order(tickets::priority.asc())
            }
        }
        "status" => {
            if descending {
                q.order(tickets::status.desc())
            } else {
                q.order(tickets::status.asc())
            }
        }
        "sla_deadline" => {
            if descending {
                q.order(tickets::sla_deadline.desc())
            } else {
                q.order(tickets::sla_deadline.asc())
            }
        }
        _ => {
            if descending {
                q.order(tickets::created_at.desc())
            } else {
                q.order(tickets::created_at.asc())
            }
        }
    };

    let rows: Vec<Ticket> = q.limit(limit).offset(offset).load(&mut conn)?;
    let tickets = expand_tickets(&mut conn, rows, now)?;

    Ok(Json(TicketPage {
        tickets,
        pagination: Pagination {
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        },
    }))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>, ApiError> {
    let mut conn = state.conn.get()?;
    let ticket = load_ticket(&mut conn, id)?;

    if actor.role == UserRole::User && ticket.created_by != actor.id {
        return Err(ApiError::forbidden("Not authorized to view this ticket"));
    }
    if actor.role == UserRole::Agent && ticket.assigned_to.is_some_and(|a| a != actor.id) {
        return Err(ApiError::forbidden("Not authorized to view this ticket"));
    }

    Ok(Json(expand_ticket(&mut conn, ticket, Utc::now())?))
}

pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTicketRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    if !matches!(actor.role, UserRole::Admin | UserRole::Agent) {
        return Err(ApiError::forbidden("Not authorized to assign tickets"));
    }

    let mut conn = state.conn.get()?;
    let ticket = load_ticket(&mut conn, id)?;

    let agent = match directory::find_user(&mut conn, req.agent_id)? {
        Some(user) if user.role == UserRole::Agent && user.is_active => user,
        _ => return Err(ApiError::InvalidAgent),
    };

    let now = Utc::now();
    let mut history = history_list(&ticket);
    history.push(HistoryEntry {
        action: "Assigned".to_string(),
        performed_by: actor.id,
        details: format!("Assigned to {}", agent.name),
        timestamp: now,
    });

    diesel::update(tickets::table.filter(tickets::id.eq(id)))
        .set((
            tickets::assigned_to.eq(Some(agent.id)),
            tickets::history.eq(serde_json::to_value(&history)?),
            tickets::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    create_notification(
        &state,
        agent.id,
        ticket.id,
        NotificationType::TicketAssigned,
        format!("You have been assigned to ticket: {}", ticket.title),
        NotificationMetadata {
            performed_by: Some(actor.name.clone()),
            ..Default::default()
        },
    )
    .await;

    let updated = load_ticket(&mut conn, id)?;
    Ok(Json(expand_ticket(&mut conn, updated, now)?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let mut conn = state.conn.get()?;
    let ticket = load_ticket(&mut conn, id)?;

    // An agent may only touch tickets assigned to them; admins may touch any.
    if actor.role == UserRole::Agent && ticket.assigned_to.is_some_and(|a| a != actor.id) {
        return Err(ApiError::forbidden("Not authorized to update this ticket"));
    }

    let old_status = ticket.status;
    let now = Utc::now();

    // Stamps are set independently; closing a never-resolved ticket leaves
    // resolved_at null.
    let resolved_at = if req.status == TicketStatus::Resolved {
        Some(now)
    } else {
        ticket.resolved_at
    };
    let closed_at = if req.status == TicketStatus::Closed {
        Some(now)
    } else {
        ticket.closed_at
    };

    let mut history = history_list(&ticket);
    history.push(HistoryEntry {
        action: "Status Updated".to_string(),
        performed_by: actor.id,
        details: format!("Status changed from {} to {}", old_status, req.status),
        timestamp: now,
    });

    diesel::update(tickets::table.filter(tickets::id.eq(id)))
        .set((
            tickets::status.eq(req.status),
            tickets::resolved_at.eq(resolved_at),
            tickets::closed_at.eq(closed_at),
            tickets::history.eq(serde_json::to_value(&history)?),
            tickets::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let message = format!(
        "Ticket \"{}\" status changed from {} to {}",
        ticket.title, old_status, req.status
    );
    let metadata = NotificationMetadata {
        old_status: Some(old_status.to_string()),
        new_status: Some(req.status.to_string()),
        performed_by: Some(actor.name.clone()),
    };

    create_notification(
        &state,
        ticket.created_by,
        ticket.id,
        NotificationType::TicketStatusChanged,
        message.clone(),
        metadata.clone(),
    )
    .await;

    if let Some(assignee) = ticket.assigned_to {
        if assignee != ticket.created_by {
            create_notification(
                &state,
                assignee,
                ticket.id,
                NotificationType::TicketStatusChanged,
                message,
                metadata,
            )
            .await;
        }
    }

    let updated = load_ticket(&mut conn, id)?;
    Ok(Json(expand_ticket(&mut conn, updated, now)?))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Confirmation>, ApiError> {
    if actor.role != UserRole::Admin {
        return Err(ApiError::forbidden("Not authorized to delete tickets"));
    }

    let mut conn = state.conn.get()?;
    let deleted = diesel::delete(tickets::table.filter(tickets::id.eq(id))).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::not_found("Ticket"));
    }

    Ok(Json(Confirmation {
        message: "Ticket deleted".to_string(),
    }))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/:id", get(get_ticket).delete(delete_ticket))
        .route("/api/tickets/:id/assign", put(assign_ticket))
        .route("/api/tickets/:id/status", put(update_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            title: "Printer on fire".to_string(),
            description: "It is actually on fire".to_string(),
            category: TicketCategory::Issue,
            priority: TicketPriority::High,
            status: TicketStatus::Open,
            created_by: Uuid::new_v4(),
            assigned_to: None,
            sla_deadline: sla::deadline(TicketPriority::High, now),
            resolved_at: None,
            closed_at: None,
            attachments: serde_json::json!([]),
            history: serde_json::json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_scope_per_role() {
        let actor = Uuid::new_v4();
        assert_eq!(scope_for(UserRole::User, actor), TicketScope::CreatedBy(actor));
        assert_eq!(scope_for(UserRole::Agent, actor), TicketScope::AssignedTo(actor));
        assert_eq!(scope_for(UserRole::Admin, actor), TicketScope::All);
    }

    #[test]
    fn test_history_round_trip() {
        let mut ticket = bare_ticket();
        let actor = Uuid::new_v4();
        let entries = vec![
            HistoryEntry {
                action: "Created".to_string(),
                performed_by: actor,
                details: "Ticket created".to_string(),
                timestamp: ticket.created_at,
            },
            HistoryEntry {
                action: "Auto-Prioritized".to_string(),
                performed_by: actor,
                details: "Priority automatically set to High based on content".to_string(),
                timestamp: ticket.created_at,
            },
        ];
        ticket.history = serde_json::to_value(&entries).unwrap();

        let parsed = history_list(&ticket);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].action, "Created");
        assert_eq!(parsed[1].action, "Auto-Prioritized");
    }

    #[test]
    fn test_history_tolerates_empty_document() {
        let ticket = bare_ticket();
        assert!(history_list(&ticket).is_empty());
        assert!(attachment_list(&ticket).is_empty());
    }

    #[test]
    fn test_to_response_derives_breach() {
        let mut ticket = bare_ticket();
        ticket.sla_deadline = ticket.created_at - chrono::Duration::hours(1);
        let refs = HashMap::new();
        let response = to_response(ticket, Vec::new(), Vec::new(), &refs, Utc::now());
        assert!(response.sla_breach);
        assert_eq!(response.sla_state, SlaState::Breach);
    }

    #[test]
    fn test_to_response_terminal_is_never_breached() {
        let mut ticket = bare_ticket();
        ticket.status = TicketStatus::Closed;
        ticket.sla_deadline = ticket.created_at - chrono::Duration::hours(1);
        let refs = HashMap::new();
        let response = to_response(ticket, Vec::new(), Vec::new(), &refs, Utc::now());
        assert!(!response.sla_breach);
        assert_eq!(response.sla_state, SlaState::Completed);
    }
}
