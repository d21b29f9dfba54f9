//! Read-only rollups over the ticket collection, computed on demand.
//!
//! Breach counts re-scan non-terminal tickets against "now" at request time;
//! nothing here is cached or incrementally maintained.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::directory::{self, PublicUser};
use crate::shared::enums::{TicketCategory, TicketPriority, TicketStatus, UserRole};
use crate::shared::error::ApiError;
use crate::shared::schema::tickets;
use crate::shared::state::AppState;

#[derive(Debug, Serialize)]
pub struct Overview {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
}

#[derive(Debug, Serialize)]
pub struct SlaStats {
    pub breached: i64,
    pub on_time: i64,
    pub compliance_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub category: TicketCategory,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct PriorityCount {
    pub priority: TicketPriority,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AgentWorkload {
    pub agent: String,
    pub assigned: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub overview: Overview,
    pub sla: SlaStats,
    pub category_stats: Vec<CategoryCount>,
    pub priority_stats: Vec<PriorityCount>,
    pub agent_workload: Vec<AgentWorkload>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: TicketStatus,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub status_breakdown: Vec<StatusCount>,
}

#[derive(Debug, Serialize)]
pub struct AgentStats {
    pub total: i64,
    pub pending: i64,
    pub resolved: i64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MyStats {
    User(UserStats),
    Agent(AgentStats),
}

/// on-time = total - breached; totals include terminal tickets while the
/// breach scan does not, so the percentage is approximate by design.
pub fn compliance_percentage(total: i64, on_time: i64) -> f64 {
    if total > 0 {
        ((on_time as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    }
}

fn status_count(conn: &mut PgConnection, status: TicketStatus) -> QueryResult<i64> {
    tickets::table
        .filter(tickets::status.eq(status))
        .count()
        .get_result(conn)
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    if actor.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin access required"));
    }

    let mut conn = state.conn.get()?;
    let now = Utc::now();

    let total: i64 = tickets::table.count().get_result(&mut conn)?;
    let overview = Overview {
        total,
        open: status_count(&mut conn, TicketStatus::Open)?,
        in_progress: status_count(&mut conn, TicketStatus::InProgress)?,
        resolved: status_count(&mut conn, TicketStatus::Resolved)?,
        closed: status_count(&mut conn, TicketStatus::Closed)?,
    };

    let deadlines: Vec<DateTime<Utc>> = tickets::table
        .filter(tickets::status.ne(TicketStatus::Resolved))
        .filter(tickets::status.ne(TicketStatus::Closed))
        .select(tickets::sla_deadline)
        .load(&mut conn)?;
    let breached = deadlines.into_iter().filter(|deadline| now > *deadline).count() as i64;
    let on_time = total - breached;

    let category_stats: Vec<CategoryCount> = tickets::table
        .group_by(tickets::category)
        .select((tickets::category, count_star()))
        .load::<(TicketCategory, i64)>(&mut conn)?
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();

    let priority_stats: Vec<PriorityCount> = tickets::table
        .group_by(tickets::priority)
        .select((tickets::priority, count_star()))
        .load::<(TicketPriority, i64)>(&mut conn)?
        .into_iter()
        .map(|(priority, count)| PriorityCount { priority, count })
        .collect();

    let mut agent_workload = Vec::new();
    for agent in directory::agents(&mut conn)? {
        let assigned: i64 = tickets::table
            .filter(tickets::assigned_to.eq(agent.id))
            .filter(tickets::status.ne(TicketStatus::Resolved))
            .filter(tickets::status.ne(TicketStatus::Closed))
            .count()
            .get_result(&mut conn)?;
        agent_workload.push(AgentWorkload {
            agent: agent.name,
            assigned,
        });
    }

    Ok(Json(DashboardResponse {
        overview,
        sla: SlaStats {
            breached,
            on_time,
            compliance_percentage: compliance_percentage(total, on_time),
        },
        category_stats,
        priority_stats,
        agent_workload,
    }))
}

pub async fn my_stats(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
) -> Result<Json<MyStats>, ApiError> {
    let mut conn = state.conn.get()?;

    match actor.role {
        UserRole::User => {
            let total: i64 = tickets::table
                .filter(tickets::created_by.eq(actor.id))
                .count()
                .get_result(&mut conn)?;

            let status_breakdown: Vec<StatusCount> = tickets::table
                .filter(tickets::created_by.eq(actor.id))
                .group_by(tickets::status)
                .select((tickets::status, count_star()))
                .load::<(TicketStatus, i64)>(&mut conn)?
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect();

            Ok(Json(MyStats::User(UserStats {
                total,
                status_breakdown,
            })))
        }
        UserRole::Agent => {
            let total: i64 = tickets::table
                .filter(tickets::assigned_to.eq(actor.id))
                .count()
                .get_result(&mut conn)?;
            let pending: i64 = tickets::table
                .filter(tickets::assigned_to.eq(actor.id))
                .filter(tickets::status.ne(TicketStatus::Resolved))
                .filter(tickets::status.ne(TicketStatus::Closed))
                .count()
                .get_result(&mut conn)?;
            let resolved: i64 = tickets::table
                .filter(tickets::assigned_to.eq(actor.id))
                .filter(tickets::status.eq(TicketStatus::Resolved))
                .count()
                .get_result(&mut conn)?;

            Ok(Json(MyStats::Agent(AgentStats {
                total,
                pending,
                resolved,
            })))
        }
        UserRole::Admin => Err(ApiError::forbidden("Not available for admin")),
    }
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    if actor.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin access required"));
    }

    let mut conn = state.conn.get()?;
    let agents = directory::active_agents(&mut conn)?
        .iter()
        .map(|agent| agent.public())
        .collect();

    Ok(Json(agents))
}

pub async fn operational_metrics(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
) -> Result<Json<HashMap<String, f64>>, ApiError> {
    if actor.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin access required"));
    }

    Ok(Json(state.metrics.aggregates().await))
}

pub fn configure_analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/analytics/dashboard", get(dashboard))
        .route("/api/analytics/my-stats", get(my_stats))
        .route("/api/analytics/agents", get(list_agents))
        .route("/api/analytics/metrics", get(operational_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliance_percentage() {
        assert_eq!(compliance_percentage(0, 0), 0.0);
        assert_eq!(compliance_percentage(4, 4), 100.0);
        assert_eq!(compliance_percentage(3, 2), 66.67);
        assert_eq!(compliance_percentage(8, 6), 75.0);
    }

    #[test]
    fn test_my_stats_serializes_flat() {
        let stats = MyStats::Agent(AgentStats {
            total: 5,
            pending: 2,
            resolved: 3,
        });
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value, serde_json::json!({ "total": 5, "pending": 2, "resolved": 3 }));
    }
}
