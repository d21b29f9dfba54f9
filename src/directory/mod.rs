//! User records and lookups shared by the ticket, comment, and analytics
//! handlers. The identity data itself is owned by the auth module; everything
//! here is read-only.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::shared::enums::UserRole;
use crate::shared::schema::users;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cross-reference view of a user embedded in ticket/comment responses.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

pub fn find_user(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<User>> {
    users::table.filter(users::id.eq(id)).first(conn).optional()
}

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .first(conn)
        .optional()
}

/// All agents, regardless of active flag. Used for workload reporting.
pub fn agents(conn: &mut PgConnection) -> QueryResult<Vec<User>> {
    users::table
        .filter(users::role.eq(UserRole::Agent))
        .load(conn)
}

/// Agents eligible for auto-assignment.
pub fn active_agents(conn: &mut PgConnection) -> QueryResult<Vec<User>> {
    users::table
        .filter(users::role.eq(UserRole::Agent))
        .filter(users::is_active.eq(true))
        .load(conn)
}

/// Batched lookup for expanding creator/assignee/actor references.
pub fn load_user_refs(
    conn: &mut PgConnection,
    ids: Vec<Uuid>,
) -> QueryResult<HashMap<Uuid, PublicUser>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<User> = users::table.filter(users::id.eq_any(ids)).load(conn)?;
    Ok(rows.into_iter().map(|u| (u.id, u.public())).collect())
}
