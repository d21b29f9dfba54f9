//! Authentication: registration, login, and the per-request actor extractor.
//!
//! Every core operation receives the acting user as an explicit
//! [`AuthenticatedUser`] parameter; there is no ambient session state.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::directory::{self, User};
use crate::shared::enums::UserRole;
use crate::shared::error::{ApiError, FieldError};
use crate::shared::schema::users;
use crate::shared::state::AppState;

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| {
            if auth.to_lowercase().starts_with("bearer ") {
                Some(auth[7..].to_string())
            } else {
                None
            }
        })
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

/// The acting user, resolved afresh from the datastore on every request so
/// that role changes and deactivation take effect immediately.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("No authentication token".to_string()))?;

        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?
        .claims;

        let mut conn = state.conn.get()?;
        let user = directory::find_user(&mut conn, claims.sub)?
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized("Account is disabled".to_string()));
        }

        Ok(AuthenticatedUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }
}

pub fn issue_token(user: &User, jwt: &JwtConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(jwt.expiry_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

impl UserView {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut details = Vec::new();
    if req.name.trim().is_empty() {
        details.push(FieldError {
            field: "name".to_string(),
            message: "Name is required".to_string(),
        });
    }
    if req.email.trim().is_empty() {
        details.push(FieldError {
            field: "email".to_string(),
            message: "Email is required".to_string(),
        });
    }
    if req.password.is_empty() {
        details.push(FieldError {
            field: "password".to_string(),
            message: "Password is required".to_string(),
        });
    }
    if !details.is_empty() {
        return Err(ApiError::Validation {
            message: "Validation failed".to_string(),
            details,
        });
    }

    let mut conn = state.conn.get()?;
    if directory::find_by_email(&mut conn, req.email.trim())?.is_some() {
        return Err(ApiError::invalid_field("email", "Email already registered"));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash: hash_password(&req.password)?,
        role: req.role.unwrap_or_default(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)?;

    log::info!("Registered {} ({})", user.name, user.role);

    let token = issue_token(&user, &state.config.jwt)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from_user(&user),
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut conn = state.conn.get()?;

    let user = directory::find_by_email(&mut conn, req.email.trim())?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = issue_token(&user, &state.config.jwt)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from_user(&user),
    }))
}

pub async fn me(actor: AuthenticatedUser) -> Json<UserView> {
    Json(UserView {
        id: actor.id,
        name: actor.name,
        email: actor.email,
        role: actor.role,
    })
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("hunter3!", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("hunter2!", "not-a-phc-string"));
    }

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
