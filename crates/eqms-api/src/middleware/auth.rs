//! Session authentication middleware
//!
//! Extracts the session JWT from the `session_token` cookie or an
//! `Authorization: Bearer` header, validates it and resolves the caller
//! against the mirrored user table. The resolved [`AuthUser`] is made
//! available to handlers as an Axum extension.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use eqms_auth::JwtClaims;
use eqms_control::Actor;
use eqms_db::entities::{user, user_profile};
use eqms_db::UserRole;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Name of the HttpOnly cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// Authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    /// Role from the user's profile
    pub role: UserRole,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::user(self.user_id, self.role)
    }
}

/// Find the session token in the cookie (preferred) or the Authorization header
pub fn extract_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(|c| c.trim())
                .find_map(|c| c.strip_prefix("session_token="))
        });

    if let Some(token) = from_cookie {
        return Ok(token.to_string());
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Missing authentication token (cookie or Authorization header)".to_string(),
            )
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Invalid Authorization header format. Expected 'Bearer <token>'".to_string(),
            )
        })
}

/// Map validated claims to a user record, creating the mirror on first sight
///
/// The role stored in the user's profile wins over the role in the token.
pub async fn resolve_session(
    db: &DatabaseConnection,
    claims: &JwtClaims,
) -> Result<AuthUser, ApiError> {
    if !claims.is_session() {
        return Err(ApiError::Unauthorized(format!(
            "Invalid token type '{}'. Expected 'session' token for API access",
            claims.token_type.as_deref().unwrap_or("none")
        )));
    }

    let user_id = claims
        .user_id
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("Token missing 'user_id' claim".to_string()))?;
    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| ApiError::Unauthorized("Token 'user_id' is not a UUID".to_string()))?;

    let claimed_role = claims
        .user_role
        .as_deref()
        .and_then(|r| r.parse::<UserRole>().ok())
        .unwrap_or(UserRole::User);

    let found = user::Entity::find_by_id(user_id)
        .find_also_related(user_profile::Entity)
        .one(db)
        .await?;

    let (account, profile) = match found {
        Some(pair) => pair,
        None => {
            let email = claims.email.clone().ok_or_else(|| {
                ApiError::Unauthorized("Unknown user and token carries no email".to_string())
            })?;
            let (account, profile) = provision_user(db, user_id, email, claimed_role).await?;
            (account, Some(profile))
        }
    };

    if !account.is_active {
        return Err(ApiError::Forbidden("Account is disabled".to_string()));
    }

    let role = profile.map(|p| p.role).unwrap_or(claimed_role);

    Ok(AuthUser {
        user_id: account.id,
        email: account.email,
        role,
    })
}

async fn provision_user(
    db: &DatabaseConnection,
    user_id: Uuid,
    email: String,
    role: UserRole,
) -> Result<(user::Model, user_profile::Model), ApiError> {
    let now = Utc::now();

    let account = user::ActiveModel {
        id: Set(user_id),
        email: Set(email),
        is_active: Set(true),
        created_at: Set(now),
        last_sign_in_at: Set(Some(now)),
    }
    .insert(db)
    .await?;

    let profile = user_profile::ActiveModel {
        user_id: Set(user_id),
        full_name: Set(None),
        role: Set(role),
        phone: Set(None),
        sbu_id: Set(None),
        avatar_url: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(user_id = %user_id, role = %role, "Provisioned user from session token");

    Ok((account, profile))
}

/// Authentication middleware for protected routes
///
/// # Errors
/// Returns 401 Unauthorized if:
/// - Both cookie and Authorization header are missing
/// - Token is malformed, invalid or expired
/// - Token type is not "session" or `user_id` is missing
///
/// Returns 403 Forbidden if the account is disabled.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())?;

    let claims = state
        .jwt
        .validate(&token)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid or expired token: {}", e)))?;

    let auth_user = resolve_session(&state.db, &claims).await?;
    debug!(user_id = %auth_user.user_id, role = %auth_user.role, "Authenticated request");

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
