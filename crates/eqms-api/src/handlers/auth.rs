use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect},
    Extension,
};
use chrono::Utc;
use eqms_db::entities::{user, user_profile};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::{resolve_session, AuthUser, SESSION_COOKIE};
use crate::models::{AuthCallbackQuery, AuthConfig, User};
use crate::AppState;

/// Public authentication settings
#[utoipa::path(
    get,
    path = "/api/auth/config",
    responses(
        (status = 200, description = "Authentication configuration", body = AuthConfig)
    ),
    tag = "auth"
)]
pub async fn auth_config(State(state): State<Arc<AppState>>) -> Json<AuthConfig> {
    Json(AuthConfig {
        cookie_name: SESSION_COOKIE.to_string(),
        issuer: state.jwt_issuer.clone(),
    })
}

/// Redirect target for the auth provider
///
/// Validates the provider's session token, records the sign-in and stores
/// the token in an HttpOnly cookie before redirecting to the app root.
#[utoipa::path(
    get,
    path = "/api/auth/callback",
    params(
        ("token" = String, Query, description = "Session token issued by the auth provider")
    ),
    responses(
        (status = 303, description = "Session cookie set, redirecting to /"),
        (status = 401, description = "Invalid or expired token", body = crate::models::ErrorResponse),
        (status = 403, description = "Account disabled", body = crate::models::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthCallbackQuery>,
) -> ApiResult<impl IntoResponse> {
    let claims = state
        .jwt
        .validate(&query.token)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid or expired token: {}", e)))?;

    let auth_user = resolve_session(&state.db, &claims).await?;

    if let Some(account) = user::Entity::find_by_id(auth_user.user_id)
        .one(&state.db)
        .await?
    {
        let mut active: user::ActiveModel = account.into();
        active.last_sign_in_at = Set(Some(Utc::now()));
        active.update(&state.db).await?;
    }

    let max_age = (claims.expires_at() - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, query.token, max_age
    );

    info!(user_id = %auth_user.user_id, role = %auth_user.role, "User signed in");

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")))
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout() -> impl IntoResponse {
    debug!("Clearing session cookie");
    let cookie = format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    [(header::SET_COOKIE, cookie)]
}

/// Current user with profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Signed-in user", body = User),
        (status = 401, description = "Not authenticated", body = crate::models::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    let (account, profile) = user::Entity::find_by_id(auth.user_id)
        .find_also_related(user_profile::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(User::from_models(account, profile)))
}
