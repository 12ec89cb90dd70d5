use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use eqms_control::Action;
use eqms_db::entities::{sbu, user, user_profile};
use eqms_db::UserRole;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{non_blank, require};
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

async fn ensure_sbu(db: &DatabaseConnection, sbu_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(id) = sbu_id {
        if sbu::Entity::find_by_id(id).one(db).await?.is_none() {
            return Err(ApiError::NotFound(format!("SBU '{}' not found", id)));
        }
    }
    Ok(())
}

/// List users with their profiles
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Users ordered by email", body = UserList),
        (status = 403, description = "Not permitted", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<UserList>> {
    require(&auth, Action::ViewUsers)?;

    let users: Vec<User> = user::Entity::find()
        .find_also_related(user_profile::Entity)
        .order_by_asc(user::Column::Email)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(account, profile)| User::from_models(account, profile))
        .collect();

    Ok(Json(UserList {
        total: users.len(),
        users,
    }))
}

/// Search users by email or name, role and SBU
#[utoipa::path(
    get,
    path = "/api/users/search",
    params(
        ("q" = Option<String>, Query, description = "Substring of email or full name"),
        ("role" = Option<UserRole>, Query, description = "Filter by role"),
        ("sbu_id" = Option<Uuid>, Query, description = "Filter by SBU affiliation")
    ),
    responses(
        (status = 200, description = "Matching users", body = UserList),
        (status = 403, description = "Not permitted", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<UserSearchQuery>,
) -> ApiResult<Json<UserList>> {
    require(&auth, Action::ViewUsers)?;

    let mut condition = Condition::all();

    if let Some(q) = non_blank(query.q) {
        condition = condition.add(
            Condition::any()
                .add(user::Column::Email.contains(&q))
                .add(user_profile::Column::FullName.contains(&q)),
        );
    }
    if let Some(role) = query.role {
        condition = condition.add(user_profile::Column::Role.eq(role));
    }
    if let Some(sbu_id) = query.sbu_id {
        condition = condition.add(user_profile::Column::SbuId.eq(sbu_id));
    }

    let users: Vec<User> = user::Entity::find()
        .find_also_related(user_profile::Entity)
        .filter(condition)
        .order_by_asc(user::Column::Email)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(account, profile)| User::from_models(account, profile))
        .collect();

    Ok(Json(UserList {
        total: users.len(),
        users,
    }))
}

/// Pre-provision a user
///
/// The account is matched to the auth provider's identity by its ID on
/// first sign-in.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require(&auth, Action::ManageUsers)?;

    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::BadRequest(format!(
            "'{}' is not an email address",
            req.email
        )));
    }
    ensure_sbu(&state.db, req.sbu_id).await?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let txn = state.db.begin().await?;

    let account = user::ActiveModel {
        id: Set(id),
        email: Set(email),
        is_active: Set(true),
        created_at: Set(now),
        last_sign_in_at: Set(None),
    }
    .insert(&txn)
    .await?;

    let profile = user_profile::ActiveModel {
        user_id: Set(id),
        full_name: Set(non_blank(req.full_name)),
        role: Set(req.role),
        phone: Set(non_blank(req.phone)),
        sbu_id: Set(req.sbu_id),
        avatar_url: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(user_id = %id, role = %profile.role, "User created");

    Ok((
        StatusCode::CREATED,
        Json(User::from_models(account, Some(profile))),
    ))
}

/// Update a user's profile or account status
///
/// Users may edit their own name, phone and avatar; everything else
/// requires user management rights.
#[utoipa::path(
    put,
    path = "/api/users",
    params(
        ("id" = Uuid, Query, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "User or SBU not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let self_service =
        id == auth.user_id && req.role.is_none() && req.is_active.is_none() && req.sbu_id.is_none();
    if !self_service {
        require(&auth, Action::ManageUsers)?;
    }

    let (account, profile) = user::Entity::find_by_id(id)
        .find_also_related(user_profile::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", id)))?;

    ensure_sbu(&state.db, req.sbu_id).await?;

    let now = Utc::now();
    let txn = state.db.begin().await?;

    let account = match req.is_active {
        Some(is_active) if is_active != account.is_active => {
            let mut active: user::ActiveModel = account.into();
            active.is_active = Set(is_active);
            active.update(&txn).await?
        }
        _ => account,
    };

    let is_new_profile = profile.is_none();
    let mut active = match profile {
        Some(profile) => user_profile::ActiveModel::from(profile),
        None => user_profile::ActiveModel {
            user_id: Set(id),
            full_name: Set(None),
            role: Set(UserRole::User),
            phone: Set(None),
            sbu_id: Set(None),
            avatar_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        },
    };

    if let Some(role) = req.role {
        active.role = Set(role);
    }
    if let Some(full_name) = req.full_name {
        active.full_name = Set(non_blank(Some(full_name)));
    }
    if let Some(phone) = req.phone {
        active.phone = Set(non_blank(Some(phone)));
    }
    if let Some(sbu_id) = req.sbu_id {
        active.sbu_id = Set(Some(sbu_id));
    }
    if let Some(avatar_url) = req.avatar_url {
        active.avatar_url = Set(non_blank(Some(avatar_url)));
    }
    active.updated_at = Set(now);

    let profile = if is_new_profile {
        active.insert(&txn).await?
    } else {
        active.update(&txn).await?
    };

    txn.commit().await?;

    info!(user_id = %id, role = %profile.role, active = account.is_active, "User updated");

    Ok(Json(User::from_models(account, Some(profile))))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/users",
    params(
        ("id" = Uuid, Query, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::ManageUsers)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    let result = user::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound(format!("User '{}' not found", id)));
    }

    info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
