use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use eqms_control::Action;
use eqms_db::entities::sbu;
use eqms_db::SbuStatus;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{non_blank, require};
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

fn require_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("SBU name is required".to_string()));
    }
    Ok(name.to_string())
}

/// List business units
#[utoipa::path(
    get,
    path = "/api/sbus",
    responses(
        (status = 200, description = "Business units ordered by name", body = SbuList)
    ),
    tag = "sbus"
)]
pub async fn list_sbus(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthUser>,
) -> ApiResult<Json<SbuList>> {
    let sbus: Vec<Sbu> = sbu::Entity::find()
        .order_by_asc(sbu::Column::Name)
        .all(&state.db)
        .await?
        .into_iter()
        .map(Sbu::from)
        .collect();

    Ok(Json(SbuList {
        total: sbus.len(),
        sbus,
    }))
}

/// Create a business unit
#[utoipa::path(
    post,
    path = "/api/sbus",
    request_body = CreateSbuRequest,
    responses(
        (status = 201, description = "SBU created", body = Sbu),
        (status = 400, description = "Missing name", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "sbus"
)]
pub async fn create_sbu(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateSbuRequest>,
) -> ApiResult<(StatusCode, Json<Sbu>)> {
    require(&auth, Action::ManageSbus)?;

    let now = Utc::now();
    let created = sbu::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(require_name(&req.name)?),
        description: Set(non_blank(req.description)),
        status: Set(req.status.unwrap_or(SbuStatus::Active)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    info!(sbu_id = %created.id, name = %created.name, "SBU created");

    Ok((StatusCode::CREATED, Json(Sbu::from(created))))
}

/// Update a business unit
#[utoipa::path(
    put,
    path = "/api/sbus",
    params(
        ("id" = Uuid, Query, description = "SBU ID")
    ),
    request_body = UpdateSbuRequest,
    responses(
        (status = 200, description = "Updated SBU", body = Sbu),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "SBU not found", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "sbus"
)]
pub async fn update_sbu(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
    Json(req): Json<UpdateSbuRequest>,
) -> ApiResult<Json<Sbu>> {
    require(&auth, Action::ManageSbus)?;

    let existing = sbu::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("SBU '{}' not found", id)))?;

    let mut active: sbu::ActiveModel = existing.into();
    if let Some(name) = req.name {
        active.name = Set(require_name(&name)?);
    }
    if let Some(description) = req.description {
        active.description = Set(non_blank(Some(description)));
    }
    if let Some(status) = req.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!(sbu_id = %updated.id, "SBU updated");

    Ok(Json(Sbu::from(updated)))
}

/// Delete a business unit
///
/// Fails with a conflict while tickets still reference the SBU.
#[utoipa::path(
    delete,
    path = "/api/sbus",
    params(
        ("id" = Uuid, Query, description = "SBU ID")
    ),
    responses(
        (status = 204, description = "SBU deleted"),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "SBU not found", body = ErrorResponse),
        (status = 409, description = "SBU still has tickets", body = ErrorResponse)
    ),
    tag = "sbus"
)]
pub async fn delete_sbu(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::ManageSbus)?;

    let result = sbu::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound(format!("SBU '{}' not found", id)));
    }

    info!(sbu_id = %id, "SBU deleted");
    Ok(StatusCode::NO_CONTENT)
}
