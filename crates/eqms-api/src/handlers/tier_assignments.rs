use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use eqms_control::Action;
use eqms_db::entities::{sbu, tier_assignment, user_profile};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::require;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

/// List tier assignments
#[utoipa::path(
    get,
    path = "/api/tier-assignments",
    params(
        ("sbu_id" = Option<Uuid>, Query, description = "Only assignments in this SBU"),
        ("user_id" = Option<Uuid>, Query, description = "Only assignments of this user")
    ),
    responses(
        (status = 200, description = "Tier assignments", body = TierAssignmentList),
        (status = 403, description = "Not permitted", body = ErrorResponse)
    ),
    tag = "tiers"
)]
pub async fn list_tier_assignments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<TierAssignmentQuery>,
) -> ApiResult<Json<TierAssignmentList>> {
    require(&auth, Action::ViewUsers)?;

    let mut select = tier_assignment::Entity::find();
    if let Some(sbu_id) = query.sbu_id {
        select = select.filter(tier_assignment::Column::SbuId.eq(sbu_id));
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(tier_assignment::Column::UserId.eq(user_id));
    }

    let assignments: Vec<TierAssignment> = select
        .order_by_asc(tier_assignment::Column::SbuId)
        .order_by_asc(tier_assignment::Column::Tier)
        .all(&state.db)
        .await?
        .into_iter()
        .map(TierAssignment::from)
        .collect();

    Ok(Json(TierAssignmentList {
        total: assignments.len(),
        assignments,
    }))
}

/// Place a user on an escalation tier in an SBU
///
/// Any existing assignment of the same user in the same SBU is replaced.
#[utoipa::path(
    post,
    path = "/api/tier-assignments",
    request_body = CreateTierAssignmentRequest,
    responses(
        (status = 201, description = "Tier assignment created", body = TierAssignment),
        (status = 400, description = "User cannot hold a tier", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "User or SBU not found", body = ErrorResponse)
    ),
    tag = "tiers"
)]
pub async fn create_tier_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTierAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<TierAssignment>)> {
    require(&auth, Action::ManageTierAssignments)?;

    let profile = user_profile::Entity::find_by_id(req.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", req.user_id)))?;
    if !profile.role.is_assignable() {
        return Err(ApiError::BadRequest(
            "Only agents and managers can hold an escalation tier".to_string(),
        ));
    }

    if sbu::Entity::find_by_id(req.sbu_id)
        .one(&state.db)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!("SBU '{}' not found", req.sbu_id)));
    }

    let txn = state.db.begin().await?;

    tier_assignment::Entity::delete_many()
        .filter(tier_assignment::Column::UserId.eq(req.user_id))
        .filter(tier_assignment::Column::SbuId.eq(req.sbu_id))
        .exec(&txn)
        .await?;

    let created = tier_assignment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(req.user_id),
        sbu_id: Set(req.sbu_id),
        tier: Set(req.tier),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(user_id = %created.user_id, sbu_id = %created.sbu_id, tier = %created.tier, "Tier assigned");

    Ok((StatusCode::CREATED, Json(TierAssignment::from(created))))
}

/// Remove a tier assignment
#[utoipa::path(
    delete,
    path = "/api/tier-assignments",
    params(
        ("id" = Uuid, Query, description = "Tier assignment ID")
    ),
    responses(
        (status = 204, description = "Tier assignment removed"),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Tier assignment not found", body = ErrorResponse)
    ),
    tag = "tiers"
)]
pub async fn delete_tier_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::ManageTierAssignments)?;

    let result = tier_assignment::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound(format!(
            "Tier assignment '{}' not found",
            id
        )));
    }

    info!(assignment_id = %id, "Tier assignment removed");
    Ok(StatusCode::NO_CONTENT)
}
