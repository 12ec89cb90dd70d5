use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use eqms_control::Action;
use eqms_db::entities::{sbu, sla_config};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
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

fn validate_minutes(sla_time: i32) -> ApiResult<()> {
    if sla_time < 0 {
        return Err(ApiError::BadRequest(
            "sla_time must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_threshold(warning_threshold: i32) -> ApiResult<()> {
    if warning_threshold < 0 {
        return Err(ApiError::BadRequest(
            "warning_threshold must not be negative".to_string(),
        ));
    }
    Ok(())
}

async fn find_config(db: &DatabaseConnection, id: Uuid) -> ApiResult<sla_config::Model> {
    sla_config::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("SLA config '{}' not found", id)))
}

async fn with_sbu(db: &DatabaseConnection, config: sla_config::Model) -> ApiResult<SlaConfig> {
    let unit = sbu::Entity::find_by_id(config.sbu_id).one(db).await?;
    Ok(SlaConfig::from_model(config, unit))
}

/// List SLA configs
#[utoipa::path(
    get,
    path = "/api/sla-configs",
    params(
        ("sbu_id" = Option<Uuid>, Query, description = "Only configs for this SBU")
    ),
    responses(
        (status = 200, description = "SLA configs", body = SlaConfigList),
        (status = 403, description = "Not permitted", body = ErrorResponse)
    ),
    tag = "sla"
)]
pub async fn list_sla_configs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<SlaConfigQuery>,
) -> ApiResult<Json<SlaConfigList>> {
    require(&auth, Action::ViewSlaConfigs)?;

    let mut select = sla_config::Entity::find().find_also_related(sbu::Entity);
    if let Some(sbu_id) = query.sbu_id {
        select = select.filter(sla_config::Column::SbuId.eq(sbu_id));
    }

    let configs: Vec<SlaConfig> = select
        .order_by_asc(sla_config::Column::SbuId)
        .order_by_asc(sla_config::Column::CreatedAt)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(config, unit)| SlaConfig::from_model(config, unit))
        .collect();

    Ok(Json(SlaConfigList {
        total: configs.len(),
        configs,
    }))
}

/// Create an SLA config
///
/// At most one config exists per SBU and status; a duplicate is a conflict.
#[utoipa::path(
    post,
    path = "/api/sla-configs",
    request_body = CreateSlaConfigRequest,
    responses(
        (status = 201, description = "SLA config created", body = SlaConfig),
        (status = 400, description = "Invalid values", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "SBU not found", body = ErrorResponse),
        (status = 409, description = "A config for this SBU and status exists", body = ErrorResponse)
    ),
    tag = "sla"
)]
pub async fn create_sla_config(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateSlaConfigRequest>,
) -> ApiResult<(StatusCode, Json<SlaConfig>)> {
    require(&auth, Action::ManageSlaConfigs)?;

    validate_minutes(req.sla_time)?;
    let warning_threshold = req
        .warning_threshold
        .unwrap_or(sla_config::DEFAULT_WARNING_THRESHOLD_SECS);
    validate_threshold(warning_threshold)?;

    let unit = sbu::Entity::find_by_id(req.sbu_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("SBU '{}' not found", req.sbu_id)))?;

    let now = Utc::now();
    let created = sla_config::ActiveModel {
        id: Set(Uuid::new_v4()),
        sbu_id: Set(unit.id),
        ticket_status: Set(req.ticket_status),
        sla_time: Set(req.sla_time),
        warning_threshold: Set(warning_threshold),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::Conflict(format!(
            "An SLA config for status '{}' already exists in SBU '{}'",
            req.ticket_status, unit.name
        )),
        other => other,
    })?;

    info!(
        sbu_id = %created.sbu_id,
        status = %created.ticket_status,
        sla_time = created.sla_time,
        "SLA config created"
    );

    Ok((
        StatusCode::CREATED,
        Json(SlaConfig::from_model(created, Some(unit))),
    ))
}

/// Update an SLA config
#[utoipa::path(
    put,
    path = "/api/sla-configs",
    params(
        ("id" = Uuid, Query, description = "SLA config ID")
    ),
    request_body = UpdateSlaConfigRequest,
    responses(
        (status = 200, description = "Updated SLA config", body = SlaConfig),
        (status = 400, description = "Invalid values", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "SLA config not found", body = ErrorResponse),
        (status = 409, description = "A config for this SBU and status exists", body = ErrorResponse)
    ),
    tag = "sla"
)]
pub async fn update_sla_config(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
    Json(req): Json<UpdateSlaConfigRequest>,
) -> ApiResult<Json<SlaConfig>> {
    require(&auth, Action::ManageSlaConfigs)?;

    let existing = find_config(&state.db, id).await?;
    let mut active: sla_config::ActiveModel = existing.into();

    if let Some(status) = req.ticket_status {
        active.ticket_status = Set(status);
    }
    if let Some(sla_time) = req.sla_time {
        validate_minutes(sla_time)?;
        active.sla_time = Set(sla_time);
    }
    if let Some(threshold) = req.warning_threshold {
        validate_threshold(threshold)?;
        active.warning_threshold = Set(threshold);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!(config_id = %updated.id, sla_time = updated.sla_time, "SLA config updated");

    Ok(Json(with_sbu(&state.db, updated).await?))
}

/// Delete an SLA config
#[utoipa::path(
    delete,
    path = "/api/sla-configs",
    params(
        ("id" = Uuid, Query, description = "SLA config ID")
    ),
    responses(
        (status = 204, description = "SLA config deleted"),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "SLA config not found", body = ErrorResponse)
    ),
    tag = "sla"
)]
pub async fn delete_sla_config(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::ManageSlaConfigs)?;

    let existing = find_config(&state.db, id).await?;
    sla_config::Entity::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;

    info!(config_id = %id, "SLA config deleted");
    Ok(StatusCode::NO_CONTENT)
}
