use axum::{extract::State, Extension};
use chrono::Utc;
use eqms_control::{countdown, Action, PolicyTable, SlaCountdown};
use eqms_db::entities::ticket;
use sea_orm::EntityTrait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use super::require;
use crate::error::ApiResult;
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

/// Ticket counts by status and priority, with live SLA health
#[utoipa::path(
    get,
    path = "/api/analytics/summary",
    responses(
        (status = 200, description = "Ticket summary", body = AnalyticsSummary),
        (status = 403, description = "Not permitted", body = ErrorResponse)
    ),
    tag = "analytics"
)]
pub async fn analytics_summary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<AnalyticsSummary>> {
    require(&auth, Action::ViewAnalytics)?;

    let tickets = ticket::Entity::find().all(&state.db).await?;

    let sbu_ids: Vec<Uuid> = tickets
        .iter()
        .map(|t| t.sbu_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let policies = PolicyTable::load(&state.db, &sbu_ids).await?;
    let now = Utc::now();

    let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, u64> = BTreeMap::new();
    let mut breached = 0;
    let mut warning = 0;

    for t in &tickets {
        *by_status.entry(t.status.to_string()).or_default() += 1;
        *by_priority.entry(t.priority.to_string()).or_default() += 1;

        match countdown(t.status, t.created_at, policies.get(t.sbu_id, t.status), now) {
            SlaCountdown::Expired { .. } => breached += 1,
            SlaCountdown::Running { warning: true, .. } => warning += 1,
            SlaCountdown::Running { .. } | SlaCountdown::Paused | SlaCountdown::Unknown => {}
        }
    }

    Ok(Json(AnalyticsSummary {
        total: tickets.len() as u64,
        by_status,
        by_priority,
        breached,
        warning,
    }))
}
