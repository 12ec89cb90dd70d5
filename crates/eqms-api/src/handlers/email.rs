use axum::{extract::State, http::StatusCode, Extension};
use eqms_control::{Action, TemplateContext};
use eqms_db::entities::{sbu, user_profile};
use sea_orm::EntityTrait;
use std::sync::Arc;
use tracing::info;

use super::require;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

/// Send a templated email about a ticket
///
/// The message is rendered and handed to the mailer in the background;
/// delivery failures are logged, not reported.
#[utoipa::path(
    post,
    path = "/api/email",
    request_body = SendEmailRequest,
    responses(
        (status = 202, description = "Email queued", body = EmailAccepted),
        (status = 400, description = "No recipients", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "email"
)]
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SendEmailRequest>,
) -> ApiResult<(StatusCode, Json<EmailAccepted>)> {
    require(&auth, Action::SendEmail)?;

    let to: Vec<String> = req
        .to
        .into_iter()
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .collect();
    if to.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one recipient is required".to_string(),
        ));
    }

    let ticket = state
        .gateway
        .load_visible(&auth.actor(), req.ticket_id)
        .await?;

    let sbu_name = sbu::Entity::find_by_id(ticket.sbu_id)
        .one(&state.db)
        .await?
        .map(|unit| unit.name);

    let assignee_name = match ticket.assigned_to {
        Some(assignee) => user_profile::Entity::find_by_id(assignee)
            .one(&state.db)
            .await?
            .and_then(|profile| profile.full_name),
        None => None,
    };

    let ctx = TemplateContext {
        ticket_id: ticket.id,
        title: ticket.title,
        status: ticket.status,
        priority: ticket.priority,
        sbu_name,
        assignee_name,
        resolution: ticket.resolution,
    };

    let queued = to.len();
    info!(ticket_id = %ctx.ticket_id, template = ?req.template, recipients = queued, "Queueing email");
    state.notifier().send_template(to, req.template, ctx);

    Ok((StatusCode::ACCEPTED, Json(EmailAccepted { queued })))
}
