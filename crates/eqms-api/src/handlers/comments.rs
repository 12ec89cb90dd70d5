use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use eqms_control::{Action, TicketEvent, TicketEventKind};
use eqms_db::entities::ticket_comment;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

/// List comments on a ticket
///
/// Internal comments are only returned to callers allowed to see them.
#[utoipa::path(
    get,
    path = "/api/tickets/{id}/comments",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Comments, oldest first", body = CommentList),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CommentList>> {
    let actor = auth.actor();
    let ticket = state.gateway.load(id).await?;
    let ownership = state.gateway.ownership(&actor, &ticket).await?;
    actor.require(Action::ViewTicket, ownership)?;

    let mut query = ticket_comment::Entity::find()
        .filter(ticket_comment::Column::TicketId.eq(ticket.id))
        .order_by_asc(ticket_comment::Column::CreatedAt);

    if !actor
        .authorize(Action::ViewInternalComments, ownership)
        .is_allowed()
    {
        query = query.filter(ticket_comment::Column::IsInternal.eq(false));
    }

    let comments: Vec<Comment> = query
        .all(&state.db)
        .await?
        .into_iter()
        .map(Comment::from)
        .collect();

    Ok(Json(CommentList {
        total: comments.len(),
        comments,
    }))
}

/// Add a comment to a ticket
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/comments",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty comment", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let actor = auth.actor();
    let ticket = state.gateway.load(id).await?;
    let ownership = state.gateway.ownership(&actor, &ticket).await?;

    actor.require(Action::CommentTicket, ownership)?;
    if req.is_internal {
        actor.require(Action::ViewInternalComments, ownership)?;
    }

    let body = req.body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Comment body is required".to_string()));
    }

    let comment = ticket_comment::ActiveModel {
        id: Set(Uuid::new_v4()),
        ticket_id: Set(ticket.id),
        author_id: Set(auth.user_id),
        body: Set(body.to_string()),
        is_internal: Set(req.is_internal),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    info!(ticket_id = %ticket.id, comment_id = %comment.id, internal = comment.is_internal, "Comment added");

    state.events().publish(TicketEvent::new(
        TicketEventKind::Updated,
        ticket.id,
        ticket.sbu_id,
        ticket.status,
    ));

    Ok((StatusCode::CREATED, Json(Comment::from(comment))))
}
