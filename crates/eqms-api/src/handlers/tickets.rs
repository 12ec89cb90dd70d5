use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use eqms_control::{
    countdown, find_policy, NewTicket, PolicyTable, SlaCountdown, TicketDetails, TicketUpdate,
};
use eqms_db::entities::ticket;
use eqms_db::UserRole;
use sea_orm::{ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 200;

/// Attach live countdowns to a batch of tickets with one policy query
async fn with_sla(state: &AppState, tickets: Vec<ticket::Model>) -> ApiResult<Vec<Ticket>> {
    let sbu_ids: Vec<Uuid> = tickets
        .iter()
        .map(|t| t.sbu_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let policies = PolicyTable::load(&state.db, &sbu_ids).await?;
    let now = Utc::now();

    Ok(tickets
        .into_iter()
        .map(|t| {
            let sla = countdown(t.status, t.created_at, policies.get(t.sbu_id, t.status), now);
            Ticket::from_model(t, sla)
        })
        .collect())
}

async fn single_sla(state: &AppState, ticket: &ticket::Model) -> ApiResult<SlaCountdown> {
    let policy = find_policy(&state.db, ticket.sbu_id, ticket.status).await?;
    Ok(countdown(
        ticket.status,
        ticket.created_at,
        policy.as_ref(),
        Utc::now(),
    ))
}

async fn respond(state: &AppState, ticket: ticket::Model) -> ApiResult<Json<Ticket>> {
    let sla = single_sla(state, &ticket).await?;
    Ok(Json(Ticket::from_model(ticket, sla)))
}

/// List tickets visible to the caller
///
/// Agents see tickets assigned to them, end users the tickets they created,
/// managers and admins everything.
#[utoipa::path(
    get,
    path = "/api/tickets",
    params(
        ("status" = Option<eqms_db::TicketStatus>, Query, description = "Filter by status"),
        ("priority" = Option<eqms_db::TicketPriority>, Query, description = "Filter by priority"),
        ("sbu_id" = Option<Uuid>, Query, description = "Filter by SBU"),
        ("page" = Option<u64>, Query, description = "Zero-based page (default: 0)"),
        ("per_page" = Option<u64>, Query, description = "Page size (default: 50, max: 200)")
    ),
    responses(
        (status = 200, description = "Tickets visible to the caller", body = TicketList),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<TicketListQuery>,
) -> ApiResult<Json<TicketList>> {
    debug!("Listing tickets with filters: {:?}", query);

    let mut condition = Condition::all();

    match auth.role {
        UserRole::Admin | UserRole::Manager => {}
        UserRole::Agent => {
            condition = condition.add(ticket::Column::AssignedTo.eq(auth.user_id));
        }
        UserRole::User => {
            condition = condition.add(ticket::Column::CreatedBy.eq(auth.user_id));
        }
    }

    if let Some(status) = query.status {
        condition = condition.add(ticket::Column::Status.eq(status));
    }
    if let Some(priority) = query.priority {
        condition = condition.add(ticket::Column::Priority.eq(priority));
    }
    if let Some(sbu_id) = query.sbu_id {
        condition = condition.add(ticket::Column::SbuId.eq(sbu_id));
    }

    let page = query.page.unwrap_or(0);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let paginator = ticket::Entity::find()
        .filter(condition)
        .order_by_desc(ticket::Column::CreatedAt)
        .paginate(&state.db, per_page);

    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page).await?;

    Ok(Json(TicketList {
        tickets: with_sla(&state, rows).await?,
        total,
        page,
        per_page,
    }))
}

/// Get a ticket
#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Ticket", body = Ticket),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state.gateway.load_visible(&auth.actor(), id).await?;
    respond(&state, ticket).await
}

/// SLA countdown for a ticket
#[utoipa::path(
    get,
    path = "/api/tickets/{id}/sla",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Countdown computed now", body = TicketSla),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn get_ticket_sla(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TicketSla>> {
    let ticket = state.gateway.load_visible(&auth.actor(), id).await?;
    let sla = single_sla(&state, &ticket).await?;

    Ok(Json(TicketSla {
        ticket_id: ticket.id,
        status: ticket.status,
        display: sla.display(),
        escalates_to: ticket.status.next_escalation(),
        sla,
    }))
}

/// Create a ticket
#[utoipa::path(
    post,
    path = "/api/tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket created", body = Ticket),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 404, description = "SBU not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let created = state
        .gateway
        .create(
            &auth.actor(),
            NewTicket {
                title: req.title,
                description: req.description,
                priority: req.priority,
                sbu_id: req.sbu_id,
                card_number: super::non_blank(req.card_number),
                module: super::non_blank(req.module),
                account_number: super::non_blank(req.account_number),
                query_type: super::non_blank(req.query_type),
            },
        )
        .await?;

    let Json(ticket) = respond(&state, created).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Partially update a ticket
#[utoipa::path(
    put,
    path = "/api/tickets",
    params(
        ("id" = Uuid, Query, description = "Ticket ID")
    ),
    request_body = UpdateTicketRequest,
    responses(
        (status = 200, description = "Updated ticket", body = Ticket),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
    Json(req): Json<UpdateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    let actor = auth.actor();

    let details = TicketDetails {
        title: req.title,
        description: req.description,
        card_number: req.card_number,
        module: req.module,
        account_number: req.account_number,
        query_type: req.query_type,
    };
    let update = TicketUpdate {
        status: req.status,
        priority: req.priority,
        assignee: req.assigned_to,
        resolution: req.resolution,
    };

    if details.is_empty() && update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let ticket = state.gateway.edit(&actor, id, details, update).await?;
    respond(&state, ticket).await
}

/// Delete a ticket (admin only)
#[utoipa::path(
    delete,
    path = "/api/tickets",
    params(
        ("id" = Uuid, Query, description = "Ticket ID")
    ),
    responses(
        (status = 204, description = "Ticket deleted"),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(IdQuery { id }): Query<IdQuery>,
) -> ApiResult<StatusCode> {
    state.gateway.delete(&auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a ticket's status
#[utoipa::path(
    patch,
    path = "/api/tickets/status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated ticket", body = Ticket),
        (status = 400, description = "Invalid transition or missing resolution", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Ticket>> {
    let updated = state
        .gateway
        .update(
            &auth.actor(),
            req.ticket_id,
            TicketUpdate {
                status: Some(req.status),
                resolution: req.resolution,
                ..Default::default()
            },
        )
        .await?;

    respond(&state, updated).await
}

/// Change a ticket's priority
#[utoipa::path(
    put,
    path = "/api/tickets/priority",
    request_body = UpdatePriorityRequest,
    responses(
        (status = 200, description = "Updated ticket", body = Ticket),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn update_priority(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdatePriorityRequest>,
) -> ApiResult<Json<Ticket>> {
    let updated = state
        .gateway
        .update(
            &auth.actor(),
            req.ticket_id,
            TicketUpdate {
                priority: Some(req.priority),
                ..Default::default()
            },
        )
        .await?;

    respond(&state, updated).await
}

/// Escalate a ticket one tier
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/escalate",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Escalated ticket", body = Ticket),
        (status = 400, description = "Ticket cannot be escalated further", body = ErrorResponse),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn escalate_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ticket>> {
    let escalated = state.gateway.escalate(&auth.actor(), id).await?;
    respond(&state, escalated).await
}
