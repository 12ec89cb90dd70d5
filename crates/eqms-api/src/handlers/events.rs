use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::middleware::AuthUser;
use crate::AppState;

/// Stream ticket change events
///
/// Each event names the ticket and its new status; clients refetch whatever
/// they display. Events missed by a slow client are skipped.
#[utoipa::path(
    get,
    path = "/api/tickets/events",
    responses(
        (status = 200, description = "Server-Sent Events stream of ticket changes", content_type = "text/event-stream", body = eqms_control::TicketEvent)
    ),
    tag = "tickets"
)]
pub async fn ticket_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!(user_id = %auth.user_id, "Event stream opened");

    let receiver = state.events().subscribe();

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let kind = match event.kind {
                        eqms_control::TicketEventKind::Created => "created",
                        eqms_control::TicketEventKind::Updated => "updated",
                        eqms_control::TicketEventKind::Deleted => "deleted",
                    };
                    let item = Event::default().event(kind).json_data(&event);
                    return Some((item, receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged, skipping missed events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
