//! Ticket change events
//!
//! Subscribers are expected to refetch whatever they display whenever an
//! event arrives; events carry just enough to decide whether to bother.

use chrono::{DateTime, Utc};
use eqms_db::TicketStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TicketEventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TicketEvent {
    pub kind: TicketEventKind,
    pub ticket_id: Uuid,
    pub sbu_id: Uuid,
    pub status: TicketStatus,
    pub at: DateTime<Utc>,
}

impl TicketEvent {
    pub fn new(kind: TicketEventKind, ticket_id: Uuid, sbu_id: Uuid, status: TicketStatus) -> Self {
        Self {
            kind,
            ticket_id,
            sbu_id,
            status,
            at: Utc::now(),
        }
    }
}

/// Fan-out of ticket change events to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TicketEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: TicketEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(receivers, "Published ticket event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = TicketEvent::new(
            TicketEventKind::Updated,
            Uuid::new_v4(),
            Uuid::new_v4(),
            TicketStatus::EscalatedTier1,
        );
        bus.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(TicketEvent::new(
            TicketEventKind::Created,
            Uuid::new_v4(),
            Uuid::new_v4(),
            TicketStatus::New,
        ));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..5 {
            bus.publish(TicketEvent::new(
                TicketEventKind::Updated,
                Uuid::new_v4(),
                Uuid::new_v4(),
                TicketStatus::New,
            ));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
        assert!(rx.recv().await.is_ok());
    }
}
