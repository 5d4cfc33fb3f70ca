//! Match event types and the event bus that carries them.
//!
//! The dispatcher and the celebration trigger publish here; UI adapters
//! subscribe. Discovery is still poll-driven: nothing on the bus originates
//! from the server.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Celebration, RelationshipState, UserId};
use crate::tags::TagSet;

/// Envelope wrapping every published event.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"match.celebrated"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    pub payload: MatchEvent,
}

impl EventEnvelope {
    pub fn new(event: MatchEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            payload: event,
        }
    }
}

/// Domain events, serialized with a `type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum MatchEvent {
    /// A newly formed match the viewer has not been shown yet.
    Celebrated(Celebration),
    /// The viewer's tags toward a target settled after an action.
    TagsChanged {
        viewer: UserId,
        target: UserId,
        tags: TagSet,
        state: RelationshipState,
    },
    /// An action failed and the local tag set was restored.
    RolledBack {
        viewer: UserId,
        target: UserId,
        tags: TagSet,
        error: String,
    },
}

impl MatchEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MatchEvent::Celebrated(_) => "match.celebrated",
            MatchEvent::TagsChanged { .. } => "tags.changed",
            MatchEvent::RolledBack { .. } => "tags.rolled_back",
        }
    }
}

/// Broadcast bus for [`MatchEvent`]s.
///
/// Uses `tokio::sync::broadcast`; receivers that fall behind get a `Lagged`
/// error and miss events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped when nobody listens.
    pub fn emit(&self, event: MatchEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tag;

    fn celebration() -> Celebration {
        Celebration {
            viewer: UserId(1),
            target: UserId(2),
            display_name: Some("Robin".to_string()),
            photo_url: None,
            celebrated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(MatchEvent::Celebrated(celebration()));

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "match.celebrated");
        match envelope.payload {
            MatchEvent::Celebrated(c) => assert_eq!(c.target, UserId(2)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(MatchEvent::Celebrated(celebration()));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(MatchEvent::TagsChanged {
            viewer: UserId(1),
            target: UserId(2),
            tags: TagSet::from([Tag::Approve]),
            state: RelationshipState::Approved,
        });

        assert_eq!(a.recv().await.unwrap().event_type, "tags.changed");
        assert_eq!(b.recv().await.unwrap().event_type, "tags.changed");
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let event = MatchEvent::RolledBack {
            viewer: UserId(3),
            target: UserId(4),
            tags: TagSet::from([Tag::Like]),
            error: "Store error: 500".to_string(),
        };
        let json = serde_json::to_value(EventEnvelope::new(event)).unwrap();
        assert_eq!(json["event_type"], "tags.rolled_back");
        assert_eq!(json["payload"]["type"], "RolledBack");
        assert_eq!(json["payload"]["tags"], serde_json::json!(["Like"]));
    }
}
