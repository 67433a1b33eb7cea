//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`; subscribers such as a UI push
//! channel or an audit writer each receive every [`StudioEvent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use atelier_core::types::{NodeId, ProjectId};

/// Event names published by the edit pipeline.
pub mod event_types {
    pub const RENDER_CREATED: &str = "render.created";
    pub const RENDER_SELECTED: &str = "render.selected";
    pub const RENDER_UNDONE: &str = "render.undone";
    pub const RENDER_DELETED: &str = "render.deleted";
    pub const EDIT_FAILED: &str = "edit.failed";
    pub const EDIT_CANCELLED: &str = "edit.cancelled";
}

// ---------------------------------------------------------------------------
// StudioEvent
// ---------------------------------------------------------------------------

/// Something that happened to a project's renders.
///
/// Constructed via [`StudioEvent::new`] and enriched with
/// [`with_node`](StudioEvent::with_node) and
/// [`with_payload`](StudioEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioEvent {
    /// Dot-separated event name, e.g. `"render.created"`.
    pub event_type: String,

    pub project_id: ProjectId,

    /// Render the event is about, when there is one.
    pub node_id: Option<NodeId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl StudioEvent {
    pub fn new(event_type: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            event_type: event_type.into(),
            project_id,
            node_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use atelier_events::bus::{event_types, EventBus, StudioEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(StudioEvent::new(event_types::RENDER_CREATED, uuid::Uuid::nil()));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is listening.
    pub fn publish(&self, event: StudioEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let project = uuid::Uuid::now_v7();
        let node = uuid::Uuid::now_v7();

        bus.publish(
            StudioEvent::new(event_types::RENDER_CREATED, project)
                .with_node(node)
                .with_payload(serde_json::json!({"kind": "global-edit"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "render.created");
        assert_eq!(received.project_id, project);
        assert_eq!(received.node_id, Some(node));
        assert_eq!(received.payload["kind"], "global-edit");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(StudioEvent::new(event_types::EDIT_FAILED, uuid::Uuid::now_v7()));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, "edit.failed");
        assert_eq!(e2.event_type, "edit.failed");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(StudioEvent::new(event_types::EDIT_CANCELLED, uuid::Uuid::now_v7()));
    }

    #[test]
    fn new_event_has_no_node_and_empty_payload() {
        let event = StudioEvent::new(event_types::RENDER_UNDONE, uuid::Uuid::now_v7());
        assert!(event.node_id.is_none());
        assert!(event.payload.is_object());
    }
}
