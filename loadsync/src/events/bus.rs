//! Event Bus - fire-and-forget pub/sub for model-change notifications
//!
//! The EventBus uses a tokio broadcast channel. Sending never blocks and never
//! needs a runtime, so loaders can emit from plain worker threads.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::ModelChanged;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Sink for "model changed" notifications
///
/// Implementations must not block and must not report failure: a missing
/// listener is not an error for the loader that emits.
pub trait ChangeNotifier: Send + Sync {
    fn broadcast(&self, event: ModelChanged);
}

/// Broadcast bus for [`ModelChanged`] events
pub struct EventBus {
    tx: broadcast::Sender<ModelChanged>,
    channel_capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            channel_capacity: capacity,
        }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no subscribers, the event is dropped.
    /// If a subscriber lags past the capacity, its oldest events are dropped.
    pub fn emit(&self, event: ModelChanged) {
        debug!(task_id = %event.task_id, code = %event.code, "EventBus::emit");
        // No subscribers is OK
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ModelChanged> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl ChangeNotifier for EventBus {
    fn broadcast(&self, event: ModelChanged) {
        self.emit(event);
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus(capacity: usize) -> Arc<EventBus> {
    Arc::new(EventBus::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use crate::events::ChangeCode;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_creation() {
        let bus = EventBus::new(100);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 100);
    }

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(100);
        let _rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(100);
        // This should not panic even with no subscribers
        bus.emit(ModelChanged::new(TaskId::from("t"), ChangeCode::Started));
    }

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.emit(ModelChanged::new(TaskId::from("test-123"), ChangeCode::Started));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id.as_str(), "test-123");
        assert_eq!(event.code, ChangeCode::Started);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(ModelChanged::new(TaskId::from("test"), ChangeCode::Finished));

        let event1 = rx1.recv().await.unwrap();
        let event2 = rx2.recv().await.unwrap();
        assert_eq!(event1.task_id.as_str(), "test");
        assert_eq!(event2.task_id.as_str(), "test");
    }

    #[test]
    fn test_notifier_from_plain_thread() {
        let bus = create_event_bus(16);
        let mut rx = bus.subscribe();
        let notifier: Arc<dyn ChangeNotifier> = bus.clone();

        std::thread::spawn(move || {
            notifier.broadcast(ModelChanged::new(TaskId::from("worker"), ChangeCode::Started));
        })
        .join()
        .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.task_id.as_str(), "worker");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
