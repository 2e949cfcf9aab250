//! Event bus for surveyboard using tokio::broadcast
//!
//! Channel-based counterpart to the synchronous subscriber callbacks,
//! for consumers that live in their own task.

use crate::models::{Category, SubjectKey};
use tokio::sync::broadcast;

/// Events emitted by the status cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A fetch completed and fresh data was cached
    Refreshed {
        subject: SubjectKey,
        partial: bool,
    },
    /// A single category lookup failed during a fetch
    LookupFailed {
        subject: SubjectKey,
        category: Category,
        reason: String,
    },
    /// The whole fan-out failed; nothing was cached
    FetchFailed(SubjectKey),
    /// Cache entries were dropped (`None` means everything)
    Invalidated(Option<SubjectKey>),
}

/// Event bus for broadcasting status events
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: StatusEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
