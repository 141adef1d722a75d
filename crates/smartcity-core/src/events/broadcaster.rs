//! Fan-out of record events to live listeners.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::RecordEvent;

/// Events buffered per listener. A listener that falls further behind skips
/// the oldest ones.
const LISTENER_BACKLOG: usize = 1024;

/// Publishes [`RecordEvent`]s to every connected listener.
///
/// Clones share one channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<RecordEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_backlog(LISTENER_BACKLOG)
    }

    pub fn with_backlog(backlog: usize) -> Self {
        let (sender, _) = broadcast::channel(backlog);
        Self { sender }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Publish an event. Returns how many listeners it reached; with nobody
    /// listening the event is dropped and 0 is returned.
    pub fn publish(&self, event: RecordEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Start listening. Earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
