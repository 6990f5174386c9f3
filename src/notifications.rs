//! Notification broadcasting for style reload events.
//!
//! The registry and its observers publish on a tokio broadcast channel;
//! application code subscribes to react to source changes or to nodes
//! whose style was just recomputed.

use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::ui::{HookId, NodeId};

/// Default channel capacity used by the registry.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleEvent {
    /// A watched file or directory entry was added, removed or modified.
    SourceChanged { path: PathBuf },
    /// A node's style was recomputed by the observer `observer`.
    StyleReloaded { observer: HookId, node: NodeId },
    /// A full style document was handed to the style engine.
    StyleApplied { sources: usize, bytes: usize },
}

/// Fan-out of style events to any number of subscribers
#[derive(Debug, Clone)]
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<StyleEvent>,
}

impl NotificationBroadcaster {
    /// Create a new broadcaster with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers
    pub fn send(&self, event: StyleEvent) {
        match self.sender.send(event) {
            Ok(count) => {
                crate::debug_event!("broadcast", "sent", "to {count} subscribers");
            }
            Err(broadcast::error::SendError(event)) => {
                // No receivers, this is fine
                tracing::trace!("[broadcast] dropped: no subscribers for {event:?}");
            }
        }
    }

    /// Subscribe to receive notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StyleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
