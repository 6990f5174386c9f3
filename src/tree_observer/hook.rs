//! The hook an observer installs on every node it tracks.

use std::sync::Weak;

use crate::ui::{HookId, NodeEvent, NodeHook, NodeRef};

use super::NodeTreeObserver;

/// Forwards toolkit notifications to its observer.
///
/// Holds the observer weakly: notifications that arrive after the observer
/// was dropped are discarded.
pub(super) struct ObserverHook {
    pub(super) id: HookId,
    pub(super) owner: Weak<NodeTreeObserver>,
}

impl NodeHook for ObserverHook {
    fn hook_id(&self) -> HookId {
        self.id
    }

    fn on_event(&self, node: &NodeRef, event: &NodeEvent) {
        match self.owner.upgrade() {
            Some(observer) => observer.handle_event(node, event),
            None => tracing::trace!("[observer] {} gone, dropping {event:?}", self.id),
        }
    }
}
