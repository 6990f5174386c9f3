//! Observer that keeps a live node tree hooked and reloads style on attribute changes.
//!
//! A [`NodeTreeObserver`] attaches to one root node. It installs its hook on
//! every node reachable from that root and keeps the hooked set in step
//! with the tree: new children get hooked as they are attached, removed
//! children are unhooked. Attribute changes on hooked nodes are judged by
//! the observer's [`ReloadPolicy`].
//!
//! # States
//!
//! ```text
//! Unattached --set_root(Some)--> Attached
//! Attached   --set_root(Some)--> Attached (new root, hooks rebuilt)
//! Attached   --set_root(None)--> Unattached
//! ```
//!
//! All state sits behind a reentrant lock: reloading a node may make the
//! toolkit deliver further notifications synchronously on the same thread.
//! No `RefCell` borrow is held while calling into the toolkit or engine.

mod hook;
mod policy;

pub use policy::{DEFAULT_RESERVED_PREFIX, Reaction, ReloadPolicy};

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tokio::sync::broadcast;

use crate::notifications::{NotificationBroadcaster, StyleEvent};
use crate::style::StyleEngine;
use crate::ui::{self, HookId, NodeEvent, NodeHook, NodeId, NodeRef, WeakNodeRef};

use hook::ObserverHook;

/// Inclusion predicate for descendant reloads.
///
/// An `Err` counts as "include", so a faulty predicate never hides a node
/// from updates.
pub type ChildFilter = Arc<dyn Fn(&NodeRef) -> anyhow::Result<bool> + Send + Sync>;

/// Whether the observer currently has a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Unattached,
    Attached,
}

struct ObserverState {
    root: Option<(NodeId, WeakNodeRef)>,
    /// Nodes carrying our hook. Derived from the live tree.
    hooked: HashMap<NodeId, WeakNodeRef>,
    policy: ReloadPolicy,
    filter: Option<ChildFilter>,
}

/// Watches one node tree and reloads node style on attribute changes.
pub struct NodeTreeObserver {
    id: HookId,
    engine: Arc<dyn StyleEngine>,
    broadcaster: NotificationBroadcaster,
    hook: Arc<ObserverHook>,
    state: ReentrantMutex<RefCell<ObserverState>>,
}

impl NodeTreeObserver {
    /// Create a builder for configuring an observer.
    pub fn builder(engine: Arc<dyn StyleEngine>) -> NodeTreeObserverBuilder {
        NodeTreeObserverBuilder::new(engine)
    }

    /// Observer with default policy, attached to `root` if given.
    pub fn new(engine: Arc<dyn StyleEngine>, root: Option<NodeRef>) -> Arc<Self> {
        Self::builder(engine).root(root).build()
    }

    /// Observer watching the given attribute names.
    pub fn with_properties<I, S>(
        engine: Arc<dyn StyleEngine>,
        properties: I,
        root: Option<NodeRef>,
    ) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(engine).properties(properties).root(root).build()
    }

    /// Observer with the descendant and all-changes flags set.
    pub fn with_flags(
        engine: Arc<dyn StyleEngine>,
        refresh_child_widgets: bool,
        update_with_all_changes: bool,
        root: Option<NodeRef>,
    ) -> Arc<Self> {
        Self::builder(engine)
            .refresh_child_widgets(refresh_child_widgets)
            .update_with_all_changes(update_with_all_changes)
            .root(root)
            .build()
    }

    /// Identity of this observer, also the id of its hook.
    pub fn id(&self) -> HookId {
        self.id
    }

    /// Subscribe to this observer's notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StyleEvent> {
        self.broadcaster.subscribe()
    }

    /// The observed root, if attached and still alive.
    pub fn root(&self) -> Option<NodeRef> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.root.as_ref().and_then(|(_, weak)| weak.upgrade())
    }

    pub fn root_id(&self) -> Option<NodeId> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.root.as_ref().map(|(id, _)| *id)
    }

    pub fn attachment(&self) -> Attachment {
        if self.root_id().is_some() {
            Attachment::Attached
        } else {
            Attachment::Unattached
        }
    }

    /// Number of nodes currently carrying this observer's hook.
    pub fn hooked_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().hooked.len();
        count
    }

    pub fn is_hooked(&self, node: NodeId) -> bool {
        let guard = self.state.lock();
        let hooked = guard.borrow().hooked.contains_key(&node);
        hooked
    }

    /// Attach to a new root, or detach with `None`.
    ///
    /// Every hook installed so far is removed first; then the reachable set
    /// of the new root is computed and hooked.
    pub fn set_root(&self, root: Option<NodeRef>) {
        let guard = self.state.lock();
        let new_root = root.as_ref().map(|node| (node.node_id(), Arc::downgrade(node)));

        let previous: Vec<WeakNodeRef> = {
            let mut state = guard.borrow_mut();
            state.root = new_root;
            state.hooked.drain().map(|(_, weak)| weak).collect()
        };

        for weak in previous {
            if let Some(node) = weak.upgrade() {
                node.remove_hook(self.id);
            }
        }

        match root {
            Some(root) => {
                let hooked = self.hook_subtree(&root);
                crate::debug_event!(
                    "observer",
                    "attached",
                    "{} to {} ({hooked} nodes)",
                    self.id,
                    root.node_id()
                );
            }
            None => crate::debug_event!("observer", "detached", "{}", self.id),
        }
    }

    /// Watched attribute names, sorted.
    pub fn properties(&self) -> Vec<String> {
        self.with_policy(|policy| policy.properties())
    }

    pub fn add_property(&self, name: impl Into<String>) {
        let name = name.into();
        self.update_policy(|policy| policy.add_property(name));
    }

    pub fn remove_property(&self, name: &str) {
        self.update_policy(|policy| policy.remove_property(name));
    }

    pub fn set_properties<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_policy(|policy| policy.set_properties(names));
    }

    pub fn refresh_child_widgets(&self) -> bool {
        self.with_policy(ReloadPolicy::refresh_child_widgets)
    }

    /// React to attribute changes on descendants, not only on the root.
    pub fn set_refresh_child_widgets(&self, enable: bool) {
        self.update_policy(|policy| policy.set_refresh_child_widgets(enable));
    }

    pub fn update_with_all_changes(&self) -> bool {
        self.with_policy(ReloadPolicy::update_with_all_changes)
    }

    /// React to every non-reserved attribute, ignoring the watched set.
    pub fn set_update_with_all_changes(&self, enable: bool) {
        self.update_policy(|policy| policy.set_update_with_all_changes(enable));
    }

    /// Snapshot of the current policy.
    pub fn policy(&self) -> ReloadPolicy {
        self.with_policy(Clone::clone)
    }

    /// Install or clear the inclusion predicate for descendant reloads.
    pub fn set_child_filter(&self, filter: Option<ChildFilter>) {
        let guard = self.state.lock();
        guard.borrow_mut().filter = filter;
    }

    /// Reload every node reachable from the root.
    pub fn reload_style(&self) {
        let _guard = self.state.lock();
        let Some(root) = self.root() else {
            return;
        };

        let nodes = ui::reachable_nodes(&root);
        crate::debug_event!("observer", "reload all", "{} nodes under {}", nodes.len(), root.node_id());
        for node in &nodes {
            self.reload_node(node);
        }
    }

    /// Entry point for notifications delivered through the hook.
    fn handle_event(&self, node: &NodeRef, event: &NodeEvent) {
        let guard = self.state.lock();
        let node_id = node.node_id();

        let (is_root, policy_reaction, filter) = {
            let state = guard.borrow();
            if !state.hooked.contains_key(&node_id) {
                // Unhooked while the notification was in flight
                return;
            }

            let is_root = state.root.as_ref().is_some_and(|(id, _)| *id == node_id);
            let reaction = match event {
                NodeEvent::AttributeChanged(name) => Some(state.policy.react(name, is_root)),
                _ => None,
            };
            (is_root, reaction, state.filter.clone())
        };

        match event {
            NodeEvent::ChildAdded(child) => {
                self.hook_subtree(child);
            }
            NodeEvent::ChildRemoved(child) => {
                self.unhook_subtree(child);
            }
            NodeEvent::AttributeChanged(name) => match policy_reaction {
                Some(Reaction::Reload) => {
                    crate::debug_event!("observer", "attribute", "{name} on {}", node.node_id());
                    self.reload_node(node);
                }
                Some(Reaction::ReloadIfIncluded) if !is_root => {
                    if Self::includes(filter.as_ref(), node) {
                        crate::debug_event!("observer", "attribute", "{name} on {}", node.node_id());
                        self.reload_node(node);
                    }
                }
                _ => {}
            },
        }
    }

    /// Hook every reachable node under `start` that is not hooked yet.
    fn hook_subtree(&self, start: &NodeRef) -> usize {
        let guard = self.state.lock();
        let reachable: Vec<(NodeId, NodeRef)> = ui::reachable_nodes(start)
            .into_iter()
            .map(|node| (node.node_id(), node))
            .collect();

        let fresh: Vec<(NodeId, NodeRef)> = {
            let state = guard.borrow();
            reachable
                .into_iter()
                .filter(|(id, _)| !state.hooked.contains_key(id))
                .collect()
        };

        let hook: Arc<dyn NodeHook> = self.hook.clone();
        for (_, node) in &fresh {
            node.install_hook(hook.clone());
        }

        let mut state = guard.borrow_mut();
        for (id, node) in &fresh {
            state.hooked.insert(*id, Arc::downgrade(node));
        }
        state.hooked.len()
    }

    /// Unhook `start` and everything reachable under it, except the root.
    fn unhook_subtree(&self, start: &NodeRef) {
        let guard = self.state.lock();
        let reachable: Vec<(NodeId, NodeRef)> = ui::reachable_nodes(start)
            .into_iter()
            .map(|node| (node.node_id(), node))
            .collect();

        let removed: Vec<NodeRef> = {
            let mut state = guard.borrow_mut();
            let root_id = state.root.as_ref().map(|(id, _)| *id);
            reachable
                .into_iter()
                .filter(|(id, _)| Some(*id) != root_id)
                .filter(|(id, _)| state.hooked.remove(id).is_some())
                .map(|(_, node)| node)
                .collect()
        };

        for node in &removed {
            node.remove_hook(self.id);
        }
    }

    fn includes(filter: Option<&ChildFilter>, node: &NodeRef) -> bool {
        let Some(filter) = filter else {
            return true;
        };

        match filter(node) {
            Ok(included) => included,
            Err(e) => {
                tracing::warn!(
                    "[observer] child filter failed for {}, including it: {e}",
                    node.node_id()
                );
                true
            }
        }
    }

    /// Unpolish and polish one node, then announce it.
    fn reload_node(&self, node: &NodeRef) {
        self.engine.discard_cached_style(node);
        self.engine.recompute_style(node);
        self.broadcaster.send(StyleEvent::StyleReloaded {
            observer: self.id,
            node: node.node_id(),
        });
    }

    fn with_policy<T>(&self, f: impl FnOnce(&ReloadPolicy) -> T) -> T {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state.policy)
    }

    fn update_policy(&self, f: impl FnOnce(&mut ReloadPolicy)) {
        let guard = self.state.lock();
        f(&mut guard.borrow_mut().policy);
    }
}

impl Drop for NodeTreeObserver {
    fn drop(&mut self) {
        let state = self.state.get_mut().get_mut();
        state.root = None;
        for (_, weak) in state.hooked.drain() {
            if let Some(node) = weak.upgrade() {
                node.remove_hook(self.id);
            }
        }
    }
}

impl std::fmt::Debug for NodeTreeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTreeObserver")
            .field("id", &self.id)
            .field("root", &self.root_id())
            .field("hooked", &self.hooked_count())
            .finish()
    }
}

/// Builder for constructing a NodeTreeObserver.
pub struct NodeTreeObserverBuilder {
    engine: Arc<dyn StyleEngine>,
    broadcaster: Option<NotificationBroadcaster>,
    policy: ReloadPolicy,
    filter: Option<ChildFilter>,
    root: Option<NodeRef>,
}

impl NodeTreeObserverBuilder {
    pub fn new(engine: Arc<dyn StyleEngine>) -> Self {
        Self {
            engine,
            broadcaster: None,
            policy: ReloadPolicy::default(),
            filter: None,
            root: None,
        }
    }

    /// Publish on a shared broadcaster instead of a private one.
    pub fn broadcaster(mut self, broadcaster: NotificationBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.set_properties(names);
        self
    }

    pub fn refresh_child_widgets(mut self, enable: bool) -> Self {
        self.policy.set_refresh_child_widgets(enable);
        self
    }

    pub fn update_with_all_changes(mut self, enable: bool) -> Self {
        self.policy.set_update_with_all_changes(enable);
        self
    }

    pub fn reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.policy.set_reserved_prefix(prefix);
        self
    }

    pub fn child_filter(mut self, filter: ChildFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn root(mut self, root: Option<NodeRef>) -> Self {
        self.root = root;
        self
    }

    /// Build the observer and attach it to the root, if one was given.
    pub fn build(self) -> Arc<NodeTreeObserver> {
        let id = HookId::next();
        let observer = Arc::new_cyclic(|owner: &Weak<NodeTreeObserver>| NodeTreeObserver {
            id,
            engine: self.engine,
            broadcaster: self.broadcaster.unwrap_or_default(),
            hook: Arc::new(ObserverHook {
                id,
                owner: owner.clone(),
            }),
            state: ReentrantMutex::new(RefCell::new(ObserverState {
                root: None,
                hooked: HashMap::new(),
                policy: self.policy,
                filter: self.filter,
            })),
        });

        if self.root.is_some() {
            observer.set_root(self.root);
        }
        observer
    }
}
