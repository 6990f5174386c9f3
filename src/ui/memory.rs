//! In-memory node tree.
//!
//! A complete [`UiNode`] implementation for headless hosts, previews and
//! tests. Structural changes and attribute writes notify installed hooks
//! synchronously, with no internal lock held, so hooks may re-enter.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{HookId, LayoutItem, NodeEvent, NodeHook, NodeId, NodeRef, UiNode};

/// A node living entirely in memory.
pub struct MemoryNode {
    id: NodeId,
    name: String,
    this: Weak<MemoryNode>,
    parent: Mutex<Weak<MemoryNode>>,
    children: Mutex<Vec<Arc<MemoryNode>>>,
    layout: Mutex<Vec<LayoutItem>>,
    attributes: Mutex<BTreeMap<String, String>>,
    hooks: Mutex<Vec<Arc<dyn NodeHook>>>,
}

impl MemoryNode {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| MemoryNode {
            id: NodeId::next(),
            name,
            this: this.clone(),
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            layout: Mutex::new(Vec::new()),
            attributes: Mutex::new(BTreeMap::new()),
            hooks: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// This node as a toolkit handle.
    pub fn as_node(self: &Arc<Self>) -> NodeRef {
        self.clone()
    }

    pub fn parent(&self) -> Option<Arc<MemoryNode>> {
        self.parent.lock().upgrade()
    }

    pub fn child_nodes(&self) -> Vec<Arc<MemoryNode>> {
        self.children.lock().clone()
    }

    /// Attach `child`, detaching it from its previous parent first.
    pub fn add_child(&self, child: Arc<MemoryNode>) {
        if let Some(previous) = child.parent() {
            previous.remove_child(child.id);
        }

        *child.parent.lock() = self.this.clone();
        self.children.lock().push(child.clone());
        self.dispatch(NodeEvent::ChildAdded(child));
    }

    /// Detach the child with `id`. Returns it if it was a child.
    pub fn remove_child(&self, id: NodeId) -> Option<Arc<MemoryNode>> {
        let removed = {
            let mut children = self.children.lock();
            let index = children.iter().position(|c| c.id == id)?;
            children.remove(index)
        };

        *removed.parent.lock() = Weak::new();
        self.dispatch(NodeEvent::ChildRemoved(removed.clone()));
        Some(removed)
    }

    /// Replace the node's layout. Layouts do not notify hooks.
    pub fn set_layout(&self, items: Vec<LayoutItem>) {
        *self.layout.lock() = items;
    }

    /// Write an attribute and notify hooks.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.attributes.lock().insert(name.clone(), value.into());
        self.dispatch(NodeEvent::AttributeChanged(name));
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn has_hook(&self, hook: HookId) -> bool {
        self.hooks.lock().iter().any(|h| h.hook_id() == hook)
    }

    fn dispatch(&self, event: NodeEvent) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let node: NodeRef = this;

        // Snapshot so hooks can install/remove hooks while being called
        let hooks: Vec<Arc<dyn NodeHook>> = self.hooks.lock().clone();
        for hook in hooks {
            hook.on_event(&node, &event);
        }
    }
}

impl UiNode for MemoryNode {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<NodeRef> {
        self.children
            .lock()
            .iter()
            .map(|child| child.clone() as NodeRef)
            .collect()
    }

    fn layout_items(&self) -> Vec<LayoutItem> {
        self.layout.lock().clone()
    }

    fn install_hook(&self, hook: Arc<dyn NodeHook>) {
        let mut hooks = self.hooks.lock();
        if !hooks.iter().any(|h| h.hook_id() == hook.hook_id()) {
            hooks.push(hook);
        }
    }

    fn remove_hook(&self, hook: HookId) {
        self.hooks.lock().retain(|h| h.hook_id() != hook);
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("children", &self.children.lock().len())
            .field("hooks", &self.hooks.lock().len())
            .finish()
    }
}
