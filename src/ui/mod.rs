//! Seam between the observer and the host UI toolkit.
//!
//! The toolkit owns the nodes. This crate only needs to enumerate a node's
//! children and layout contents, install and remove an interception hook,
//! and receive the notifications the toolkit delivers to installed hooks.

pub mod memory;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Shared handle to a toolkit node.
pub type NodeRef = Arc<dyn UiNode>;

/// Non-owning handle to a toolkit node.
pub type WeakNodeRef = Weak<dyn UiNode>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node, stable for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Identity of an installed hook. Toolkits remove hooks by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Entry of a node's layout: a node, a nested layout, or empty space.
#[derive(Clone)]
pub enum LayoutItem {
    Node(NodeRef),
    Layout(Vec<LayoutItem>),
    Spacer,
}

impl fmt::Debug for LayoutItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutItem::Node(node) => f.debug_tuple("Node").field(&node.node_id()).finish(),
            LayoutItem::Layout(items) => f.debug_tuple("Layout").field(items).finish(),
            LayoutItem::Spacer => f.write_str("Spacer"),
        }
    }
}

/// Notification delivered by the toolkit to every hook on a node.
#[derive(Clone)]
pub enum NodeEvent {
    /// A child was attached to the node.
    ChildAdded(NodeRef),
    /// A child was detached from the node.
    ChildRemoved(NodeRef),
    /// A named attribute of the node changed.
    AttributeChanged(String),
}

impl fmt::Debug for NodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeEvent::ChildAdded(child) => {
                f.debug_tuple("ChildAdded").field(&child.node_id()).finish()
            }
            NodeEvent::ChildRemoved(child) => {
                f.debug_tuple("ChildRemoved").field(&child.node_id()).finish()
            }
            NodeEvent::AttributeChanged(name) => {
                f.debug_tuple("AttributeChanged").field(name).finish()
            }
        }
    }
}

/// A node in the host toolkit's tree.
pub trait UiNode: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Direct children of this node.
    fn children(&self) -> Vec<NodeRef>;

    /// Contents of the node's layout, if it has one.
    fn layout_items(&self) -> Vec<LayoutItem> {
        Vec::new()
    }

    /// Install a hook. Installing the same [`HookId`] twice keeps one copy.
    fn install_hook(&self, hook: Arc<dyn NodeHook>);

    /// Remove the hook with the given id, if installed.
    fn remove_hook(&self, hook: HookId);
}

/// Receiver of toolkit notifications for the nodes it is installed on.
pub trait NodeHook: Send + Sync {
    fn hook_id(&self) -> HookId;

    /// Called by the toolkit with the node the event originated on.
    fn on_event(&self, node: &NodeRef, event: &NodeEvent);
}

/// Every node reachable from `root`, including `root` itself.
///
/// Follows child enumeration and layout containment recursively. Nodes
/// reachable through several paths appear once. Order is not guaranteed.
pub fn reachable_nodes(root: &NodeRef) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if !seen.insert(node.node_id()) {
            continue;
        }

        for child in node.children() {
            stack.push(child);
        }
        collect_layout(&node.layout_items(), &mut stack);

        result.push(node);
    }

    result
}

fn collect_layout(items: &[LayoutItem], out: &mut Vec<NodeRef>) {
    for item in items {
        match item {
            LayoutItem::Node(node) => out.push(node.clone()),
            LayoutItem::Layout(nested) => collect_layout(nested, out),
            LayoutItem::Spacer => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNode;
    use super::*;

    fn ids(nodes: &[NodeRef]) -> HashSet<NodeId> {
        nodes.iter().map(|n| n.node_id()).collect()
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(NodeId::next(), NodeId::next());
        assert_ne!(HookId::next(), HookId::next());
        assert_eq!(NodeId::from_raw(7).get(), 7);
    }

    #[test]
    fn test_reachable_includes_root_and_descendants() {
        let root = MemoryNode::new("root");
        let panel = MemoryNode::new("panel");
        let button = MemoryNode::new("button");
        panel.add_child(button.clone());
        root.add_child(panel.clone());

        let nodes = reachable_nodes(&root.as_node());
        assert_eq!(nodes.len(), 3);
        assert_eq!(
            ids(&nodes),
            HashSet::from([root.node_id(), panel.node_id(), button.node_id()])
        );
    }

    #[test]
    fn test_reachable_follows_nested_layouts() {
        let root = MemoryNode::new("root");
        let label = MemoryNode::new("label");
        let edit = MemoryNode::new("edit");
        root.set_layout(vec![
            LayoutItem::Spacer,
            LayoutItem::Layout(vec![
                LayoutItem::Node(label.as_node()),
                LayoutItem::Layout(vec![LayoutItem::Node(edit.as_node())]),
            ]),
        ]);

        let nodes = reachable_nodes(&root.as_node());
        assert_eq!(
            ids(&nodes),
            HashSet::from([root.node_id(), label.node_id(), edit.node_id()])
        );
    }

    #[test]
    fn test_reachable_deduplicates() {
        let root = MemoryNode::new("root");
        let child = MemoryNode::new("child");
        root.add_child(child.clone());
        // Same node reachable as a child and through the layout
        root.set_layout(vec![LayoutItem::Node(child.as_node())]);

        let nodes = reachable_nodes(&root.as_node());
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_event_debug_shows_ids() {
        let child = MemoryNode::new("child");
        let event = NodeEvent::ChildAdded(child.as_node());
        assert!(format!("{event:?}").contains("ChildAdded"));

        let item = LayoutItem::Layout(vec![LayoutItem::Spacer]);
        assert_eq!(format!("{item:?}"), "Layout([Spacer])");
    }
}
