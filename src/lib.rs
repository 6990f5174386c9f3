pub mod config;
pub mod logging;
pub mod notifications;
pub mod registry;
pub mod style;
pub mod tree_observer;
pub mod ui;
pub mod watcher;

pub use config::Settings;
pub use notifications::{NotificationBroadcaster, StyleEvent};
pub use registry::{Source, SourceKind, SourceRegistry};
pub use style::StyleEngine;
pub use tree_observer::{Attachment, ChildFilter, NodeTreeObserver, ReloadPolicy};
pub use ui::{HookId, LayoutItem, NodeEvent, NodeHook, NodeId, NodeRef, UiNode};
pub use watcher::{ChangeObserver, FileFilter, WatchError, WatchNode};
