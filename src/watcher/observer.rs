//! Observer trait and event types for the watch tree.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Change reported by a watch subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file appeared (or became visible through the filter).
    Added { path: PathBuf },

    /// A file disappeared, or its watch was deactivated.
    Removed { path: PathBuf },

    /// A file's modification timestamp changed.
    Changed { path: PathBuf },
}

impl WatchEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Added { path }
            | WatchEvent::Removed { path }
            | WatchEvent::Changed { path } => path,
        }
    }

    /// Deliver this event to an observer.
    pub fn dispatch(&self, observer: &dyn ChangeObserver) {
        match self {
            WatchEvent::Added { path } => observer.added(path),
            WatchEvent::Removed { path } => observer.removed(path),
            WatchEvent::Changed { path } => observer.changed(path),
        }
    }
}

/// Receiver for events emitted by file and directory watches.
///
/// Watches never hold on to their observer; it is passed to every poll,
/// so an observer can own the watch tree it listens to.
pub trait ChangeObserver {
    fn added(&self, path: &Path);
    fn removed(&self, path: &Path);
    fn changed(&self, path: &Path);
}

/// Observer that records events for later delivery.
///
/// Used to poll a watch tree while its owner is borrowed, then replay the
/// events once the borrow is released.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: RefCell<Vec<WatchEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Take all recorded events in the order they were reported.
    pub fn drain(&self) -> Vec<WatchEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Deliver all recorded events to another observer, emptying the queue.
    pub fn replay(&self, observer: &dyn ChangeObserver) {
        for event in self.drain() {
            event.dispatch(observer);
        }
    }

    fn push(&self, event: WatchEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl ChangeObserver for EventQueue {
    fn added(&self, path: &Path) {
        self.push(WatchEvent::Added {
            path: path.to_path_buf(),
        });
    }

    fn removed(&self, path: &Path) {
        self.push(WatchEvent::Removed {
            path: path.to_path_buf(),
        });
    }

    fn changed(&self, path: &Path) {
        self.push(WatchEvent::Changed {
            path: path.to_path_buf(),
        });
    }
}
