//! Polling watch tree over style sources on disk.
//!
//! A watch subtree mirrors one registered file or directory. Every node
//! polls on its own period and reports `added`, `removed` and `changed`
//! events to a [`ChangeObserver`] handed in by the caller.
//!
//! # Architecture
//!
//! ```text
//! WatchNode
//!   File(FileWatch)            timestamp poll, 2.5s
//!   Directory(DirectoryWatch)  reconciliation, 10s
//!     files: path -> FileWatch
//!     dirs:  path -> DirectoryWatch
//! ```
//!
//! Nothing in this module spawns threads or timers; the owner ticks the
//! tree from its event loop.

mod debouncer;
mod directory;
mod error;
mod file;
mod filter;
mod node;
mod observer;
mod schedule;

pub use debouncer::{ReloadDebouncer, ReloadDecision};
pub use directory::DirectoryWatch;
pub use error::WatchError;
pub use file::FileWatch;
pub use filter::FileFilter;
pub use node::WatchNode;
pub use observer::{ChangeObserver, EventQueue, WatchEvent};
pub use schedule::{DIRECTORY_POLL_INTERVAL, FILE_POLL_INTERVAL, PollIntervals, PollSchedule};
