//! Root of a watch subtree: either a single file or a directory.

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::directory::DirectoryWatch;
use super::file::FileWatch;
use super::filter::FileFilter;
use super::observer::ChangeObserver;
use super::schedule::PollIntervals;

/// A file or directory watch, owned exclusively by whoever created it.
#[derive(Debug)]
pub enum WatchNode {
    File(FileWatch),
    Directory(DirectoryWatch),
}

impl WatchNode {
    /// Watch a single file.
    pub fn file(path: impl Into<PathBuf>, intervals: PollIntervals) -> Self {
        WatchNode::File(FileWatch::new(absolute(path.into()), intervals.file))
    }

    /// Watch a directory recursively, tracking files accepted by `filter`.
    pub fn directory(
        path: impl Into<PathBuf>,
        filter: FileFilter,
        intervals: PollIntervals,
    ) -> Self {
        WatchNode::Directory(DirectoryWatch::new(absolute(path.into()), filter, intervals))
    }

    pub fn path(&self) -> &Path {
        match self {
            WatchNode::File(file) => file.path(),
            WatchNode::Directory(dir) => dir.path(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, WatchNode::Directory(_))
    }

    pub fn as_directory(&self) -> Option<&DirectoryWatch> {
        match self {
            WatchNode::Directory(dir) => Some(dir),
            WatchNode::File(_) => None,
        }
    }

    /// Poll whatever part of the subtree is due.
    pub fn tick(&mut self, now: Instant, observer: &dyn ChangeObserver) {
        match self {
            WatchNode::File(file) => file.tick(now, observer),
            WatchNode::Directory(dir) => dir.tick(now, observer),
        }
    }

    /// Poll this node right away, ignoring its schedule.
    pub fn poll(&mut self, observer: &dyn ChangeObserver) {
        match self {
            WatchNode::File(file) => file.poll(observer),
            WatchNode::Directory(dir) => dir.reconcile(observer),
        }
    }

    /// Report every still-present file in the subtree as removed.
    pub fn deactivate(&mut self, observer: &dyn ChangeObserver) {
        match self {
            WatchNode::File(file) => file.deactivate(observer),
            WatchNode::Directory(dir) => dir.deactivate(observer),
        }
    }

    /// Apply a new filter to a directory subtree. Files ignore filters.
    pub fn set_filter(&mut self, filter: FileFilter, observer: &dyn ChangeObserver) {
        if let WatchNode::Directory(dir) = self {
            dir.set_filter(filter, observer);
        }
    }
}

/// Resolve `path` against the current directory, keeping it as-is on failure.
fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
