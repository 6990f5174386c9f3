//! Recursive directory watch that mirrors a directory's contents.
//!
//! Each [`DirectoryWatch`] owns one [`FileWatch`] per matching file and one
//! child [`DirectoryWatch`] per subdirectory. On every reconciliation the
//! child maps are brought in line with the current listing and the
//! difference is reported to the observer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use super::file::FileWatch;
use super::filter::FileFilter;
use super::observer::ChangeObserver;
use super::schedule::{PollIntervals, PollSchedule};

/// Watch tree node for one directory.
#[derive(Debug)]
pub struct DirectoryWatch {
    path: PathBuf,
    filter: FileFilter,
    intervals: PollIntervals,
    /// Matching files, keyed by absolute path.
    files: BTreeMap<PathBuf, FileWatch>,
    /// Subdirectories, keyed by absolute path.
    dirs: BTreeMap<PathBuf, DirectoryWatch>,
    schedule: PollSchedule,
}

/// Files and subdirectories from one listing.
#[derive(Debug, Default)]
struct Listing {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl DirectoryWatch {
    /// Start watching `path`. The first tick reconciles immediately.
    pub fn new(path: impl Into<PathBuf>, filter: FileFilter, intervals: PollIntervals) -> Self {
        Self {
            path: path.into(),
            filter,
            intervals,
            files: BTreeMap::new(),
            dirs: BTreeMap::new(),
            schedule: PollSchedule::new(intervals.directory),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    /// Paths of the files currently tracked directly in this directory.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Child directory watches.
    pub fn subdirectories(&self) -> impl Iterator<Item = &DirectoryWatch> {
        self.dirs.values()
    }

    pub fn subdirectory(&self, path: &Path) -> Option<&DirectoryWatch> {
        self.dirs.get(path)
    }

    /// Number of files tracked in this directory and all subdirectories.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.dirs.values().map(DirectoryWatch::file_count).sum::<usize>()
    }

    /// Replace the filter here and in every descendant, then reconcile.
    pub fn set_filter(&mut self, filter: FileFilter, observer: &dyn ChangeObserver) {
        self.filter = filter;
        for dir in self.dirs.values_mut() {
            dir.set_filter(self.filter.clone(), observer);
        }

        self.reconcile(observer);
    }

    /// Reconcile if due, then tick every child.
    ///
    /// Subdirectories discovered during this tick are reconciled in the
    /// same pass, since a fresh schedule is due immediately.
    pub fn tick(&mut self, now: Instant, observer: &dyn ChangeObserver) {
        if self.schedule.fire(now) {
            self.reconcile(observer);
        }

        for file in self.files.values_mut() {
            file.tick(now, observer);
        }

        for dir in self.dirs.values_mut() {
            dir.tick(now, observer);
        }
    }

    /// Bring the child maps in line with the directory listing.
    pub fn reconcile(&mut self, observer: &dyn ChangeObserver) {
        let listing = self.list_entries();

        for file in &listing.files {
            if !self.files.contains_key(file) {
                self.files
                    .insert(file.clone(), FileWatch::new(file.clone(), self.intervals.file));
                crate::debug_event!("watch", "tracking", "{}", file.display());
                observer.added(file);
            }
        }

        let gone_files: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| !listing.files.contains(*path))
            .cloned()
            .collect();
        for path in gone_files {
            drop(self.files.remove(&path));
            crate::debug_event!("watch", "untracking", "{}", path.display());
            observer.removed(&path);
        }

        for dir in &listing.dirs {
            if !self.dirs.contains_key(dir) {
                let child = DirectoryWatch::new(dir.clone(), self.filter.clone(), self.intervals);
                self.dirs.insert(dir.clone(), child);
            }
        }

        let gone_dirs: Vec<PathBuf> = self
            .dirs
            .keys()
            .filter(|path| !listing.dirs.contains(*path))
            .cloned()
            .collect();
        for path in gone_dirs {
            if let Some(mut child) = self.dirs.remove(&path) {
                crate::debug_event!("watch", "directory gone", "{}", path.display());
                child.deactivate(observer);
            }
        }
    }

    /// Report every still-present file under this directory as removed.
    ///
    /// Subdirectories are deactivated first, depth-first.
    pub fn deactivate(&mut self, observer: &dyn ChangeObserver) {
        for dir in self.dirs.values_mut() {
            dir.deactivate(observer);
        }

        for file in self.files.values_mut() {
            file.deactivate(observer);
        }
    }

    fn list_entries(&self) -> Listing {
        let mut listing = Listing::default();

        let walker = WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    crate::debug_event!("watch", "listing failed", "{}: {e}", self.path.display());
                    continue;
                }
            };

            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                listing.dirs.insert(path);
            } else if path.is_file() && self.filter.matches(&path) {
                listing.files.insert(path);
            }
        }

        listing
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        // Children go before the parent, subdirectories first.
        while let Some((_, dir)) = self.dirs.pop_first() {
            drop(dir);
        }

        while let Some((_, file)) = self.files.pop_first() {
            drop(file);
        }
    }
}
