//! Polling watch over a single file's modification timestamp.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use super::observer::ChangeObserver;
use super::schedule::PollSchedule;

/// Watches one file and reports when it appears, changes or disappears.
///
/// The timestamp is captured at construction, so a file that already
/// exists does not produce an `added` event on its first poll.
#[derive(Debug)]
pub struct FileWatch {
    path: PathBuf,
    /// Last seen modification time; `None` while the file is absent.
    last_modified: Option<SystemTime>,
    schedule: PollSchedule,
}

impl FileWatch {
    /// Start watching `path`, polling every `interval`.
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        let path = path.into();
        let last_modified = modified_time(&path);

        Self {
            path,
            last_modified,
            schedule: PollSchedule::started_at(interval, Instant::now()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was present at the last poll.
    pub fn exists(&self) -> bool {
        self.last_modified.is_some()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Poll if the period has elapsed.
    pub fn tick(&mut self, now: Instant, observer: &dyn ChangeObserver) {
        if self.schedule.fire(now) {
            self.poll(observer);
        }
    }

    /// Compare the current timestamp with the last one and report the transition.
    pub fn poll(&mut self, observer: &dyn ChangeObserver) {
        let current = modified_time(&self.path);

        match (self.last_modified, current) {
            (None, None) => {}
            (None, Some(stamp)) => {
                self.last_modified = Some(stamp);
                crate::debug_event!("watch", "file added", "{}", self.path.display());
                observer.added(&self.path);
            }
            (Some(previous), Some(stamp)) if previous == stamp => {}
            (Some(_), Some(stamp)) => {
                self.last_modified = Some(stamp);
                crate::debug_event!("watch", "file changed", "{}", self.path.display());
                observer.changed(&self.path);
            }
            (Some(_), None) => {
                self.last_modified = None;
                crate::debug_event!("watch", "file removed", "{}", self.path.display());
                observer.removed(&self.path);
            }
        }
    }

    /// Report the file as removed if it is still present.
    pub fn deactivate(&mut self, observer: &dyn ChangeObserver) {
        if self.last_modified.take().is_some() {
            observer.removed(&self.path);
        }
    }
}

/// Modification time of `path`, or `None` if it cannot be stat'ed.
///
/// Platforms without modification times report the epoch, which still
/// distinguishes present from absent.
pub(crate) fn modified_time(path: &Path) -> Option<SystemTime> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::{EventQueue, WatchEvent};
    use std::fs;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_existing_file_is_silent_until_changed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.qss");
        fs::write(&path, "QWidget {}").unwrap();
        set_mtime(&path, 1_000);

        let mut watch = FileWatch::new(&path, Duration::from_millis(2500));
        assert!(watch.exists());

        let queue = EventQueue::new();
        watch.poll(&queue);
        assert!(queue.is_empty());

        set_mtime(&path, 2_000);
        watch.poll(&queue);
        assert_eq!(queue.drain(), vec![WatchEvent::Changed { path: path.clone() }]);

        // Same timestamp again: nothing
        watch.poll(&queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_absent_present_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("late.qss");

        let mut watch = FileWatch::new(&path, Duration::from_millis(2500));
        assert!(!watch.exists());

        let queue = EventQueue::new();
        watch.poll(&queue);
        assert!(queue.is_empty());

        fs::write(&path, "QLabel {}").unwrap();
        watch.poll(&queue);
        assert_eq!(queue.drain(), vec![WatchEvent::Added { path: path.clone() }]);
        assert!(watch.exists());

        fs::remove_file(&path).unwrap();
        watch.poll(&queue);
        assert_eq!(queue.drain(), vec![WatchEvent::Removed { path: path.clone() }]);
        assert!(!watch.exists());

        watch.poll(&queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_tick_respects_period() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.qss");
        fs::write(&path, "").unwrap();

        let mut watch = FileWatch::new(&path, Duration::from_secs(60));
        fs::remove_file(&path).unwrap();

        let queue = EventQueue::new();
        watch.tick(Instant::now(), &queue);
        assert!(queue.is_empty(), "period has not elapsed yet");

        watch.tick(Instant::now() + Duration::from_secs(61), &queue);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_deactivate_reports_present_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.qss");
        fs::write(&path, "").unwrap();

        let mut watch = FileWatch::new(&path, Duration::from_millis(2500));
        let queue = EventQueue::new();

        watch.deactivate(&queue);
        watch.deactivate(&queue);
        assert_eq!(queue.drain(), vec![WatchEvent::Removed { path }]);
    }

    #[test]
    fn test_deactivate_absent_file_is_silent() {
        let temp_dir = TempDir::new().unwrap();
        let mut watch = FileWatch::new(temp_dir.path().join("none.qss"), Duration::from_secs(1));

        let queue = EventQueue::new();
        watch.deactivate(&queue);
        assert!(queue.is_empty());
    }
}
