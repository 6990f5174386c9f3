//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use style_loader::{NodeId, NodeRef, Settings, StyleEngine};

/// Style engine that records every call.
#[derive(Default)]
pub struct RecordingEngine {
    documents: Mutex<Vec<String>>,
    discarded: Mutex<Vec<NodeId>>,
    polished: Mutex<Vec<NodeId>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of documents applied so far.
    pub fn apply_count(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn last_document(&self) -> Option<String> {
        self.documents.lock().last().cloned()
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().clone()
    }

    /// Nodes whose style was recomputed, in call order.
    pub fn polished(&self) -> Vec<NodeId> {
        self.polished.lock().clone()
    }

    pub fn polish_count(&self) -> usize {
        self.polished.lock().len()
    }

    pub fn discard_count(&self) -> usize {
        self.discarded.lock().len()
    }

    pub fn clear_polished(&self) {
        self.polished.lock().clear();
        self.discarded.lock().clear();
    }
}

impl StyleEngine for RecordingEngine {
    fn apply_style_text(&self, document: &str) {
        self.documents.lock().push(document.to_string());
    }

    fn discard_cached_style(&self, node: &NodeRef) {
        self.discarded.lock().push(node.node_id());
    }

    fn recompute_style(&self, node: &NodeRef) {
        self.polished.lock().push(node.node_id());
    }
}

/// Write `contents` to `path` and pin its modification time.
///
/// Explicit timestamps keep change detection independent of the
/// filesystem's timestamp granularity.
pub fn write_with_mtime(path: &Path, contents: &str, secs: u64) {
    fs::write(path, contents).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Settings with short periods for tests driven by `tick`.
pub fn fast_settings(debounce_ms: u64) -> Settings {
    let mut settings = Settings::default();
    settings.watch.file_poll_interval_ms = 10;
    settings.watch.directory_poll_interval_ms = 10;
    settings.reload.debounce_ms = debounce_ms;
    settings.reload.timer_interval_ms = 10;
    settings.reload.tick_interval_ms = 10;
    settings
}
