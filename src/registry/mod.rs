//! Registry of style sources and node tree observers.
//!
//! [`SourceRegistry`] owns the registered files and directories, one watch
//! subtree per source, and the observers attached to live node trees.
//! Watch events funnel into a debounced reload of the aggregate document.
//!
//! # Driving
//!
//! Nothing polls on its own. Either call [`SourceRegistry::tick`] from the
//! host's event loop, or spawn [`SourceRegistry::run`] on a tokio runtime:
//!
//! ```ignore
//! let registry = Arc::new(SourceRegistry::from_settings(engine, &settings)?);
//! registry.add_directory("styles");
//! tokio::spawn(registry.clone().run());
//! ```

mod loader;
mod source;

pub use source::{Source, SourceKind};

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::ReentrantMutex;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::Settings;
use crate::notifications::{DEFAULT_CAPACITY, NotificationBroadcaster, StyleEvent};
use crate::style::StyleEngine;
use crate::tree_observer::{DEFAULT_RESERVED_PREFIX, NodeTreeObserver};
use crate::ui::NodeRef;
use crate::watcher::{
    ChangeObserver, EventQueue, FileFilter, PollIntervals, PollSchedule, ReloadDebouncer,
    ReloadDecision, WatchError, WatchNode,
};

const DEFAULT_DEBOUNCE_MS: u64 = 2000;
const DEFAULT_TIMER_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

struct RegistryState {
    /// Registered sources in insertion order.
    sources: Vec<Source>,
    /// One watch subtree per source path.
    watches: HashMap<PathBuf, WatchNode>,
    filter: FileFilter,
    intervals: PollIntervals,
    debouncer: ReloadDebouncer,
    auto_reload: bool,
    /// Pending-reload check.
    reload_timer: PollSchedule,
    updaters: Vec<Arc<NodeTreeObserver>>,
    reserved_prefix: String,
    last_document: String,
}

/// Watched style sources, their aggregate document and the node observers.
///
/// State is guarded by a reentrant lock: applying a document or reloading a
/// node may call back into the registry on the same thread. Borrows of the
/// inner state never span a call into the engine or a watch observer.
pub struct SourceRegistry {
    engine: Arc<dyn StyleEngine>,
    broadcaster: NotificationBroadcaster,
    tick_interval: Duration,
    state: ReentrantMutex<RefCell<RegistryState>>,
}

impl SourceRegistry {
    /// Registry with default intervals and auto-reload enabled.
    pub fn new(engine: Arc<dyn StyleEngine>) -> Self {
        Self::build(
            engine,
            FileFilter::any(),
            PollIntervals::default(),
            ReloadDebouncer::new(DEFAULT_DEBOUNCE_MS),
            true,
            DEFAULT_TIMER_INTERVAL,
            DEFAULT_TICK_INTERVAL,
            DEFAULT_RESERVED_PREFIX.to_string(),
        )
    }

    /// Registry configured from [`Settings`].
    ///
    /// Fails only if `watch.file_filters` holds an invalid pattern.
    pub fn from_settings(
        engine: Arc<dyn StyleEngine>,
        settings: &Settings,
    ) -> Result<Self, WatchError> {
        let filter = FileFilter::new(settings.watch.file_filters.iter().cloned())?;

        Ok(Self::build(
            engine,
            filter,
            PollIntervals::from(&settings.watch),
            ReloadDebouncer::new(settings.reload.debounce_ms),
            settings.reload.auto_reload,
            Duration::from_millis(settings.reload.timer_interval_ms),
            Duration::from_millis(settings.reload.tick_interval_ms),
            settings.observer.reserved_attribute_prefix.clone(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        engine: Arc<dyn StyleEngine>,
        filter: FileFilter,
        intervals: PollIntervals,
        debouncer: ReloadDebouncer,
        auto_reload: bool,
        timer_interval: Duration,
        tick_interval: Duration,
        reserved_prefix: String,
    ) -> Self {
        Self {
            engine,
            broadcaster: NotificationBroadcaster::new(DEFAULT_CAPACITY),
            tick_interval,
            state: ReentrantMutex::new(RefCell::new(RegistryState {
                sources: Vec::new(),
                watches: HashMap::new(),
                filter,
                intervals,
                debouncer,
                auto_reload,
                reload_timer: PollSchedule::started_at(timer_interval, Instant::now()),
                updaters: Vec::new(),
                reserved_prefix,
                last_document: String::new(),
            })),
        }
    }

    /// Subscribe to source changes, document applications and node reloads.
    pub fn subscribe(&self) -> broadcast::Receiver<StyleEvent> {
        self.broadcaster.subscribe()
    }

    // ---- sources ----

    /// Register a source of either kind. Returns `false` if the path is already registered.
    pub fn add(&self, kind: SourceKind, path: impl Into<PathBuf>) -> bool {
        match kind {
            SourceKind::File => self.add_file(path),
            SourceKind::Directory => self.add_directory(path),
        }
    }

    /// Watch a single style file.
    pub fn add_file(&self, path: impl Into<PathBuf>) -> bool {
        self.insert_source(Source::file(path))
    }

    /// Watch a directory of style files, recursively.
    pub fn add_directory(&self, path: impl Into<PathBuf>) -> bool {
        self.insert_source(Source::directory(path))
    }

    fn insert_source(&self, source: Source) -> bool {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            if let Some(existing) = state.sources.iter().find(|s| s.path == source.path) {
                if existing.kind != source.kind {
                    tracing::warn!(
                        "[registry] {} is already registered as a {}",
                        source.path.display(),
                        existing.kind
                    );
                }
                return false;
            }

            let watch = match source.kind {
                SourceKind::File => WatchNode::file(&source.path, state.intervals),
                SourceKind::Directory => {
                    WatchNode::directory(&source.path, state.filter.clone(), state.intervals)
                }
            };
            state.watches.insert(source.path.clone(), watch);
            state.sources.push(source.clone());
        }

        crate::log_event!("registry", "source added", "{source}");
        self.schedule_reload();
        true
    }

    /// Unregister the source at `path` and tear down its watch subtree.
    ///
    /// Files still present under the source are reported as removed before
    /// the subtree is dropped. Unknown paths are ignored.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let guard = self.state.lock();

        let watch = {
            let mut state = guard.borrow_mut();
            if let Some(index) = state.sources.iter().position(|s| s.path == path) {
                state.sources.remove(index);
            }
            state.watches.remove(path)
        };

        let Some(mut watch) = watch else {
            return;
        };

        let queue = EventQueue::new();
        watch.deactivate(&queue);
        drop(watch);

        crate::log_event!("registry", "source removed", "{}", path.display());
        queue.replay(self);
        self.schedule_reload();
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.find_source(path.as_ref(), None)
    }

    pub fn contains_file(&self, path: impl AsRef<Path>) -> bool {
        self.find_source(path.as_ref(), Some(SourceKind::File))
    }

    pub fn contains_directory(&self, path: impl AsRef<Path>) -> bool {
        self.find_source(path.as_ref(), Some(SourceKind::Directory))
    }

    fn find_source(&self, path: &Path, kind: Option<SourceKind>) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .sources
            .iter()
            .any(|s| s.path == path && kind.is_none_or(|kind| s.kind == kind))
    }

    pub fn count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().sources.len();
        count
    }

    pub fn at(&self, index: usize) -> Option<Source> {
        let guard = self.state.lock();
        let source = guard.borrow().sources.get(index).cloned();
        source
    }

    /// Registered sources in insertion order.
    pub fn sources(&self) -> Vec<Source> {
        let guard = self.state.lock();
        let sources = guard.borrow().sources.clone();
        sources
    }

    /// Number of live watch subtrees.
    pub fn watch_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().watches.len();
        count
    }

    /// Files currently tracked by the watch subtree of a directory source.
    pub fn watched_files(&self, path: impl AsRef<Path>) -> usize {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .watches
            .get(path.as_ref())
            .and_then(WatchNode::as_directory)
            .map_or(0, |dir| dir.file_count())
    }

    pub fn file_filters(&self) -> Vec<String> {
        let guard = self.state.lock();
        let patterns = guard.borrow().filter.patterns().to_vec();
        patterns
    }

    /// Replace the filter applied inside every directory source.
    ///
    /// Directory watches reconcile against the new filter right away.
    pub fn set_file_filters<I, S>(&self, patterns: I) -> Result<(), WatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = FileFilter::new(patterns)?;
        let guard = self.state.lock();
        let queue = EventQueue::new();

        {
            let mut state = guard.borrow_mut();
            if state.filter == filter {
                return Ok(());
            }

            state.filter = filter.clone();
            for watch in state.watches.values_mut() {
                watch.set_filter(filter.clone(), &queue);
            }
        }

        crate::log_event!("registry", "filter", "{:?}", filter.patterns());
        queue.replay(self);
        self.schedule_reload();
        Ok(())
    }

    // ---- reloading ----

    /// Load every source, apply the document and return it.
    ///
    /// Never fails: unreadable files contribute nothing.
    pub fn reload_all_style(&self) -> String {
        let guard = self.state.lock();

        let (sources, filter) = {
            let state = guard.borrow();
            (state.sources.clone(), state.filter.clone())
        };

        let document = loader::load_document(&sources, &filter);
        {
            let mut state = guard.borrow_mut();
            state.debouncer.mark_reloaded(Instant::now());
            state.last_document = document.clone();
        }

        self.engine.apply_style_text(&document);
        crate::log_event!(
            "registry",
            "style applied",
            "{} sources, {} bytes",
            sources.len(),
            document.len()
        );
        self.broadcaster.send(StyleEvent::StyleApplied {
            sources: sources.len(),
            bytes: document.len(),
        });

        document
    }

    /// The most recently applied document.
    pub fn last_document(&self) -> String {
        let guard = self.state.lock();
        let document = guard.borrow().last_document.clone();
        document
    }

    pub fn auto_reload_style(&self) -> bool {
        let guard = self.state.lock();
        let enabled = guard.borrow().auto_reload;
        enabled
    }

    pub fn set_auto_reload_style(&self, enable: bool) {
        let guard = self.state.lock();
        guard.borrow_mut().auto_reload = enable;
        crate::debug_event!("registry", "auto reload", "{enable}");
    }

    /// Whether a deferred reload is waiting for the timer.
    pub fn has_pending_reload(&self) -> bool {
        let guard = self.state.lock();
        let pending = guard.borrow().debouncer.has_pending();
        pending
    }

    /// Reload now if the debounce window allows it, otherwise defer.
    fn schedule_reload(&self) {
        let guard = self.state.lock();

        let decision = {
            let mut state = guard.borrow_mut();
            if !state.auto_reload {
                return;
            }
            state.debouncer.request(Instant::now())
        };

        match decision {
            ReloadDecision::Now => {
                self.reload_all_style();
            }
            ReloadDecision::Deferred => {
                crate::debug_event!("registry", "reload deferred");
            }
        }
    }

    /// Run a deferred reload, if one is pending. Returns whether it ran.
    pub fn flush_pending(&self) -> bool {
        let guard = self.state.lock();

        let pending = {
            let mut state = guard.borrow_mut();
            state.auto_reload && state.debouncer.take_pending()
        };

        if pending {
            self.reload_all_style();
        }
        pending
    }

    /// One event loop step: poll due watches, then check for a pending reload.
    pub fn tick(&self, now: Instant) {
        let guard = self.state.lock();
        let queue = EventQueue::new();

        let timer_due = {
            let mut state = guard.borrow_mut();
            let state = &mut *state;
            for source in &state.sources {
                if let Some(watch) = state.watches.get_mut(&source.path) {
                    watch.tick(now, &queue);
                }
            }
            state.reload_timer.fire(now)
        };

        if !queue.is_empty() {
            crate::debug_event!("registry", "tick", "{} events", queue.len());
            queue.replay(self);
        }

        if timer_due {
            self.flush_pending();
        }
    }

    /// Drive [`tick`](Self::tick) from a tokio interval until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        crate::log_event!("registry", "driver started", "every {:?}", self.tick_interval);
        loop {
            let now = ticker.tick().await;
            self.tick(now.into_std());
        }
    }

    // ---- observers ----

    /// Observer for `root`, created on first request.
    pub fn add_updater(&self, root: &NodeRef) -> Arc<NodeTreeObserver> {
        self.insert_updater(root)
    }

    /// Same as [`add_updater`](Self::add_updater): one observer per root.
    pub fn insert_updater(&self, root: &NodeRef) -> Arc<NodeTreeObserver> {
        let guard = self.state.lock();

        let prefix = {
            let state = guard.borrow();
            if let Some(existing) = Self::find_updater(&state.updaters, root) {
                return existing;
            }
            state.reserved_prefix.clone()
        };

        let observer = NodeTreeObserver::builder(self.engine.clone())
            .broadcaster(self.broadcaster.clone())
            .reserved_prefix(prefix)
            .root(Some(root.clone()))
            .build();

        guard.borrow_mut().updaters.push(observer.clone());
        crate::log_event!("registry", "updater added", "{} on {}", observer.id(), root.node_id());
        observer
    }

    /// Detach and drop the observer for `root`, if any.
    pub fn remove_updater(&self, root: &NodeRef) {
        let guard = self.state.lock();
        let root_id = root.node_id();

        let removed: Vec<Arc<NodeTreeObserver>> = {
            let mut state = guard.borrow_mut();
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.updaters)
                .into_iter()
                .partition(|observer| observer.root_id() == Some(root_id));
            state.updaters = kept;
            removed
        };

        for observer in removed {
            observer.set_root(None);
            crate::log_event!("registry", "updater removed", "{} from {root_id}", observer.id());
        }
    }

    pub fn updaters(&self) -> Vec<Arc<NodeTreeObserver>> {
        let guard = self.state.lock();
        let updaters = guard.borrow().updaters.clone();
        updaters
    }

    pub fn contains_updater(&self, root: &NodeRef) -> bool {
        self.updater(root).is_some()
    }

    pub fn updater(&self, root: &NodeRef) -> Option<Arc<NodeTreeObserver>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        Self::find_updater(&state.updaters, root)
    }

    fn find_updater(
        updaters: &[Arc<NodeTreeObserver>],
        root: &NodeRef,
    ) -> Option<Arc<NodeTreeObserver>> {
        let root_id = root.node_id();
        updaters
            .iter()
            .find(|observer| observer.root_id() == Some(root_id))
            .cloned()
    }
}

impl ChangeObserver for SourceRegistry {
    fn added(&self, path: &Path) {
        self.source_changed(path);
    }

    fn removed(&self, path: &Path) {
        self.source_changed(path);
    }

    fn changed(&self, path: &Path) {
        self.source_changed(path);
    }
}

impl SourceRegistry {
    fn source_changed(&self, path: &Path) {
        self.broadcaster.send(StyleEvent::SourceChanged {
            path: path.to_path_buf(),
        });
        self.schedule_reload();
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources())
            .field("updaters", &self.updaters().len())
            .field("auto_reload", &self.auto_reload_style())
            .finish()
    }
}
