//! Source registration, debounced reloads and observer bookkeeping.

mod common;

use std::fs;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use common::{RecordingEngine, fast_settings, write_with_mtime};
use style_loader::ui::memory::MemoryNode;
use style_loader::{
    ChangeObserver, NodeRef, Settings, Source, SourceKind, SourceRegistry, StyleEvent, UiNode,
};
use tempfile::TempDir;
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<StyleEvent>) -> Vec<StyleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_idempotent_source_registration() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app.qss");
    fs::write(&file, "QWidget {}").unwrap();
    let dir = temp.path().join("styles");
    fs::create_dir(&dir).unwrap();

    let registry = SourceRegistry::new(RecordingEngine::new());
    assert!(registry.add_file(&file));
    assert!(!registry.add_file(&file));
    assert!(registry.add(SourceKind::Directory, &dir));
    assert!(!registry.add_directory(&dir));

    assert_eq!(registry.count(), 2);
    assert_eq!(registry.watch_count(), 2);
    assert_eq!(
        registry.sources(),
        vec![Source::file(&file), Source::directory(&dir)]
    );
    assert_eq!(registry.at(1), Some(Source::directory(&dir)));
    assert_eq!(registry.at(2), None);
    assert!(registry.contains(&file));
    assert!(registry.contains_file(&file));
    assert!(!registry.contains_directory(&file));
}

#[test]
fn test_remove_source() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("styles");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.qss"), "a").unwrap();
    fs::write(dir.join("b.qss"), "b").unwrap();

    let registry = SourceRegistry::from_settings(RecordingEngine::new(), &fast_settings(0)).unwrap();
    registry.add_directory(&dir);
    registry.tick(Instant::now());
    assert_eq!(registry.watched_files(&dir), 2);

    let mut rx = registry.subscribe();
    registry.remove(&dir);

    assert_eq!(registry.count(), 0);
    assert_eq!(registry.watch_count(), 0);
    assert!(!registry.contains(&dir));

    let mut removed: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            StyleEvent::SourceChanged { path } => Some(path),
            _ => None,
        })
        .collect();
    removed.sort();
    assert_eq!(removed, vec![dir.join("a.qss"), dir.join("b.qss")]);
    assert_eq!(registry.last_document(), "");

    // Unknown path: nothing happens
    registry.remove(temp.path().join("nope"));
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_debounce_coalescing() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app.qss");
    fs::write(&file, "v1").unwrap();

    let engine = RecordingEngine::new();
    let registry = SourceRegistry::from_settings(engine.clone(), &fast_settings(500)).unwrap();
    registry.add_file(&file);
    assert_eq!(engine.apply_count(), 1);

    // A burst inside the window only marks a reload as pending
    fs::write(&file, "v2").unwrap();
    registry.changed(&file);
    fs::write(&file, "v3").unwrap();
    registry.changed(&file);
    fs::write(&file, "v4").unwrap();
    registry.changed(&file);

    assert_eq!(engine.apply_count(), 1);
    assert!(registry.has_pending_reload());

    assert!(registry.flush_pending());
    assert_eq!(engine.apply_count(), 2);
    assert_eq!(engine.last_document().as_deref(), Some("v4"));

    // Nothing left to flush
    assert!(!registry.flush_pending());
    assert_eq!(engine.apply_count(), 2);
}

#[test]
fn test_change_after_window_reloads_immediately() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app.qss");
    fs::write(&file, "v1").unwrap();

    let engine = RecordingEngine::new();
    let registry = SourceRegistry::from_settings(engine.clone(), &fast_settings(50)).unwrap();
    registry.add_file(&file);

    sleep(Duration::from_millis(80));
    fs::write(&file, "v2").unwrap();
    registry.changed(&file);

    assert_eq!(engine.documents(), vec!["v1", "v2"]);
    assert!(!registry.has_pending_reload());
}

#[test]
fn test_tick_detects_change_and_flushes() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app.qss");
    write_with_mtime(&file, "QLabel { color: red; }", 1_000);

    let engine = RecordingEngine::new();
    let registry = SourceRegistry::from_settings(engine.clone(), &fast_settings(60_000)).unwrap();
    let mut rx = registry.subscribe();
    registry.add_file(&file);
    assert_eq!(engine.apply_count(), 1);

    write_with_mtime(&file, "QLabel { color: green; }", 2_000);
    registry.tick(Instant::now() + Duration::from_millis(50));

    // Deferred by the window, then picked up by the timer in the same tick
    assert_eq!(engine.apply_count(), 2);
    assert_eq!(registry.last_document(), "QLabel { color: green; }");

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            StyleEvent::StyleApplied {
                sources: 1,
                bytes: "QLabel { color: red; }".len()
            },
            StyleEvent::SourceChanged { path: file.clone() },
            StyleEvent::StyleApplied {
                sources: 1,
                bytes: "QLabel { color: green; }".len()
            },
        ]
    );
}

#[test]
fn test_directory_discovery_via_tick() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("base.qss"), "base").unwrap();

    let engine = RecordingEngine::new();
    let registry = SourceRegistry::from_settings(engine.clone(), &fast_settings(0)).unwrap();
    registry.add_directory(dir);
    assert_eq!(registry.last_document(), "base");

    let start = Instant::now();
    registry.tick(start);
    assert_eq!(registry.watched_files(dir), 1);

    fs::create_dir(dir.join("extra")).unwrap();
    fs::write(dir.join("extra/more.qss"), "more").unwrap();
    registry.tick(start + Duration::from_millis(50));

    assert_eq!(registry.watched_files(dir), 2);
    assert_eq!(registry.last_document(), "base\nmore");
}

#[test]
fn test_file_filters_propagate() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::write(dir.join("a.qss"), "a").unwrap();
    fs::write(dir.join("b.css"), "b").unwrap();

    let engine = RecordingEngine::new();
    let registry = SourceRegistry::from_settings(engine.clone(), &fast_settings(0)).unwrap();
    registry.add_directory(dir);
    registry.tick(Instant::now());
    assert_eq!(registry.last_document(), "a\nb");
    assert_eq!(registry.watched_files(dir), 2);

    registry.set_file_filters(["qss"]).unwrap();
    assert_eq!(registry.file_filters(), vec!["qss"]);
    assert_eq!(registry.watched_files(dir), 1);
    assert_eq!(registry.last_document(), "a");
}

#[test]
fn test_round_trip_documents_are_identical() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("theme");
    fs::create_dir_all(dir.join("widgets")).unwrap();
    fs::write(dir.join("colors.qss"), "QWidget { color: black; }").unwrap();
    fs::write(dir.join("widgets/button.qss"), "QPushButton {}").unwrap();
    let file = temp.path().join("app.qss");
    fs::write(&file, "QMainWindow {}").unwrap();

    let registry = SourceRegistry::new(RecordingEngine::new());
    registry.set_auto_reload_style(false);
    registry.add_directory(&dir);
    registry.add_file(&file);

    let first = registry.reload_all_style();
    let second = registry.reload_all_style();
    assert_eq!(first, second);
    assert_eq!(
        first,
        "QWidget { color: black; }\nQPushButton {}\nQMainWindow {}"
    );
}

#[test]
fn test_auto_reload_toggle() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app.qss");
    fs::write(&file, "x").unwrap();

    let engine = RecordingEngine::new();
    let mut settings = fast_settings(0);
    settings.reload.auto_reload = false;
    let registry = SourceRegistry::from_settings(engine.clone(), &settings).unwrap();

    assert!(!registry.auto_reload_style());
    registry.add_file(&file);
    assert_eq!(engine.apply_count(), 0);

    registry.set_auto_reload_style(true);
    registry.changed(&file);
    assert_eq!(engine.apply_count(), 1);
}

#[test]
fn test_updater_registration_is_idempotent() {
    let registry = SourceRegistry::new(RecordingEngine::new());
    let root = MemoryNode::new("window");
    let child = MemoryNode::new("child");
    root.add_child(child.clone());
    let root_ref: NodeRef = root.clone();

    let first = registry.insert_updater(&root_ref);
    let second = registry.add_updater(&root_ref);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.updaters().len(), 1);
    assert!(registry.contains_updater(&root_ref));
    assert!(child.has_hook(first.id()));

    registry.remove_updater(&root_ref);
    assert!(!registry.contains_updater(&root_ref));
    assert!(registry.updater(&root_ref).is_none());
    assert_eq!(root.hook_count(), 0);
    assert_eq!(child.hook_count(), 0);
}

#[test]
fn test_node_reloads_are_forwarded() {
    let engine = RecordingEngine::new();
    let registry = SourceRegistry::new(engine.clone());
    let root = MemoryNode::new("window");
    let root_ref: NodeRef = root.clone();

    let observer = registry.add_updater(&root_ref);
    observer.add_property("theme");

    let mut rx = registry.subscribe();
    root.set_attribute("theme", "dark");

    assert_eq!(
        drain(&mut rx),
        vec![StyleEvent::StyleReloaded {
            observer: observer.id(),
            node: root.node_id()
        }]
    );
    assert_eq!(engine.polished(), vec![root.node_id()]);
}

#[test]
fn test_reserved_prefix_from_settings() {
    let engine = RecordingEngine::new();
    let mut settings = Settings::default();
    settings.observer.reserved_attribute_prefix = "_internal".to_string();
    let registry = SourceRegistry::from_settings(engine.clone(), &settings).unwrap();

    let root = MemoryNode::new("window");
    let observer = registry.add_updater(&root.as_node());
    observer.set_update_with_all_changes(true);

    root.set_attribute("_internal_cache", "1");
    assert_eq!(engine.polish_count(), 0);

    root.set_attribute("_q_stylesheet_parent", "1");
    assert_eq!(engine.polish_count(), 1);
}

#[tokio::test]
async fn test_run_drives_polling() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("app.qss");
    write_with_mtime(&file, "before", 1_000);

    let engine = RecordingEngine::new();
    let registry =
        Arc::new(SourceRegistry::from_settings(engine.clone(), &fast_settings(0)).unwrap());
    registry.add_file(&file);

    let driver = tokio::spawn(registry.clone().run());
    write_with_mtime(&file, "after", 2_000);

    let mut waited = Duration::ZERO;
    while registry.last_document() != "after" && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    driver.abort();
    assert_eq!(registry.last_document(), "after");
    assert_eq!(engine.last_document().as_deref(), Some("after"));
}
