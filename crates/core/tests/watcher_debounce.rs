use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tempfile::{TempDir, tempdir};
use vaultindex_core::VaultIndexer;
use vaultindex_core::vault::OsFs;
use vaultindex_core::watcher::{
    ChangeEvent, ChangeKind, FileWatcher, ListenerError, WatchConfig,
};

const WINDOW: Duration = Duration::from_millis(300);

fn canonical_tempdir() -> (TempDir, PathBuf) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    (tmp, root)
}

fn watcher(root: &Path) -> (FileWatcher, Receiver<ChangeEvent>) {
    let mut watcher = FileWatcher::new(WatchConfig::new(root).with_debounce(WINDOW));
    let (_, rx) = watcher.subscribe().unwrap();
    watcher.start().unwrap();
    (watcher, rx)
}

fn drain(rx: &Receiver<ChangeEvent>, quiet: Duration) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(quiet) {
        events.push(event);
    }
    events
}

#[test]
fn rapid_writes_collapse_into_one_event() {
    let (_tmp, root) = canonical_tempdir();
    let note = root.join("note.md");
    fs::write(&note, "v0").unwrap();
    let (_watcher, rx) = watcher(&root);

    for i in 1..=5 {
        fs::write(&note, format!("v{i}")).unwrap();
        sleep(Duration::from_millis(20));
    }

    let first = rx.recv_timeout(Duration::from_secs(5)).expect("one event");
    assert_eq!(first.kind, ChangeKind::Modified);
    assert_eq!(first.path, note);
    assert!(drain(&rx, WINDOW * 3).is_empty());
}

#[test]
fn existing_files_produce_no_events_at_start() {
    let (_tmp, root) = canonical_tempdir();
    fs::write(root.join("a.md"), "a").unwrap();
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("sub/b.md"), "b").unwrap();

    let (_watcher, rx) = watcher(&root);
    assert!(drain(&rx, WINDOW * 3).is_empty());
}

#[test]
fn create_and_delete_are_reported() {
    let (_tmp, root) = canonical_tempdir();
    let (_watcher, rx) = watcher(&root);
    let note = root.join("fresh.md");

    fs::write(&note, "hello").unwrap();
    let created = rx.recv_timeout(Duration::from_secs(5)).expect("created");
    assert_eq!((created.kind, created.path.clone()), (ChangeKind::Created, note.clone()));

    fs::remove_file(&note).unwrap();
    let deleted = rx.recv_timeout(Duration::from_secs(5)).expect("deleted");
    assert_eq!((deleted.kind, deleted.path), (ChangeKind::Deleted, note));
}

#[test]
fn ignored_files_are_filtered() {
    let (_tmp, root) = canonical_tempdir();
    let (_watcher, rx) = watcher(&root);

    fs::write(root.join("notes.txt"), "wrong extension").unwrap();
    fs::write(root.join(".hidden.md"), "hidden").unwrap();
    fs::write(root.join("draft.md.tmp"), "temp").unwrap();
    fs::create_dir_all(root.join("node_modules")).unwrap();
    fs::write(root.join("node_modules/pkg.md"), "dependency").unwrap();
    fs::write(root.join("real.md"), "real").unwrap();

    let events = drain(&rx, WINDOW * 4);
    let paths: Vec<&Path> = events.iter().map(|e| e.path.as_path()).collect();
    assert_eq!(paths, vec![root.join("real.md").as_path()]);
}

#[test]
fn nothing_is_delivered_after_stop() {
    let (_tmp, root) = canonical_tempdir();
    let (mut watcher, rx) = watcher(&root);
    watcher.stop();
    assert!(!watcher.is_running());

    fs::write(root.join("late.md"), "late").unwrap();
    assert!(drain(&rx, WINDOW * 3).is_empty());
}

#[test]
fn slow_failing_listener_does_not_hold_up_subscribers() {
    const SLOW: Duration = Duration::from_secs(3);
    let (_tmp, root) = canonical_tempdir();
    let mut watcher = FileWatcher::new(WatchConfig::new(&root).with_debounce(WINDOW));
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    watcher
        .add_listener(move |_: &ChangeEvent| -> Result<(), ListenerError> {
            seen.fetch_add(1, Ordering::SeqCst);
            sleep(SLOW);
            Err("listener gave up".into())
        })
        .unwrap();
    let (_, rx) = watcher.subscribe().unwrap();
    watcher.start().unwrap();

    let started = Instant::now();
    fs::write(root.join("one.md"), "1").unwrap();
    let first = rx.recv_timeout(SLOW).expect("first event");
    assert_eq!(first.path, root.join("one.md"));

    fs::write(root.join("two.md"), "2").unwrap();
    let second = rx.recv_timeout(SLOW).expect("second event");
    assert_eq!(second.path, root.join("two.md"));
    assert!(started.elapsed() < SLOW, "subscriber waited on the slow listener");

    let deadline = Instant::now() + SLOW * 3;
    while calls.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        sleep(Duration::from_millis(50));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    watcher.stop();
}

#[test]
fn removed_listener_stops_receiving() {
    let (_tmp, root) = canonical_tempdir();
    let mut watcher = FileWatcher::new(WatchConfig::new(&root).with_debounce(WINDOW));
    let (removed_id, removed) = watcher.subscribe().unwrap();
    let (_, kept) = watcher.subscribe().unwrap();
    watcher.start().unwrap();

    assert!(watcher.remove_listener(removed_id));
    assert!(!watcher.remove_listener(removed_id));

    fs::write(root.join("after.md"), "after").unwrap();
    let event = kept.recv_timeout(Duration::from_secs(5)).expect("kept listener event");
    assert_eq!(event.path, root.join("after.md"));
    assert!(drain(&kept, WINDOW * 2).is_empty());
    assert_eq!(removed.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn indexer_follows_the_filesystem() {
    let (_tmp, root) = canonical_tempdir();
    fs::write(root.join("a.md"), "# A\n[[b]]").unwrap();
    let indexer = Arc::new(
        VaultIndexer::new(&root, Arc::new(OsFs))
            .with_watch_config(WatchConfig::new(&root).with_debounce(Duration::from_millis(100))),
    );
    indexer.initialize().unwrap();
    indexer.start_watching().unwrap();
    assert!(indexer.is_watching());

    fs::write(root.join("b.md"), "# B").unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while indexer.get_document(Path::new("b.md")).is_none() && Instant::now() < deadline {
        sleep(Duration::from_millis(50));
    }
    assert!(indexer.get_document(Path::new("b.md")).is_some());

    // The new document picks up the link written before it existed.
    let deadline = Instant::now() + Duration::from_secs(5);
    while indexer.get_backlinks(Path::new("b.md")).is_empty() && Instant::now() < deadline {
        sleep(Duration::from_millis(50));
    }
    assert_eq!(indexer.get_backlinks(Path::new("b.md")), vec![root.join("a.md")]);

    indexer.shutdown();
    assert!(!indexer.is_watching());
}
