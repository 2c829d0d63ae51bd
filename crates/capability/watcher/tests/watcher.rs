use hub_watcher::{FileWatcher, WatchError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn counter() -> (Arc<AtomicUsize>, hub_watcher::ChangeCallback) {
    let count = Arc::new(AtomicUsize::new(0));
    let hits = count.clone();
    let callback: hub_watcher::ChangeCallback = Arc::new(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

#[tokio::test]
async fn burst_of_writes_fires_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hub.passwd");
    std::fs::write(&path, "").expect("create");
    let (count, callback) = counter();
    let watcher = FileWatcher::watch(&path, callback).expect("watch");

    std::fs::write(&path, "a:1\n").expect("write 1");
    std::fs::write(&path, "a:2\n").expect("write 2");
    std::fs::write(&path, "a:3\n").expect("write 3");
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    watcher.close();
}

#[tokio::test]
async fn rename_over_target_is_detected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hub.acl");
    std::fs::write(&path, "groups: {}\n").expect("create");
    let (count, callback) = counter();
    let _watcher = FileWatcher::watch(&path, callback).expect("watch");

    let staged = dir.path().join("hub.acl.new");
    std::fs::write(&staged, "groups: {g1: {}}\n").expect("stage");
    std::fs::rename(&staged, &path).expect("rename");
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(count.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn sibling_files_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("watched.txt");
    std::fs::write(&path, "").expect("create");
    let (count, callback) = counter();
    let _watcher = FileWatcher::watch(&path, callback).expect("watch");

    std::fs::write(dir.path().join("other.txt"), "noise").expect("write sibling");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn close_is_idempotent_and_stops_callbacks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("file.txt");
    std::fs::write(&path, "").expect("create");
    let (count, callback) = counter();
    let watcher = FileWatcher::watch(&path, callback).expect("watch");

    watcher.close();
    watcher.close();
    std::fs::write(&path, "changed").expect("write");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_parent_directory_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing").join("file.txt");
    let (_count, callback) = counter();
    let err = FileWatcher::watch(&path, callback).err().expect("error");
    assert!(matches!(err, WatchError::Unreadable { .. }));
    assert_eq!(err.kind(), domain::ErrorKind::Io);
}
