//! End-to-end synchronization against a directory-backed store.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use preview_core::{Fingerprint, SyncMode};
use preview_sync::{DirStore, ObjectStore, SyncOptions, Synchronizer};

fn build_app() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<!doctype html><title>preview</title>").unwrap();
    fs::create_dir_all(dir.path().join("static")).unwrap();
    fs::write(dir.path().join("static/app.js"), "export default 1;").unwrap();
    dir
}

#[tokio::test]
async fn deployment_lands_under_its_prefix() {
    let app = build_app();
    let bucket = tempfile::tempdir().unwrap();
    let store = Arc::new(DirStore::new(bucket.path()));
    let sync = Synchronizer::new(store.clone(), SyncOptions::default());

    let report = sync.synchronize(app.path(), "abc123").await.unwrap();

    assert!(report.is_complete());
    let keys: Vec<&str> = report.synced_keys().collect();
    assert_eq!(keys, vec!["abc123/index.html", "abc123/static/app.js"]);

    assert_eq!(
        store.content_type("abc123/index.html").await.unwrap().as_deref(),
        Some("text/html")
    );
    assert_eq!(
        store.content_type("abc123/static/app.js").await.unwrap().as_deref(),
        Some("application/javascript")
    );
    assert_eq!(
        store.head("abc123/static/app.js").await.unwrap(),
        Some(Fingerprint::of(b"export default 1;"))
    );
    let body = fs::read(store.object_path("abc123/static/app.js").unwrap()).unwrap();
    assert_eq!(body, b"export default 1;");
}

#[tokio::test]
async fn rerun_is_idempotent_in_both_modes() {
    let app = build_app();

    for mode in [SyncMode::Incremental, SyncMode::Always] {
        let bucket = tempfile::tempdir().unwrap();
        let store = Arc::new(DirStore::new(bucket.path()));
        let sync = Synchronizer::new(store.clone(), SyncOptions::default().with_mode(mode));

        sync.synchronize(app.path(), "abc123").await.unwrap();
        let before = fs::read(store.object_path("abc123/index.html").unwrap()).unwrap();
        let second = sync.synchronize(app.path(), "abc123").await.unwrap();
        let after = fs::read(store.object_path("abc123/index.html").unwrap()).unwrap();

        assert_eq!(before, after);
        match mode {
            SyncMode::Incremental => assert_eq!(second.writes(), 0),
            SyncMode::Always => assert_eq!(second.writes(), 2),
        }
    }
}

#[tokio::test]
async fn distinct_prefixes_never_collide() {
    let app = build_app();
    let bucket = tempfile::tempdir().unwrap();
    let store = Arc::new(DirStore::new(bucket.path()));
    let sync = Synchronizer::new(store.clone(), SyncOptions::default());

    let main = sync.synchronize(app.path(), "main").await.unwrap();
    let feature = sync.synchronize(app.path(), "feature-login").await.unwrap();

    let main_keys: HashSet<&str> = main.synced_keys().collect();
    let feature_keys: HashSet<&str> = feature.synced_keys().collect();
    assert_eq!(main_keys.len(), 2);
    assert_eq!(feature_keys.len(), 2);
    assert!(main_keys.is_disjoint(&feature_keys));

    // The second deployment did not disturb the first.
    assert!(store.head("main/index.html").await.unwrap().is_some());
}
