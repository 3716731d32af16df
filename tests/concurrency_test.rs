//! Concurrency tests for Sharebox.
//!
//! These tests verify that concurrent uploads never share a stored name
//! and that the metadata written for them stays consistent.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use sharebox::auth::{AccessPolicy, Principal, UnlockStore};
use sharebox::db::{NewUser, UserRepository};
use sharebox::file::FileRepository;
use sharebox::{ContentStore, Database, FileService, ShareboxError};

/// Setup an in-memory database.
async fn setup_test_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().await.unwrap())
}

/// Create a test user and return a principal for a fresh session.
async fn create_test_principal(db: &Database, username: &str) -> Principal {
    let user = UserRepository::new(db.pool())
        .create(&NewUser::new(username))
        .await
        .unwrap();
    Principal::new(
        user.id,
        user.username,
        uuid::Uuid::new_v4().to_string(),
        Utc::now() + Duration::hours(1),
    )
}

/// Test concurrent stores of the same name.
///
/// Every writer must end up with its own file and its own content.
#[tokio::test]
async fn test_concurrent_store_same_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::new(dir.path()).unwrap();

    const NUM_WRITERS: usize = 20;

    let mut handles = Vec::new();
    for i in 0..NUM_WRITERS {
        let store = store.clone();
        let handle = tokio::spawn(async move {
            let content = format!("writer {i}");
            let name = store.store(content.as_bytes(), "photo.jpg").await?;
            Ok::<_, sharebox::ShareboxError>((name, content))
        });
        handles.push(handle);
    }

    let mut names = HashSet::new();
    for handle in handles {
        let (name, content) = handle.await.unwrap().unwrap();
        assert_eq!(store.read(&name).await.unwrap(), content.as_bytes());
        assert!(names.insert(name), "stored name handed out twice");
    }

    assert_eq!(names.len(), NUM_WRITERS);
    assert!(names.contains("photo.jpg"));
    assert!(names.iter().all(|n| n.starts_with("photo") && n.ends_with(".jpg")));
}

/// Test concurrent uploads through the file service.
///
/// Records and blobs must match one to one, with the quota counting all
/// of them.
#[tokio::test]
async fn test_concurrent_service_uploads() {
    let db = setup_test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ContentStore::new(dir.path()).unwrap());
    let policy = Arc::new(AccessPolicy::new(Arc::new(UnlockStore::new()), false));
    let principal = create_test_principal(&db, "uploader").await;

    const NUM_UPLOADS: usize = 10;

    let mut handles = Vec::new();
    for i in 0..NUM_UPLOADS {
        let db = Arc::clone(&db);
        let store = Arc::clone(&store);
        let policy = Arc::clone(&policy);
        let principal = principal.clone();
        let handle = tokio::spawn(async move {
            let service = FileService::new(&db, &store, &policy);
            let content = vec![i as u8; 100];
            service
                .upload(&principal, None, "report.pdf", content.as_slice())
                .await
        });
        handles.push(handle);
    }

    let mut stored_names = HashSet::new();
    for handle in handles {
        let file = handle.await.unwrap().unwrap();
        assert_eq!(file.filename, "report.pdf");
        assert_eq!(file.size, 100);
        assert!(stored_names.insert(file.stored_name));
    }

    let files = FileRepository::new(db.pool());
    let listed = files.list_by_owner(principal.user_id).await.unwrap();
    assert_eq!(listed.len(), NUM_UPLOADS);
    assert_eq!(
        files.total_size_by_owner(principal.user_id).await.unwrap(),
        (NUM_UPLOADS * 100) as i64
    );
    for file in &listed {
        assert!(dir.path().join(&file.stored_name).exists());
    }
}

/// Test that concurrent deletes of one file remove it exactly once.
#[tokio::test]
async fn test_concurrent_delete_same_file() {
    let db = setup_test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ContentStore::new(dir.path()).unwrap());
    let policy = Arc::new(AccessPolicy::new(Arc::new(UnlockStore::new()), false));
    let principal = create_test_principal(&db, "deleter").await;

    let file = FileService::new(&db, &store, &policy)
        .upload(&principal, None, "once.txt", &b"only once"[..])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let db = Arc::clone(&db);
        let store = Arc::clone(&store);
        let policy = Arc::clone(&policy);
        let principal = principal.clone();
        let id = file.id;
        handles.push(tokio::spawn(async move {
            FileService::new(&db, &store, &policy)
                .delete(&principal, id)
                .await
                .is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert!(succeeded >= 1);
    assert!(!dir.path().join("once.txt").exists());
    assert!(FileRepository::new(db.pool())
        .get_by_id(file.id)
        .await
        .unwrap()
        .is_none());
}

/// Test that concurrent uploads cannot overrun the storage quota together.
///
/// Each upload fits on its own, but only one fits alongside the others.
#[tokio::test]
async fn test_concurrent_uploads_respect_quota() {
    let db = setup_test_db().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ContentStore::new(dir.path()).unwrap());
    let policy = Arc::new(AccessPolicy::new(Arc::new(UnlockStore::new()), false));
    let principal = create_test_principal(&db, "hoarder").await;

    const NUM_UPLOADS: usize = 8;

    let mut handles = Vec::new();
    for i in 0..NUM_UPLOADS {
        let db = Arc::clone(&db);
        let store = Arc::clone(&store);
        let policy = Arc::clone(&policy);
        let principal = principal.clone();
        handles.push(tokio::spawn(async move {
            let content = vec![i as u8; 600];
            FileService::new(&db, &store, &policy)
                .with_storage_limit(1000)
                .upload(&principal, None, "chunk.bin", content.as_slice())
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(file) => {
                assert_eq!(file.size, 600);
                accepted += 1;
            }
            Err(ShareboxError::TooLarge(msg)) => assert_eq!(msg, "storage quota exceeded"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(accepted, 1);

    let files = FileRepository::new(db.pool());
    assert_eq!(files.total_size_by_owner(principal.user_id).await.unwrap(), 600);

    // Rejected uploads leave no blobs behind.
    let blobs = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(blobs, 1);
}
