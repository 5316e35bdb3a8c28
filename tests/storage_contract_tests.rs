/// Integration tests for the storage backend contract, run against both backends
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use telescope::entry::{EntryType, ExceptionEntry, NewEntry, RequestEntry};
use telescope::storage::{EntryFilter, MemoryStorage, SortOrder, SqliteStorage, StorageBackend};

struct Backend {
    storage: Arc<dyn StorageBackend>,
    _dir: Option<tempfile::TempDir>,
}

async fn backends() -> Vec<Backend> {
    let memory: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    memory.connect().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("contract.db").display());
    let sqlite: Arc<dyn StorageBackend> = Arc::new(SqliteStorage::new(url));
    sqlite.connect().await.unwrap();

    vec![
        Backend {
            storage: memory,
            _dir: None,
        },
        Backend {
            storage: sqlite,
            _dir: Some(dir),
        },
    ]
}

fn request(path: &str) -> NewEntry {
    NewEntry::request(RequestEntry {
        method: "GET".to_string(),
        path: path.to_string(),
        status: 200,
        duration: 4,
        correlation_id: Some("corr-1".to_string()),
    })
}

fn exception(message: &str) -> NewEntry {
    NewEntry::exception(ExceptionEntry {
        message: message.to_string(),
        stack: "at handler (src/routes.rs:10:5)".to_string(),
        error_class: "std::io::Error".to_string(),
        file: Some("[PROJECT_ROOT]/src/routes.rs".to_string()),
        line: Some(10),
        context: None,
        correlation_id: None,
    })
}

#[tokio::test]
async fn test_round_trip() {
    for backend in backends().await {
        let storage = &backend.storage;

        let stored = storage.store_entry(request("/users")).await.unwrap();
        assert!(!stored.id.is_empty(), "{}", storage.name());

        let fetched = storage.get_entry(&stored.id).await.unwrap();
        assert_eq!(fetched, Some(stored), "{}", storage.name());
    }
}

#[tokio::test]
async fn test_unknown_id_is_none() {
    for backend in backends().await {
        let fetched = backend.storage.get_entry("does-not-exist").await.unwrap();
        assert!(fetched.is_none(), "{}", backend.storage.name());
    }
}

#[tokio::test]
async fn test_ids_are_unique_under_concurrency() {
    for backend in backends().await {
        let mut handles = Vec::new();
        for n in 0..50 {
            let storage = backend.storage.clone();
            handles.push(tokio::spawn(async move {
                storage.store_entry(request(&format!("/items/{}", n))).await.unwrap().id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 50, "{}", backend.storage.name());
        assert_eq!(backend.storage.count().await.unwrap(), 50);
    }
}

#[tokio::test]
async fn test_pagination_splits_pages() {
    for backend in backends().await {
        let storage = &backend.storage;
        let base = Utc::now();
        for n in 0..25 {
            let mut entry = request(&format!("/page/{}", n));
            entry.timestamp = base + Duration::milliseconds(n);
            storage.store_entry(entry).await.unwrap();
        }

        let first = storage
            .get_entries(&EntryFilter {
                entry_type: Some(EntryType::Request),
                page: 1,
                per_page: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        let second = storage
            .get_entries(&EntryFilter {
                entry_type: Some(EntryType::Request),
                page: 2,
                per_page: 20,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(first.entries.len(), 20);
        assert_eq!(second.entries.len(), 5);
        assert_eq!(first.pagination.total, 25);
        assert_eq!(second.pagination.current_page, 2);

        // Newest first, and the two pages do not overlap
        assert!(first.entries[0].timestamp >= first.entries[19].timestamp);
        assert!(first.entries[19].timestamp >= second.entries[0].timestamp);
        let ids: HashSet<_> = first
            .entries
            .iter()
            .chain(second.entries.iter())
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(ids.len(), 25, "{}", storage.name());
    }
}

#[tokio::test]
async fn test_page_past_end_is_empty() {
    for backend in backends().await {
        backend.storage.store_entry(request("/a")).await.unwrap();

        let page = backend
            .storage
            .get_entries(&EntryFilter {
                page: 5,
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(page.entries.is_empty());
        assert_eq!(page.pagination.total, 1);
    }
}

#[tokio::test]
async fn test_type_filter_and_sort() {
    for backend in backends().await {
        let storage = &backend.storage;
        let base = Utc::now();

        let mut older = request("/old");
        older.timestamp = base - Duration::seconds(10);
        storage.store_entry(older).await.unwrap();
        storage.store_entry(exception("boom")).await.unwrap();
        storage.store_entry(request("/new")).await.unwrap();

        let requests = storage
            .get_entries(&EntryFilter {
                entry_type: Some(EntryType::Request),
                sort: SortOrder::TimestampAsc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(requests.pagination.total, 2);
        assert!(requests
            .entries
            .iter()
            .all(|e| e.entry_type() == EntryType::Request));
        assert!(requests.entries[0].timestamp < requests.entries[1].timestamp);

        let all = storage.get_entries(&EntryFilter::default()).await.unwrap();
        assert_eq!(all.pagination.total, 3, "{}", storage.name());
    }
}

#[tokio::test]
async fn test_listing_and_point_reads_agree() {
    for backend in backends().await {
        let storage = &backend.storage;
        for n in 0..5 {
            storage.store_entry(request(&format!("/c/{}", n))).await.unwrap();
        }

        let page = storage.get_entries(&EntryFilter::default()).await.unwrap();
        for entry in page.entries {
            let fetched = storage.get_entry(&entry.id).await.unwrap();
            assert_eq!(fetched.as_ref(), Some(&entry), "{}", storage.name());
        }
    }
}

#[tokio::test]
async fn test_listeners_see_every_store_in_order() {
    for backend in backends().await {
        let storage = &backend.storage;
        let mut listener = storage.subscribe();

        let mut ids = Vec::new();
        for n in 0..10 {
            ids.push(storage.store_entry(request(&format!("/n/{}", n))).await.unwrap().id);
        }

        for id in ids {
            let seen = listener.recv().await.unwrap();
            assert_eq!(seen.id, id, "{}", storage.name());
        }
    }
}

#[tokio::test]
async fn test_invalid_filter_is_rejected() {
    for backend in backends().await {
        let result = backend
            .storage
            .get_entries(&EntryFilter {
                page: 0,
                ..Default::default()
            })
            .await;

        assert!(
            matches!(result, Err(telescope::TelescopeError::InvalidArgument(_))),
            "{}",
            backend.storage.name()
        );
    }
}

#[tokio::test]
async fn test_prune_removes_old_entries() {
    for backend in backends().await {
        let storage = &backend.storage;

        let mut old = request("/old");
        old.timestamp = Utc::now() - Duration::days(3);
        storage.store_entry(old).await.unwrap();
        let recent = storage.store_entry(request("/recent")).await.unwrap();

        let deleted = storage.prune(Utc::now() - Duration::days(1)).await.unwrap();

        assert_eq!(deleted, 1, "{}", storage.name());
        let remaining = storage.get_entries(&EntryFilter::default()).await.unwrap();
        assert_eq!(remaining.entries.len(), 1);
        assert_eq!(remaining.entries[0].id, recent.id);
    }
}

#[tokio::test]
async fn test_store_then_fetch_exception() {
    for backend in backends().await {
        let stored = backend.storage.store_entry(exception("boom")).await.unwrap();

        let fetched = backend.storage.get_entry(&stored.id).await.unwrap().unwrap();

        let value = serde_json::to_value(&fetched).unwrap();
        assert_eq!(value["type"], "exception");
        assert_eq!(value["exception"]["message"], "boom", "{}", backend.storage.name());
    }
}
