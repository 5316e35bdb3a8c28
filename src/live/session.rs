//! Live session registry
//!
//! Each connected dashboard client is a session with an outbound FIFO channel
//! and an optional watch. Session lifecycle:
//!
//! ```text
//! connect ──▶ Connected ──GET_INITIAL_ENTRIES──▶ Watching(type, page, perPage) ──disconnect──▶ Closed
//!                 │                                  │   ▲
//!                 │                                  └───┘ GET_INITIAL_ENTRIES (replace)
//!                 └──────────────disconnect──────────────▶ Closed
//! ```
//!
//! A rejected `GET_INITIAL_ENTRIES` leaves the session state untouched.

use super::protocol::{ClientMessage, ServerMessage, WatchRequest};
use crate::entry::{Entry, EntryType};
use crate::query::{EntryQuery, QueryService};
use crate::storage::EntryFilter;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Entry types a watch covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    /// Every entry type ("all")
    All,
    Type(EntryType),
}

impl WatchTarget {
    pub fn matches(&self, entry_type: EntryType) -> bool {
        match self {
            Self::All => true,
            Self::Type(t) => *t == entry_type,
        }
    }
}

impl From<Option<EntryType>> for WatchTarget {
    fn from(entry_type: Option<EntryType>) -> Self {
        entry_type.map_or(Self::All, Self::Type)
    }
}

/// What a session is currently watching, and the page it last asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    pub target: WatchTarget,
    pub page: u32,
    pub per_page: u32,
}

impl Watch {
    pub fn matches(&self, entry_type: EntryType) -> bool {
        self.target.matches(entry_type)
    }
}

impl From<&EntryFilter> for Watch {
    fn from(filter: &EntryFilter) -> Self {
        Self {
            target: filter.entry_type.into(),
            page: filter.page,
            per_page: filter.per_page,
        }
    }
}

struct Session {
    sender: mpsc::UnboundedSender<ServerMessage>,
    /// `None` until the first `GET_INITIAL_ENTRIES`
    watch: Option<Watch>,
}

struct SessionManagerInner {
    next_id: AtomicU64,
    sessions: DashMap<SessionId, Session>,
    queries: QueryService,
}

/// Registry of live sessions, shared by the transport and the event bus
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

impl SessionManager {
    pub fn new(queries: QueryService) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                next_id: AtomicU64::new(1),
                sessions: DashMap::new(),
                queries,
            }),
        }
    }

    /// Register a new session; messages for it arrive on the returned receiver
    pub fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.sessions.insert(
            id,
            Session {
                sender: tx,
                watch: None,
            },
        );

        crate::metrics::set_live_sessions(self.session_count());
        tracing::debug!(session = %id, "Live session connected");
        (id, rx)
    }

    pub fn disconnect(&self, id: SessionId) {
        if self.inner.sessions.remove(&id).is_some() {
            crate::metrics::set_live_sessions(self.session_count());
            tracing::debug!(session = %id, "Live session closed");
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn watch_of(&self, id: SessionId) -> Option<Watch> {
        self.inner.sessions.get(&id).and_then(|s| s.watch)
    }

    /// Process one client message
    pub async fn handle(&self, id: SessionId, message: ClientMessage) {
        let reply = match message {
            ClientMessage::GetInitialEntries(request) => self.initial_entries(id, request).await,
            ClientMessage::GetEntryDetails(request) => match self.inner.queries.entry(&request.id).await {
                Ok(Some(entry)) => ServerMessage::EntryDetails(entry),
                Ok(None) => ServerMessage::error("Entry not found"),
                Err(e) => {
                    tracing::warn!(session = %id, entry_id = %request.id, error = %e, "Entry lookup failed");
                    ServerMessage::error(e.to_string())
                }
            },
        };

        self.push(id, reply);
    }

    async fn initial_entries(&self, id: SessionId, request: WatchRequest) -> ServerMessage {
        let query = EntryQuery {
            entry_type: Some(request.entry_type),
            page: Some(request.page),
            per_page: Some(request.per_page),
            sort: None,
        };
        let filter = match query.into_filter() {
            Ok(filter) => filter,
            Err(e) => return ServerMessage::error(e.to_string()),
        };

        // Watch before reading so entries stored during the snapshot are still pushed
        match self.inner.sessions.get_mut(&id) {
            Some(mut session) => session.watch = Some(Watch::from(&filter)),
            None => return ServerMessage::error("Session closed"),
        }

        match self.inner.queries.page(&filter).await {
            Ok(page) => page.into(),
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "Initial entries query failed");
                ServerMessage::error(e.to_string())
            }
        }
    }

    /// Push a newly stored entry to every session watching its type
    pub fn dispatch(&self, entry: &Entry) {
        let entry_type = entry.entry_type();
        let mut closed = Vec::new();

        for session in self.inner.sessions.iter() {
            let watching = session.watch.is_some_and(|w| w.matches(entry_type));
            if !watching {
                continue;
            }

            if session.sender.send(ServerMessage::NewEntry(entry.clone())).is_ok() {
                crate::metrics::record_live_push();
            } else {
                closed.push(*session.key());
            }
        }

        for id in closed {
            self.disconnect(id);
        }
    }

    /// Queue a message for one session
    pub fn push(&self, id: SessionId, message: ServerMessage) {
        let Some(session) = self.inner.sessions.get(&id) else {
            return;
        };

        if session.sender.send(message).is_err() {
            drop(session);
            self.disconnect(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CustomEntry, NewEntry, RequestEntry};
    use crate::live::protocol::EntryIdRequest;
    use crate::storage::{MemoryStorage, StorageBackend};

    fn request(path: &str) -> NewEntry {
        NewEntry::request(RequestEntry {
            method: "GET".to_string(),
            path: path.to_string(),
            status: 200,
            duration: 1,
            correlation_id: None,
        })
    }

    fn create_test_manager() -> (Arc<MemoryStorage>, SessionManager) {
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(QueryService::new(storage.clone()));
        (storage, manager)
    }

    fn watch(entry_type: &str) -> ClientMessage {
        watch_page(entry_type, 1, 20)
    }

    fn watch_page(entry_type: &str, page: u32, per_page: u32) -> ClientMessage {
        ClientMessage::GetInitialEntries(WatchRequest {
            entry_type: entry_type.to_string(),
            page,
            per_page,
        })
    }

    #[tokio::test]
    async fn test_initial_entries_then_watching() {
        let (storage, manager) = create_test_manager();
        storage.store_entry(request("/a")).await.unwrap();

        let (id, mut rx) = manager.connect();
        assert_eq!(manager.watch_of(id), None);

        manager.handle(id, watch("request")).await;
        match rx.recv().await.unwrap() {
            ServerMessage::InitialEntries { entries, pagination } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(pagination.total, 1);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(
            manager.watch_of(id),
            Some(Watch {
                target: WatchTarget::Type(EntryType::Request),
                page: 1,
                per_page: 20,
            })
        );
    }

    #[tokio::test]
    async fn test_connected_session_receives_no_pushes() {
        let (storage, manager) = create_test_manager();
        let (_id, mut rx) = manager.connect();

        let entry = storage.store_entry(request("/a")).await.unwrap();
        manager.dispatch(&entry);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_respects_watch_type() {
        let (storage, manager) = create_test_manager();
        let (requests_id, mut requests_rx) = manager.connect();
        let (exceptions_id, mut exceptions_rx) = manager.connect();
        manager.handle(requests_id, watch("request")).await;
        manager.handle(exceptions_id, watch("exception")).await;
        requests_rx.recv().await.unwrap();
        exceptions_rx.recv().await.unwrap();

        let entry = storage.store_entry(request("/a")).await.unwrap();
        manager.dispatch(&entry);

        match requests_rx.recv().await.unwrap() {
            ServerMessage::NewEntry(pushed) => assert_eq!(pushed.id, entry.id),
            other => panic!("unexpected message {:?}", other),
        }
        assert!(exceptions_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watch_is_replaced() {
        let (_storage, manager) = create_test_manager();
        let (id, mut rx) = manager.connect();

        manager.handle(id, watch("request")).await;
        manager.handle(id, watch_page("all", 3, 500)).await;
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        assert_eq!(
            manager.watch_of(id),
            Some(Watch {
                target: WatchTarget::All,
                page: 3,
                per_page: 100,
            })
        );
    }

    #[tokio::test]
    async fn test_rejected_page_leaves_session_connected() {
        let (storage, manager) = create_test_manager();
        let (id, mut rx) = manager.connect();

        manager.handle(id, watch_page("custom", 0, 20)).await;
        match rx.recv().await.unwrap() {
            ServerMessage::Error(payload) => assert!(payload.message.contains("page")),
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(manager.watch_of(id), None);

        let entry = storage
            .store_entry(NewEntry::custom(CustomEntry {
                name: "deploy".to_string(),
                data: serde_json::Value::Null,
                correlation_id: None,
            }))
            .await
            .unwrap();
        manager.dispatch(&entry);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_previous_watch() {
        let (_storage, manager) = create_test_manager();
        let (id, mut rx) = manager.connect();
        manager.handle(id, watch_page("request", 2, 10)).await;
        rx.recv().await.unwrap();
        let before = manager.watch_of(id);

        manager.handle(id, watch_page("exception", 1, 0)).await;
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Error(_)));

        assert_eq!(manager.watch_of(id), before);
    }

    #[tokio::test]
    async fn test_invalid_watch_type_replies_error() {
        let (_storage, manager) = create_test_manager();
        let (id, mut rx) = manager.connect();

        manager.handle(id, watch("span")).await;
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Error(_)));
        assert_eq!(manager.watch_of(id), None);
    }

    #[tokio::test]
    async fn test_entry_details() {
        let (storage, manager) = create_test_manager();
        let entry = storage.store_entry(request("/a")).await.unwrap();
        let (id, mut rx) = manager.connect();

        manager
            .handle(id, ClientMessage::GetEntryDetails(EntryIdRequest { id: entry.id.clone() }))
            .await;
        assert_eq!(rx.recv().await.unwrap(), ServerMessage::EntryDetails(entry));

        manager
            .handle(id, ClientMessage::GetEntryDetails(EntryIdRequest { id: "missing".to_string() }))
            .await;
        match rx.recv().await.unwrap() {
            ServerMessage::Error(payload) => assert_eq!(payload.message, "Entry not found"),
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(manager.watch_of(id), None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_removes_session() {
        let (storage, manager) = create_test_manager();
        let (id, mut rx) = manager.connect();
        manager.handle(id, watch("all")).await;
        rx.recv().await.unwrap();
        drop(rx);

        let entry = storage.store_entry(request("/a")).await.unwrap();
        manager.dispatch(&entry);

        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_stops_pushes() {
        let (storage, manager) = create_test_manager();
        let (id, mut rx) = manager.connect();
        manager.handle(id, watch("all")).await;
        rx.recv().await.unwrap();

        manager.disconnect(id);
        let entry = storage.store_entry(request("/a")).await.unwrap();
        manager.dispatch(&entry);

        assert_eq!(manager.session_count(), 0);
        assert!(rx.recv().await.is_none());
    }
}
