//! Storage-to-session bridge
//!
//! A single task drains one storage listener and hands every entry to
//! [`SessionManager::dispatch`] in the order the backend emitted them.

use super::session::SessionManager;
use crate::storage::{EntryListener, StorageBackend};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct EventBus {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl EventBus {
    /// Subscribe to `storage` and start forwarding to `sessions`
    pub fn spawn(storage: &Arc<dyn StorageBackend>, sessions: SessionManager) -> Self {
        let listener = storage.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tracing::debug!(listener = listener.id(), backend = storage.name(), "Event bus subscribed");

        let handle = tokio::spawn(async move {
            forward_loop(listener, sessions, shutdown_rx).await;
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop forwarding and wait for the task to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Event bus task ended abnormally");
        }
    }
}

async fn forward_loop(
    mut listener: EntryListener,
    sessions: SessionManager,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            next = listener.recv() => match next {
                Some(entry) => sessions.dispatch(&entry),
                None => break,
            },
            _ = &mut shutdown_rx => break,
        }
    }

    tracing::info!("Event bus stopped");
}
