//! Capture adapters
//!
//! Adapters turn runtime signals into [`NewEntry`] values and hand them to a
//! background writer that calls the storage backend. Capturing never blocks
//! and never fails from the caller's point of view:
//!
//! ```text
//! host code ──▶ adapter (watch-set check) ──▶ unbounded queue ──▶ writer task ──▶ StorageBackend
//!                                                                    │
//!                                                              errors logged
//! ```

pub mod exception;
pub mod hooks;
pub mod query;
pub mod request;
pub mod source;

use crate::config::TelescopeConfig;
use crate::entry::{CustomEntry, EntryPayload, EntryType, NewEntry};
use crate::storage::StorageBackend;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub use exception::ExceptionCapture;
pub use hooks::{install_panic_hook, panic_hook_installed, uninstall_panic_hook};
pub use query::{QueryCapture, QuerySpec};
pub use request::{capture_requests, RequestCapture, RequestObservation};

/// Per-unit-of-work handle carrying the correlation id
///
/// Created once when a request (or job) begins and passed to every capture
/// made on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureContext {
    correlation_id: String,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl Default for CaptureContext {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn correlation_of(ctx: Option<&CaptureContext>) -> Option<String> {
    ctx.map(|c| c.correlation_id.clone())
}

/// Source location whose surrounding lines should be attached to an exception
#[derive(Debug, Clone)]
pub(crate) struct SourceRequest {
    pub path: PathBuf,
    pub line: u32,
}

#[derive(Debug)]
enum WriterMessage {
    Store {
        entry: NewEntry,
        source: Option<SourceRequest>,
    },
    Flush(oneshot::Sender<()>),
}

struct CollectorInner {
    sender: mpsc::UnboundedSender<WriterMessage>,
    watch_set: BTreeSet<EntryType>,
    config: TelescopeConfig,
}

/// Shared capture entry point
///
/// Cheap to clone; every clone feeds the same writer task.
#[derive(Clone)]
pub struct Collector {
    inner: Arc<CollectorInner>,
}

impl Collector {
    /// Spawn the background writer task and return a handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(storage: Arc<dyn StorageBackend>, config: TelescopeConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            writer_task(storage, rx).await;
        });

        Self {
            inner: Arc::new(CollectorInner {
                sender: tx,
                watch_set: config.watch_set(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &TelescopeConfig {
        &self.inner.config
    }

    pub fn is_watching(&self, entry_type: EntryType) -> bool {
        self.inner.watch_set.contains(&entry_type)
    }

    /// Queue an entry for storage if its type is watched
    ///
    /// Returns whether the entry was accepted.
    pub fn record(&self, entry: NewEntry) -> bool {
        self.enqueue(entry, None)
    }

    pub(crate) fn enqueue(&self, entry: NewEntry, source: Option<SourceRequest>) -> bool {
        if !self.is_watching(entry.entry_type()) {
            return false;
        }

        let entry_type = entry.entry_type();
        match self.inner.sender.send(WriterMessage::Store { entry, source }) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(entry_type = %entry_type, "Capture writer is gone, entry dropped");
                crate::metrics::record_capture_failure("writer_closed");
                false
            }
        }
    }

    /// Record an application-defined entry
    pub fn record_custom(
        &self,
        ctx: Option<&CaptureContext>,
        name: impl Into<String>,
        data: serde_json::Value,
    ) -> bool {
        self.record(NewEntry::custom(CustomEntry {
            name: name.into(),
            data,
            correlation_id: correlation_of(ctx),
        }))
    }

    /// Wait until everything queued before this call has been handled
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inner.sender.send(WriterMessage::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn exceptions(&self) -> ExceptionCapture {
        ExceptionCapture::new(self.clone())
    }

    pub fn queries(&self) -> QueryCapture {
        QueryCapture::new(self.clone())
    }

    pub fn requests(&self) -> RequestCapture {
        RequestCapture::new(self.clone())
    }
}

/// Background writer task
///
/// Stores entries one at a time in capture order. Failures are logged and
/// counted, never propagated.
async fn writer_task(
    storage: Arc<dyn StorageBackend>,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMessage::Store { mut entry, source } => {
                if let Some(source) = source {
                    attach_source_context(&mut entry, &source).await;
                }

                let entry_type = entry.entry_type();
                match storage.store_entry(entry).await {
                    Ok(stored) => {
                        crate::metrics::record_entry_stored(entry_type);
                        tracing::trace!(entry_id = %stored.id, entry_type = %entry_type, "Captured entry stored");
                    }
                    Err(e) => {
                        crate::metrics::record_capture_failure("storage");
                        tracing::error!(
                            error = %e,
                            entry_type = %entry_type,
                            backend = storage.name(),
                            "Failed to store captured entry"
                        );
                    }
                }
            }
            WriterMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::info!("Capture writer task shutting down");
}

async fn attach_source_context(entry: &mut NewEntry, source: &SourceRequest) {
    let EntryPayload::Exception { exception } = &mut entry.payload else {
        return;
    };

    match source::read_context(&source.path, source.line).await {
        Ok(context) => exception.context = Some(context),
        Err(e) => {
            // Best-effort: the entry is stored without context
            crate::metrics::record_capture_failure("source_context");
            tracing::debug!(
                error = %e,
                path = %source.path.display(),
                line = source.line,
                "Source context unavailable"
            );
        }
    }
}
