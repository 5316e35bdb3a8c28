//! Data-store query instrumentation
//!
//! Wraps an operation future instead of hooking the data layer:
//!
//! ```ignore
//! let users = collector
//!     .queries()
//!     .instrument(Some(&ctx), QuerySpec::new("find", "users").describe(&filter), repo.find(&filter))
//!     .await?;
//! ```

use super::{correlation_of, CaptureContext, Collector};
use crate::entry::{EntryType, NewEntry, QueryEntry};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

/// Description of one data-store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub operation: String,
    pub collection: String,
    pub query: String,
}

impl QuerySpec {
    pub fn new(operation: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            collection: collection.into(),
            query: String::new(),
        }
    }

    /// Attach a serialized description of the query (filter, update document, SQL params...)
    pub fn describe<Q: Serialize + ?Sized>(mut self, query: &Q) -> Self {
        self.query = serde_json::to_string(query).unwrap_or_else(|e| format!("<unserializable: {}>", e));
        self
    }

    /// Attach a raw query text (e.g. SQL)
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.query = text.into();
        self
    }
}

#[derive(Clone)]
pub struct QueryCapture {
    collector: Collector,
}

impl QueryCapture {
    pub(crate) fn new(collector: Collector) -> Self {
        Self { collector }
    }

    /// Query capture needs both the watch-set entry and query logging
    pub fn is_enabled(&self) -> bool {
        self.collector.is_watching(EntryType::Query) && self.collector.config().enable_query_logging
    }

    /// Run `operation`, record its timing and a result preview, and return its result untouched
    pub async fn instrument<T, E, Fut>(
        &self,
        ctx: Option<&CaptureContext>,
        spec: QuerySpec,
        operation: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        if !self.is_enabled() {
            return operation.await;
        }

        let start = Instant::now();
        let result = operation.await;
        let duration = start.elapsed().as_millis() as u64;

        let limit = self.collector.config().query_result_limit;
        let (preview, error) = match &result {
            Ok(value) => {
                let serialized = serde_json::to_string(value)
                    .unwrap_or_else(|e| format!("<unserializable: {}>", e));
                (truncate_preview(&serialized, limit), None)
            }
            Err(e) => (String::new(), Some(truncate_preview(&e.to_string(), limit))),
        };

        self.collector.record(NewEntry::query(QueryEntry {
            operation: spec.operation,
            query: spec.query,
            collection: spec.collection,
            duration,
            result: preview,
            error,
            correlation_id: correlation_of(ctx),
        }));

        result
    }
}

/// Keep at most `limit` characters
pub fn truncate_preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
