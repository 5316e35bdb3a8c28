//! Inbound request capture
//!
//! `capture_requests` is an axum middleware: it establishes the
//! [`CaptureContext`] for the request (reusing an incoming `x-request-id`
//! header when present), makes it available to handlers as an extension and
//! records the finished request.

use super::{CaptureContext, Collector};
use crate::entry::{EntryType, NewEntry, RequestEntry};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::time::{Duration, Instant};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A finished request as seen by the host's HTTP layer
#[derive(Debug, Clone)]
pub struct RequestObservation {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration: Duration,
    pub context: Option<CaptureContext>,
}

#[derive(Clone)]
pub struct RequestCapture {
    collector: Collector,
}

impl RequestCapture {
    pub(crate) fn new(collector: Collector) -> Self {
        Self { collector }
    }

    pub fn is_enabled(&self) -> bool {
        self.collector.is_watching(EntryType::Request)
    }

    pub fn record(&self, observation: RequestObservation) -> bool {
        if !self.is_enabled() {
            return false;
        }

        self.collector.record(NewEntry::request(RequestEntry {
            method: observation.method,
            path: observation.path,
            status: observation.status,
            duration: observation.duration.as_millis() as u64,
            correlation_id: observation
                .context
                .map(|ctx| ctx.correlation_id().to_string()),
        }))
    }
}

/// Middleware recording every request outside the dashboard's own routes
pub async fn capture_requests(
    State(collector): State<Collector>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let prefix = collector.config().normalized_prefix();
    if path == prefix || path.starts_with(&format!("{}/", prefix)) {
        return next.run(request).await;
    }

    let ctx = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(CaptureContext::with_correlation_id)
        .unwrap_or_default();
    request.extensions_mut().insert(ctx.clone());

    let method = request.method().to_string();
    let start = Instant::now();
    let response = next.run(request).await;

    collector.requests().record(RequestObservation {
        method,
        path,
        status: response.status().as_u16(),
        duration: start.elapsed(),
        context: Some(ctx),
    });

    response
}
