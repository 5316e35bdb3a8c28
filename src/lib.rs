//! Embedded observability collector
//!
//! Captures requests, exceptions, data-store queries and custom events from a
//! host service, persists them through a pluggable [`storage::StorageBackend`]
//! and serves them to dashboard clients both as paginated history and as a
//! live push channel.

pub mod capture;
pub mod config;
pub mod entry;
pub mod error;
pub mod handlers;
pub mod live;
pub mod metrics;
pub mod query;
pub mod retention;
pub mod server;
pub mod signals;
pub mod storage;

pub use capture::{CaptureContext, Collector};
pub use entry::{Entry, EntryType, NewEntry};
pub use error::{Result, TelescopeError};
pub use server::Telescope;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` overrides `level`. `format` is `"json"` or anything else for
/// human-readable text. Can only be called once per process.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
