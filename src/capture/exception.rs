//! Exception capture
//!
//! Turns Rust errors, panics and failed background tasks into exception
//! entries. The faulting location comes from `#[track_caller]` (errors) or
//! the panic location; surrounding source lines are attached later by the
//! writer task when file reading is allowed.

use super::source::scrub_project_root;
use super::{correlation_of, CaptureContext, Collector, SourceRequest};
use crate::entry::{EntryType, ExceptionEntry, NewEntry};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::Write as _;
use std::future::Future;
use std::panic::Location;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ExceptionCapture {
    collector: Collector,
}

impl ExceptionCapture {
    pub(crate) fn new(collector: Collector) -> Self {
        Self { collector }
    }

    pub fn is_enabled(&self) -> bool {
        self.collector.is_watching(EntryType::Exception)
    }

    /// Capture an error at the caller's location
    #[track_caller]
    pub fn report<E>(&self, ctx: Option<&CaptureContext>, error: &E) -> bool
    where
        E: Error + ?Sized,
    {
        let location = Location::caller();
        if !self.is_enabled() {
            return false;
        }

        let stack = error_stack(error);
        self.capture(
            ctx,
            error.to_string(),
            stack,
            std::any::type_name::<E>().to_string(),
            Some(location),
        )
    }

    /// Capture a panic payload (a thrown value that is not an `Error`)
    pub fn report_panic(
        &self,
        ctx: Option<&CaptureContext>,
        payload: &(dyn Any + Send),
        location: Option<&Location<'_>>,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let message = panic_message(payload);
        let mut stack = format!("panicked: {}", message);
        if let Some(location) = location {
            let _ = write!(stack, "\n  at {}:{}:{}", location.file(), location.line(), location.column());
        }
        append_backtrace(&mut stack);

        self.capture(ctx, message, stack, "panic".to_string(), location)
    }

    /// Spawn a fallible task and capture its error outcome
    ///
    /// The task's result is passed through untouched.
    #[track_caller]
    pub fn watch_task<F, T, E>(&self, ctx: Option<CaptureContext>, task: F) -> JoinHandle<Result<T, E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        let location = Location::caller();
        let capture = self.clone();

        tokio::spawn(async move {
            let result = task.await;
            if let Err(error) = &result {
                if capture.is_enabled() {
                    capture.capture(
                        ctx.as_ref(),
                        error.to_string(),
                        error_stack(error),
                        std::any::type_name::<E>().to_string(),
                        Some(location),
                    );
                }
            }
            result
        })
    }

    fn capture(
        &self,
        ctx: Option<&CaptureContext>,
        message: String,
        stack: String,
        error_class: String,
        location: Option<&Location<'_>>,
    ) -> bool {
        let config = self.collector.config();
        let root = config.resolved_project_root();

        let resolved = location.map(|loc| (resolve_path(loc.file(), root.as_deref()), loc.line()));

        let source = resolved
            .as_ref()
            .filter(|_| config.file_reading_allowed())
            .map(|(path, line)| SourceRequest {
                path: path.clone(),
                line: *line,
            });

        let entry = NewEntry::exception(ExceptionEntry {
            message,
            stack: scrub_project_root(&stack, root.as_deref()),
            error_class,
            file: resolved
                .as_ref()
                .map(|(path, _)| scrub_project_root(&path.to_string_lossy(), root.as_deref())),
            line: resolved.as_ref().map(|(_, line)| *line),
            context: None,
            correlation_id: correlation_of(ctx),
        });

        self.collector.enqueue(entry, source)
    }
}

/// Relative locations are relative to the project root
fn resolve_path(file: &str, root: Option<&Path>) -> PathBuf {
    let path = Path::new(file);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

fn error_stack<E: Error + ?Sized>(error: &E) -> String {
    let mut stack = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(stack, "\nCaused by: {}", cause);
        source = cause.source();
    }
    append_backtrace(&mut stack);
    stack
}

fn append_backtrace(stack: &mut String) {
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        let _ = write!(stack, "\n{}", backtrace);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
