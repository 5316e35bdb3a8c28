use crate::entry::EntryType;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder
///
/// Returns `None` if a recorder is already installed (e.g., in tests).
pub fn init_metrics() -> Option<PrometheusHandle> {
    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            return None;
        }
    };

    init_metric_descriptions();
    Some(handle)
}

fn init_metric_descriptions() {
    describe_counter!(
        "telescope_entries_stored_total",
        "Entries persisted by the capture writer"
    );
    describe_counter!(
        "telescope_capture_failures_total",
        "Captures that could not be stored or enriched"
    );
    describe_counter!(
        "telescope_live_pushes_total",
        "NEW_ENTRY messages pushed to live sessions"
    );
    describe_gauge!("telescope_live_sessions", "Connected live sessions");

    gauge!("telescope_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_entry_stored(entry_type: EntryType) {
    counter!("telescope_entries_stored_total", "type" => entry_type.as_str()).increment(1);
}

pub fn record_capture_failure(kind: &'static str) {
    counter!("telescope_capture_failures_total", "kind" => kind).increment(1);
}

pub fn record_live_push() {
    counter!("telescope_live_pushes_total").increment(1);
}

pub fn set_live_sessions(count: usize) {
    gauge!("telescope_live_sessions").set(count as f64);
}
