pub mod api;
pub mod metrics_handler;

use crate::config::TelescopeConfig;
use crate::live::{self, SessionManager};
use crate::query::QueryService;
use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;

/// Shared state of the dashboard routes
#[derive(Clone, FromRef)]
pub struct TelescopeState {
    pub config: TelescopeConfig,
    pub queries: QueryService,
    pub sessions: SessionManager,
}

/// Dashboard routes: `/config` plus everything under the route prefix
pub fn router(state: TelescopeState) -> Router {
    let prefix = state.config.normalized_prefix();

    Router::new()
        .route("/config", get(api::client_config))
        .route(&format!("{}/api/entries", prefix), get(api::list_entries))
        .route(&format!("{}/api/entries/:id", prefix), get(api::get_entry))
        .route(&format!("{}/api/health", prefix), get(api::health))
        .route(&format!("{}/ws", prefix), get(live::ws_handler))
        .with_state(state)
}
