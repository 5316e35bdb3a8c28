//! Dashboard HTTP API

use super::TelescopeState;
use crate::entry::Entry;
use crate::error::AppError;
use crate::query::EntryQuery;
use crate::storage::EntryPage;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub route_prefix: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub entries: u64,
    pub sessions: usize,
}

/// GET /config - route prefix for the dashboard client
pub async fn client_config(State(state): State<TelescopeState>) -> Json<ClientConfig> {
    Json(ClientConfig {
        route_prefix: state.config.normalized_prefix(),
    })
}

/// GET {prefix}/api/entries?type=request&page=1&perPage=20&sort=-timestamp
pub async fn list_entries(
    State(state): State<TelescopeState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<EntryPage>, AppError> {
    let page = state.queries.entries(query).await.map_err(|e| {
        tracing::warn!(error = %e, "Entry listing failed");
        AppError::from(e)
    })?;

    Ok(Json(page))
}

/// GET {prefix}/api/entries/:id
pub async fn get_entry(
    State(state): State<TelescopeState>,
    Path(id): Path<String>,
) -> Result<Json<Entry>, AppError> {
    match state.queries.entry(&id).await? {
        Some(entry) => Ok(Json(entry)),
        None => Err(AppError::NotFound(format!("Entry {} not found", id))),
    }
}

/// GET {prefix}/api/health
pub async fn health(State(state): State<TelescopeState>) -> Result<Json<HealthResponse>, AppError> {
    let entries = state.queries.count().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        backend: state.queries.backend_name(),
        entries,
        sessions: state.sessions.session_count(),
    }))
}
