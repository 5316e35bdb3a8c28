//! Periodic pruning of old entries
//!
//! Enabled when `storage.retention_hours > 0`.

use crate::error::Result;
use crate::storage::StorageBackend;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Entries older than this are deleted
    pub max_age: Duration,
    /// How often to prune
    pub check_interval: Duration,
}

impl RetentionConfig {
    /// `None` when retention is disabled (`hours == 0`)
    pub fn from_hours(hours: u64) -> Option<Self> {
        if hours == 0 {
            return None;
        }

        let max_age = Duration::from_secs(hours * 3600);
        Some(Self {
            max_age,
            // Prune a few times per retention window, at most hourly
            check_interval: (max_age / 4).min(Duration::from_secs(3600)),
        })
    }
}

/// Spawn the background pruning task
pub fn spawn_retention_task(
    storage: Arc<dyn StorageBackend>,
    config: RetentionConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        retention_loop(storage, config).await;
    })
}

async fn retention_loop(storage: Arc<dyn StorageBackend>, config: RetentionConfig) {
    let mut interval = time::interval(config.check_interval);

    loop {
        interval.tick().await;

        if let Err(e) = prune_now(storage.as_ref(), config.max_age).await {
            tracing::error!(error = %e, backend = storage.name(), "Retention pruning failed");
        }
    }
}

/// Delete every entry older than `max_age`, returning how many were removed
pub async fn prune_now(storage: &dyn StorageBackend, max_age: Duration) -> Result<u64> {
    let max_age = ChronoDuration::from_std(max_age).unwrap_or_else(|_| ChronoDuration::days(365 * 100));
    let cutoff = Utc::now()
        .checked_sub_signed(max_age)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

    let deleted = storage.prune(cutoff).await?;
    if deleted > 0 {
        tracing::info!(deleted, cutoff = %cutoff, "Pruned expired entries");
    }

    Ok(deleted)
}
