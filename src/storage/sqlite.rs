//! SQLite document backend
//!
//! Entries are stored as JSON documents with:
//! - Connection pooling
//! - Automatic migrations
//! - WAL mode for concurrent reads while capture writes
//! - A write lock that serializes insert-then-notify

use super::{EntryFilter, EntryListener, EntryNotifier, EntryPage, Pagination, SortOrder, StorageBackend};
use crate::entry::{Entry, NewEntry};
use crate::error::{Result, TelescopeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

/// SQLite-backed entry storage
pub struct SqliteStorage {
    database_url: String,
    pool: OnceCell<SqlitePool>,
    write_lock: Mutex<()>,
    notifier: EntryNotifier,
}

impl SqliteStorage {
    /// Create an unconnected backend
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite database URL (e.g., "sqlite:./data/telescope.db")
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool: OnceCell::new(),
            write_lock: Mutex::new(()),
            notifier: EntryNotifier::new(),
        }
    }

    async fn open_pool(database_url: &str) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal) // Write-Ahead Logging for concurrency
            .busy_timeout(Duration::from_secs(30))
            .pragma("synchronous", "NORMAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(5) // Limited for SQLite (single writer)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| {
                TelescopeError::StorageUnavailable(format!(
                    "failed to connect to {}: {}",
                    database_url, e
                ))
            })?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(database_url = %database_url, "Entry database migrations completed");

        Ok(pool)
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool.get().ok_or_else(|| {
            TelescopeError::StorageUnavailable("storage backend is not connected".to_string())
        })
    }

    fn decode(content: &str) -> Result<Entry> {
        Ok(serde_json::from_str(content)?)
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn connect(&self) -> Result<()> {
        self.pool
            .get_or_try_init(|| Self::open_pool(&self.database_url))
            .await?;
        Ok(())
    }

    async fn store_entry(&self, entry: NewEntry) -> Result<Entry> {
        let pool = self.pool()?;
        let stored = entry.into_entry(Uuid::new_v4().to_string());
        let content = serde_json::to_string(&stored)?;

        let _guard = self.write_lock.lock().await;

        sqlx::query(
            "INSERT INTO entries (id, entry_type, timestamp, content)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&stored.id)
        .bind(stored.entry_type().as_str())
        .bind(stored.timestamp.timestamp_micros())
        .bind(&content)
        .execute(pool)
        .await?;

        self.notifier.notify(&stored);

        tracing::debug!(
            entry_id = %stored.id,
            entry_type = %stored.entry_type(),
            "Stored entry in SQLite"
        );
        Ok(stored)
    }

    async fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let row = sqlx::query("SELECT content FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?;

        row.map(|row| Self::decode(row.get::<&str, _>("content")))
            .transpose()
    }

    async fn get_entries(&self, filter: &EntryFilter) -> Result<EntryPage> {
        filter.validate()?;
        let pool = self.pool()?;

        let order = match filter.sort {
            SortOrder::TimestampDesc => "timestamp DESC, seq DESC",
            SortOrder::TimestampAsc => "timestamp ASC, seq ASC",
        };
        let type_name = filter.entry_type.map(|t| t.as_str());

        // One read snapshot for the count and the page
        let mut tx = pool.begin().await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entries WHERE (?1 IS NULL OR entry_type = ?1)",
        )
        .bind(type_name)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            "SELECT content FROM entries
             WHERE (?1 IS NULL OR entry_type = ?1)
             ORDER BY {}
             LIMIT ?2 OFFSET ?3",
            order
        );
        let rows = sqlx::query(&sql)
            .bind(type_name)
            .bind(filter.per_page as i64)
            .bind(filter.offset() as i64)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let entries = rows
            .iter()
            .map(|row| Self::decode(row.get::<&str, _>("content")))
            .collect::<Result<Vec<_>>>()?;

        Ok(EntryPage {
            entries,
            pagination: Pagination {
                current_page: filter.page,
                per_page: filter.per_page,
                total: total as u64,
            },
        })
    }

    fn subscribe(&self) -> EntryListener {
        self.notifier.subscribe()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(self.pool()?)
            .await?;
        Ok(count as u64)
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM entries WHERE timestamp < ?")
            .bind(before.timestamp_micros())
            .execute(self.pool()?)
            .await?;

        let deleted = result.rows_affected();
        tracing::info!(deleted = deleted, "Pruned old entries");
        Ok(deleted)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
