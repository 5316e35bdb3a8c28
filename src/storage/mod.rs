//! Pluggable entry storage
//!
//! A backend persists entries, assigns ids, answers point and paginated reads
//! and notifies listeners of every successfully stored entry.
//!
//! ```text
//! Capture ──store_entry──▶ StorageBackend ──notify──▶ listeners (EventBus, ...)
//!                               ▲
//! QueryService ──get_entries────┘
//! ```

pub mod memory;
pub mod notify;
pub mod sqlite;

use crate::config::{StorageConfig, StorageKind};
use crate::entry::{Entry, EntryType, NewEntry};
use crate::error::{Result, TelescopeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use memory::MemoryStorage;
pub use notify::{EntryListener, EntryNotifier};
pub use sqlite::SqliteStorage;

/// Sort key for historical reads; ties are broken by storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    TimestampDesc,
    TimestampAsc,
}

impl FromStr for SortOrder {
    type Err = TelescopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "desc" | "-timestamp" | "timestamp:desc" => Ok(Self::TimestampDesc),
            "asc" | "timestamp" | "timestamp:asc" => Ok(Self::TimestampAsc),
            other => Err(TelescopeError::InvalidArgument(format!(
                "unsupported sort: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimestampDesc => f.write_str("-timestamp"),
            Self::TimestampAsc => f.write_str("timestamp"),
        }
    }
}

/// Filter for a page of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    /// `None` means all types
    pub entry_type: Option<EntryType>,
    /// 1-based
    pub page: u32,
    pub per_page: u32,
    pub sort: SortOrder,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            entry_type: None,
            page: 1,
            per_page: 20,
            sort: SortOrder::default(),
        }
    }
}

impl EntryFilter {
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(TelescopeError::InvalidArgument(
                "page must be >= 1".to_string(),
            ));
        }
        if self.per_page < 1 {
            return Err(TelescopeError::InvalidArgument(
                "perPage must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Zero-based offset of the first entry on this page
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }

    pub fn matches(&self, entry_type: EntryType) -> bool {
        self.entry_type.map_or(true, |t| t == entry_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// One page of entries plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPage {
    pub entries: Vec<Entry>,
    pub pagination: Pagination,
}

/// Storage capability contract
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Establish connectivity; calling again once connected is a no-op
    async fn connect(&self) -> Result<()>;

    /// Persist an entry, assign its id and notify listeners
    async fn store_entry(&self, entry: NewEntry) -> Result<Entry>;

    /// Point lookup; `Ok(None)` when the id does not exist
    async fn get_entry(&self, id: &str) -> Result<Option<Entry>>;

    async fn get_entries(&self, filter: &EntryFilter) -> Result<EntryPage>;

    /// Register a new-entry listener
    fn subscribe(&self) -> EntryListener;

    async fn count(&self) -> Result<u64>;

    /// Delete entries older than `before`, returning how many were removed
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64>;

    fn name(&self) -> &'static str;
}

/// Build the backend selected by configuration (not yet connected)
pub fn from_config(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match config.backend {
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        StorageKind::Sqlite => Arc::new(SqliteStorage::new(&config.database_url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse() {
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::TimestampDesc);
        assert_eq!("-timestamp".parse::<SortOrder>().unwrap(), SortOrder::TimestampDesc);
        assert_eq!("timestamp".parse::<SortOrder>().unwrap(), SortOrder::TimestampAsc);
        assert!("duration".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_filter_validation() {
        assert!(EntryFilter::default().validate().is_ok());

        let zero_page = EntryFilter { page: 0, ..Default::default() };
        assert!(matches!(
            zero_page.validate(),
            Err(TelescopeError::InvalidArgument(_))
        ));

        let zero_per_page = EntryFilter { per_page: 0, ..Default::default() };
        assert!(zero_per_page.validate().is_err());
    }

    #[test]
    fn test_offset() {
        let filter = EntryFilter { page: 3, per_page: 20, ..Default::default() };
        assert_eq!(filter.offset(), 40);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let value = serde_json::to_value(Pagination {
            current_page: 2,
            per_page: 20,
            total: 25,
        })
        .unwrap();
        assert_eq!(value["currentPage"], 2);
        assert_eq!(value["perPage"], 20);
        assert_eq!(value["total"], 25);
    }
}
