//! Historical query service
//!
//! Validates and defaults filter parameters before delegating to the storage
//! backend. Shared by the HTTP API and the live protocol's snapshot request.

use crate::entry::{Entry, EntryType};
use crate::error::{Result, TelescopeError};
use crate::storage::{EntryFilter, EntryPage, SortOrder, StorageBackend};
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Raw, possibly incomplete filter parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
    /// Entry type name; absent, empty or "all" means every type
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
}

impl EntryQuery {
    pub fn into_filter(self) -> Result<EntryFilter> {
        let entry_type = match self.entry_type.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(name) => Some(name.parse::<EntryType>()?),
        };

        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page < 1 {
            return Err(TelescopeError::InvalidArgument(
                "page must be >= 1".to_string(),
            ));
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page < 1 {
            return Err(TelescopeError::InvalidArgument(
                "perPage must be >= 1".to_string(),
            ));
        }

        let sort = match self.sort.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(sort) => sort.parse()?,
        };

        Ok(EntryFilter {
            entry_type,
            page,
            per_page: per_page.min(MAX_PER_PAGE),
            sort,
        })
    }
}

#[derive(Clone)]
pub struct QueryService {
    storage: Arc<dyn StorageBackend>,
}

impl QueryService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub async fn entries(&self, query: EntryQuery) -> Result<EntryPage> {
        let filter = query.into_filter()?;
        self.page(&filter).await
    }

    /// Listing for a filter that has already been validated
    pub async fn page(&self, filter: &EntryFilter) -> Result<EntryPage> {
        self.storage.get_entries(filter).await
    }

    /// Point lookup; `Ok(None)` when the id is unknown
    pub async fn entry(&self, id: &str) -> Result<Option<Entry>> {
        self.storage.get_entry(id).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.storage.count().await
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.name()
    }
}
