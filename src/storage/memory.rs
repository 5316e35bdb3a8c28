//! In-memory reference backend

use super::{EntryFilter, EntryListener, EntryNotifier, EntryPage, Pagination, SortOrder, StorageBackend};
use crate::entry::{Entry, NewEntry};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use uuid::Uuid;

/// Entries held in insertion order; nothing survives a restart
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<Vec<Entry>>,
    notifier: EntryNotifier,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn store_entry(&self, entry: NewEntry) -> Result<Entry> {
        let stored = entry.into_entry(Uuid::new_v4().to_string());

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push(stored.clone());
        // Still under the write lock: notification order == storage order
        self.notifier.notify(&stored);
        drop(entries);

        tracing::debug!(
            entry_id = %stored.id,
            entry_type = %stored.entry_type(),
            "Stored entry in memory"
        );
        Ok(stored)
    }

    async fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn get_entries(&self, filter: &EntryFilter) -> Result<EntryPage> {
        filter.validate()?;

        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // (timestamp, insertion sequence) is a strict total order
        let mut matching: Vec<(usize, &Entry)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.matches(e.entry_type()))
            .collect();

        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            let ordering = a.timestamp.cmp(&b.timestamp).then(seq_a.cmp(seq_b));
            match filter.sort {
                SortOrder::TimestampAsc => ordering,
                SortOrder::TimestampDesc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.per_page as usize)
            .map(|(_, e)| e.clone())
            .collect();

        Ok(EntryPage {
            entries: page,
            pagination: Pagination {
                current_page: filter.page,
                per_page: filter.per_page,
                total,
            },
        })
    }

    fn subscribe(&self) -> EntryListener {
        self.notifier.subscribe()
    }

    async fn count(&self) -> Result<u64> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.len() as u64)
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let original = entries.len();
        entries.retain(|e| e.timestamp >= before);
        Ok((original - entries.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
