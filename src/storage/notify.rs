//! New-entry notification fan-out
//!
//! Each listener owns an unbounded FIFO channel, so a slow listener never
//! loses entries and always sees them in the order the backend emitted them.
//! Closed listeners are pruned on the next notification.

use crate::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Receiving half handed to a registered listener
pub struct EntryListener {
    id: u64,
    rx: mpsc::UnboundedReceiver<Arc<Entry>>,
}

impl EntryListener {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next stored entry; `None` once the backend is gone
    pub async fn recv(&mut self) -> Option<Arc<Entry>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Entry>> {
        self.rx.try_recv().ok()
    }
}

/// Listener registry owned by a storage backend
#[derive(Default)]
pub struct EntryNotifier {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, mpsc::UnboundedSender<Arc<Entry>>)>>,
}

impl EntryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EntryListener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, tx));

        tracing::debug!(listener_id = id, "Entry listener registered");
        EntryListener { id, rx }
    }

    /// Deliver one stored entry to every live listener
    ///
    /// Callers must invoke this while still holding whatever lock fixed the
    /// entry's storage order.
    pub fn notify(&self, entry: &Entry) {
        let entry = Arc::new(entry.clone());
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        listeners.retain(|(id, tx)| {
            let alive = tx.send(entry.clone()).is_ok();
            if !alive {
                tracing::debug!(listener_id = id, "Pruned closed entry listener");
            }
            alive
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .map(|l| l.len())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CustomEntry, NewEntry};

    fn entry(id: &str) -> Entry {
        NewEntry::custom(CustomEntry {
            name: "test".to_string(),
            data: serde_json::json!({}),
            correlation_id: None,
        })
        .into_entry(id)
    }

    #[tokio::test]
    async fn test_every_listener_receives_in_order() {
        let notifier = EntryNotifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        for i in 0..3 {
            notifier.notify(&entry(&i.to_string()));
        }

        for listener in [&mut a, &mut b] {
            for i in 0..3 {
                let got = listener.recv().await.unwrap();
                assert_eq!(got.id, i.to_string());
            }
            assert!(listener.try_recv().is_none());
        }
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let notifier = EntryNotifier::new();
        let keep = notifier.subscribe();
        let dropped = notifier.subscribe();
        assert_ne!(keep.id(), dropped.id());
        drop(dropped);

        notifier.notify(&entry("1"));
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_late_listener_misses_earlier_entries() {
        let notifier = EntryNotifier::new();
        notifier.notify(&entry("early"));

        let mut late = notifier.subscribe();
        assert!(late.try_recv().is_none());
    }
}
