pub mod view;

use std::collections::HashSet;

use crate::domain::NotificationItem;

pub use view::{InboxStatus, InboxView, NotificationGroup};

/// In-memory cache of the current unread set.
///
/// Owned by the engine task; every operation completes synchronously, so no
/// caller can observe a half-applied update.
#[derive(Debug, Default)]
pub struct NotificationStore {
    items: Vec<NotificationItem>,
    previous_count: usize,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly fetched list and return the new count.
    ///
    /// The count held before the swap is kept as [`previous_count`](Self::previous_count).
    /// Repeated ids keep their first occurrence.
    pub fn replace_all(&mut self, items: Vec<NotificationItem>) -> usize {
        let mut seen = HashSet::with_capacity(items.len());
        let deduped: Vec<NotificationItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();

        self.previous_count = self.items.len();
        self.items = deduped;
        self.items.len()
    }

    /// Drop the item with `id`; absent ids are ignored.
    pub fn remove_by_id(&mut self, id: &str) -> usize {
        self.items.retain(|item| item.id != id);
        self.items.len()
    }

    pub fn clear(&mut self) -> usize {
        self.items.clear();
        0
    }

    pub fn current_count(&self) -> usize {
        self.items.len()
    }

    pub fn previous_count(&self) -> usize {
        self.previous_count
    }

    pub fn items(&self) -> &[NotificationItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&NotificationItem> {
        self.items.iter().find(|item| item.id == id)
    }
}
