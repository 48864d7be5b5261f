use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::content::storage::{ItemPersistence, StorageError};
use crate::content::types::{ContentItem, ContentStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Lock error")]
    Lock,
    #[error("Failed to persist items: {0}")]
    Persist(#[from] StorageError),
}

/// In-memory item collection, saved in full after every mutation.
///
/// The collection lock is held across each mutation and its save, so the
/// slot always ends up holding the latest collection. When a save fails the
/// mutation stays applied in memory and the error is returned; the next
/// successful save (or `flush`) brings durable state back in line.
pub struct ItemStore {
    items: Mutex<Vec<ContentItem>>,
    persistence: Arc<dyn ItemPersistence>,
}

impl ItemStore {
    pub fn open(persistence: Arc<dyn ItemPersistence>) -> Result<Self, StoreError> {
        let items = persistence.load()?;
        Ok(Self {
            items: Mutex::new(items),
            persistence,
        })
    }

    /// All items in insertion order
    pub fn list(&self) -> Result<Vec<ContentItem>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Lock)?;
        Ok(items.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Lock)?;
        Ok(items.iter().find(|i| i.id == id).cloned())
    }

    pub fn list_by_status(&self, status: ContentStatus) -> Result<Vec<ContentItem>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Lock)?;
        Ok(items.iter().filter(|i| i.status == status).cloned().collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Lock)?;
        Ok(items.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Replace the item with the same id in place, or append it
    pub fn upsert(&self, item: ContentItem) -> Result<(), StoreError> {
        let mut items = self.items.lock().map_err(|_| StoreError::Lock)?;

        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                tracing::debug!(id = %item.id, "replacing content item");
                *existing = item;
            }
            None => {
                tracing::debug!(id = %item.id, "adding content item");
                items.push(item);
            }
        }

        self.save_locked(&items)
    }

    /// Remove by id. Returns whether an item was removed; a missing id is a no-op.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut items = self.items.lock().map_err(|_| StoreError::Lock)?;

        let before = items.len();
        items.retain(|i| i.id != id);
        let removed = items.len() != before;

        if removed {
            tracing::info!(id = %id, "deleted content item");
        }

        self.save_locked(&items)?;
        Ok(removed)
    }

    /// Write the current collection again
    pub fn flush(&self) -> Result<(), StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Lock)?;
        self.save_locked(&items)
    }

    fn save_locked(&self, items: &[ContentItem]) -> Result<(), StoreError> {
        self.persistence.save(items).map_err(|e| {
            tracing::error!(error = %e, "failed to save content items");
            StoreError::from(e)
        })
    }
}
