use crate::content::codec::{decode_items, encode_items};
use crate::content::types::{now_millis, ContentItem};
use crate::database::{Database, DbError};
use thiserror::Error;

/// Fixed slot holding the whole item collection
pub const STORAGE_KEY: &str = "creatorflow-items";

/// Prefix for quarantined copies of unreadable collections
const CORRUPT_KEY_PREFIX: &str = "creatorflow-items.corrupt-";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Serialization error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Load/save contract for the item collection
pub trait ItemPersistence: Send + Sync {
    fn load(&self) -> Result<Vec<ContentItem>, StorageError>;
    fn save(&self, items: &[ContentItem]) -> Result<(), StorageError>;
}

impl ItemPersistence for Database {
    /// Missing slot loads as empty. An unreadable slot is copied to a
    /// quarantine key and loads as empty.
    fn load(&self) -> Result<Vec<ContentItem>, StorageError> {
        let Some(raw) = self.kv_get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };

        match decode_items(&raw) {
            Ok(items) => {
                tracing::info!(count = items.len(), "loaded content items");
                Ok(items)
            }
            Err(e) => {
                let quarantine_key = format!("{}{}", CORRUPT_KEY_PREFIX, now_millis());
                self.kv_set(&quarantine_key, &raw)?;
                // Later loads see an empty slot instead of quarantining again
                self.kv_delete(STORAGE_KEY)?;
                tracing::warn!(
                    error = %e,
                    quarantine_key = %quarantine_key,
                    bytes = raw.len(),
                    "stored items are unreadable; starting with an empty board"
                );
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, items: &[ContentItem]) -> Result<(), StorageError> {
        let raw = encode_items(items)?;
        self.kv_set(STORAGE_KEY, &raw)?;
        tracing::debug!(count = items.len(), bytes = raw.len(), "saved content items");
        Ok(())
    }
}

impl Database {
    /// Keys of quarantined collections, oldest first
    pub fn list_quarantined_items(&self) -> Result<Vec<String>, DbError> {
        self.kv_keys_with_prefix(CORRUPT_KEY_PREFIX)
    }

    /// Raw text of one quarantined collection. Keys outside the quarantine
    /// prefix read as missing.
    pub fn get_quarantined_items(&self, key: &str) -> Result<Option<String>, DbError> {
        if !key.starts_with(CORRUPT_KEY_PREFIX) {
            return Ok(None);
        }
        self.kv_get(key)
    }

    /// Drop a quarantined copy once it has been recovered or is not wanted
    pub fn delete_quarantined_items(&self, key: &str) -> Result<bool, DbError> {
        if !key.starts_with(CORRUPT_KEY_PREFIX) {
            return Ok(false);
        }
        let deleted = self.kv_delete(key)?;
        if deleted {
            tracing::info!(key = %key, "deleted quarantined items");
        }
        Ok(deleted)
    }
}
