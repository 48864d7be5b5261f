//! On-disk shape of the item collection: a JSON array of `ContentItem`
//! records with enum labels and integer millisecond timestamps.

use crate::content::types::ContentItem;

pub fn encode_items(items: &[ContentItem]) -> Result<String, serde_json::Error> {
    serde_json::to_string(items)
}

pub fn decode_items(raw: &str) -> Result<Vec<ContentItem>, serde_json::Error> {
    serde_json::from_str(raw)
}
