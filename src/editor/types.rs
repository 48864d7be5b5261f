use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::{now_millis, ContentItem, ContentStatus, ContentType, Platform, StoreError};
use crate::gemini::GenerationError;

pub const IDEAS_SEPARATOR: &str = "\n\n---\n\n";
pub const IDEAS_HEADING: &str = "### AI Ideas Analysis\n";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No item is open for editing")]
    Closed,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sub-view of the editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditorTab {
    /// Field editing and research notes
    #[default]
    Details,
    /// AI generation actions
    Studio,
    /// Generated asset preview
    Preview,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Closed,
    Idle,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Draft,
    Thumbnail,
    Ideas,
}

impl GenerationKind {
    pub fn failure_message(&self) -> &'static str {
        match self {
            GenerationKind::Draft => "Failed to generate draft. Check API Key.",
            GenerationKind::Thumbnail => "Failed to generate thumbnail.",
            GenerationKind::Ideas => "Failed to analyze notes.",
        }
    }

    /// Short message shown in the editor for a failed call
    pub fn error_message(&self, error: &GenerationError) -> String {
        match error {
            GenerationError::MissingCredential => "API key not configured.".to_string(),
            _ => self.failure_message().to_string(),
        }
    }
}

/// Result of triggering a generation action on a session
#[derive(Debug)]
pub enum GenerationOutcome {
    /// The result was merged into the working draft
    Applied,
    /// The call failed; the session error flag holds the message
    Failed(GenerationError),
    /// Another call was already outstanding; nothing started
    Busy,
    /// Preconditions failed before any call was made
    Rejected(String),
    /// The session was not open
    Closed,
    /// The session was committed, discarded or reopened while the call ran
    Disregarded,
}

impl GenerationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, GenerationOutcome::Applied)
    }
}

/// Uncommitted copy of an item's fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingDraft {
    pub id: Option<String>,
    pub title: String,
    pub topic: String,
    pub content_type: ContentType,
    pub platform: Platform,
    pub status: ContentStatus,
    pub research_notes: String,
    pub draft_content: String,
    pub thumbnail_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkingDraft {
    pub fn new_at(now: i64) -> Self {
        Self {
            id: None,
            title: String::new(),
            topic: String::new(),
            content_type: ContentType::Video,
            platform: Platform::YouTube,
            status: ContentStatus::Idea,
            research_notes: String::new(),
            draft_content: String::new(),
            thumbnail_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new() -> Self {
        Self::new_at(now_millis())
    }

    /// Topic for generation: topic, then title, then `fallback`
    pub fn subject_or(&self, fallback: &str) -> String {
        [self.topic.trim(), self.title.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// Build the committed item. New drafts get a fresh id and both
    /// timestamps set to `now`.
    pub fn to_item(&self, now: i64) -> ContentItem {
        let (id, created_at) = match &self.id {
            Some(id) => (id.clone(), self.created_at),
            None => (uuid::Uuid::new_v4().to_string(), now),
        };

        ContentItem {
            id,
            title: self.title.clone(),
            topic: self.topic.clone(),
            content_type: self.content_type,
            platform: self.platform,
            status: self.status,
            research_notes: self.research_notes.clone(),
            draft_content: self.draft_content.clone(),
            thumbnail_url: self.thumbnail_url.clone().filter(|u| !u.is_empty()),
            created_at,
            updated_at: now.max(created_at),
        }
    }
}

impl Default for WorkingDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&ContentItem> for WorkingDraft {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: Some(item.id.clone()),
            title: item.title.clone(),
            topic: item.topic.clone(),
            content_type: item.content_type,
            platform: item.platform,
            status: item.status,
            research_notes: item.research_notes.clone(),
            draft_content: item.draft_content.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Append an idea analysis below existing draft content
pub fn append_ideas(existing: &str, ideas: &str) -> String {
    let mut out = String::with_capacity(existing.len() + ideas.len() + 32);
    if !existing.is_empty() {
        out.push_str(existing);
        out.push_str(IDEAS_SEPARATOR);
    }
    out.push_str(IDEAS_HEADING);
    out.push_str(ideas);
    out
}
