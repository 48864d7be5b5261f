use serde::Serialize;

use crate::content::types::{ContentItem, ContentStatus, ContentType, Platform};

/// One status column of the board
#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: ContentStatus,
    pub count: usize,
    pub items: Vec<ContentItem>,
}

/// Group items into the five status columns, in stage order. Empty columns
/// are kept so the board always has the same shape.
pub fn group_by_status(items: &[ContentItem]) -> Vec<BoardColumn> {
    ContentStatus::ALL
        .into_iter()
        .map(|status| {
            let items: Vec<ContentItem> = items
                .iter()
                .filter(|i| i.status == status)
                .cloned()
                .collect();
            BoardColumn {
                status,
                count: items.len(),
                items,
            }
        })
        .collect()
}

/// Short marker shown next to the platform on a card
pub fn platform_glyph(platform: Platform) -> &'static str {
    match platform {
        Platform::YouTube => "[YT]",
        Platform::Substack => "[SS]",
        Platform::Both => "[YT+SS]",
    }
}

/// Badge tone for a content type; newsletters use the neutral tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Blue,
    Emerald,
    Purple,
    Neutral,
}

impl BadgeTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeTone::Blue => "blue",
            BadgeTone::Emerald => "emerald",
            BadgeTone::Purple => "purple",
            BadgeTone::Neutral => "neutral",
        }
    }
}

pub fn type_badge(content_type: ContentType) -> (&'static str, BadgeTone) {
    let tone = match content_type {
        ContentType::Video => BadgeTone::Blue,
        ContentType::Article => BadgeTone::Emerald,
        ContentType::Short => BadgeTone::Purple,
        ContentType::Newsletter => BadgeTone::Neutral,
    };
    (content_type.as_str(), tone)
}

/// Plain-text board used by the command line
pub fn render_board(columns: &[BoardColumn]) -> String {
    let mut out = String::new();

    for column in columns {
        out.push_str(&format!("== {} ({}) ==\n", column.status.as_str(), column.count));

        if column.items.is_empty() {
            out.push_str("  No content\n");
        }

        for item in &column.items {
            let (badge, tone) = type_badge(item.content_type);
            out.push_str(&format!(
                "  {} {} <{}/{}> {}\n",
                platform_glyph(item.platform),
                item.title,
                badge,
                tone.as_str(),
                item.id
            ));
            if !item.topic.is_empty() {
                out.push_str(&format!("      {}\n", item.topic));
            }
        }
    }

    out
}
