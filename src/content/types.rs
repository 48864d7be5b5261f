use serde::{Deserialize, Deserializer, Serialize};

/// Kind of content being produced
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum ContentType {
    Video,
    Article,
    Newsletter,
    Short,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Video,
        ContentType::Article,
        ContentType::Newsletter,
        ContentType::Short,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "Video",
            ContentType::Article => "Article",
            ContentType::Newsletter => "Newsletter",
            ContentType::Short => "Short",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Lenient parse; unknown labels fall back to `Video`
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or(ContentType::Video)
    }
}

/// Target publishing platform
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum Platform {
    YouTube,
    Substack,
    Both,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::YouTube, Platform::Substack, Platform::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Substack => "Substack",
            Platform::Both => "Both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Lenient parse; unknown labels fall back to `YouTube`
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or(Platform::YouTube)
    }
}

/// Production stage. Declaration order is stage order; any stage may be set
/// from any other.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentStatus {
    Idea,
    Research,
    Drafting,
    Production,
    Published,
}

impl ContentStatus {
    pub const ALL: [ContentStatus; 5] = [
        ContentStatus::Idea,
        ContentStatus::Research,
        ContentStatus::Drafting,
        ContentStatus::Production,
        ContentStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Idea => "Idea",
            ContentStatus::Research => "Research",
            ContentStatus::Drafting => "Drafting",
            ContentStatus::Production => "Production",
            ContentStatus::Published => "Published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Lenient parse; unknown labels fall back to `Idea`
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or(ContentStatus::Idea)
    }
}

// Stored labels are read leniently: an unknown label falls back to the
// default variant instead of failing the whole collection.
macro_rules! lenient_label_deserialize {
    ($($ty:ty),+) => {
        $(
            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    let label = String::deserialize(deserializer)?;
                    Ok(<$ty>::from_str(&label))
                }
            }
        )+
    };
}

lenient_label_deserialize!(ContentType, Platform, ContentStatus);

/// One unit of planned or produced content tracked by the board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub platform: Platform,
    pub status: ContentStatus,
    #[serde(default)]
    pub research_notes: String,
    #[serde(default)]
    pub draft_content: String,
    /// External URL or `data:<mime>;base64,...` reference
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub thumbnail_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Input for creating an item outside an editor session (CLI, imports)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItemInput {
    pub title: Option<String>,
    pub topic: Option<String>,
    pub content_type: Option<ContentType>,
    pub platform: Option<Platform>,
    pub status: Option<ContentStatus>,
    pub research_notes: Option<String>,
    pub draft_content: Option<String>,
    pub thumbnail_url: Option<String>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
