// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, ValidationError};

/// Image value the feed uses when an article has no picture.
pub const IMAGE_NONE_SENTINEL: &str = "None";

/// One article exactly as the feed delivered it, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    pub published: Option<String>,
}

/// Stored news article. Fields are fixed once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub author: String,
    pub image: Option<String>,
    pub language: String,
    pub category: Vec<String>,
    pub published: DateTime<Utc>,
}

/// Items of one fetch. Entries the feed sent in an unexpected shape are kept as errors
/// so the run can count them without failing the whole batch.
pub type FeedBatch = Vec<Result<RawItem, ValidationError>>;

#[async_trait::async_trait]
pub trait NewsFeed: Send + Sync {
    async fn fetch_latest(&self) -> Result<FeedBatch, FetchError>;
    fn name(&self) -> &'static str;
}

/// Maps the image sentinel to `None`; anything else is kept verbatim.
pub fn normalize_image(image: Option<String>) -> Option<String> {
    image.filter(|s| s != IMAGE_NONE_SENTINEL)
}

/// Feed timestamps look like `2024-01-03 12:00:00 +0000`; RFC 3339 is accepted as well.
pub fn parse_published(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::BadTimestamp(raw.to_string()))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

impl TryFrom<RawItem> for NewsRecord {
    type Error = ValidationError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let id = required(raw.id, "id")?;
        let title = required(raw.title, "title")?;
        let url = required(raw.url, "url")?;
        let published = match raw.published.as_deref() {
            Some(p) => parse_published(p)?,
            None => return Err(ValidationError::MissingField("published")),
        };

        Ok(NewsRecord {
            id,
            title,
            description: raw.description.unwrap_or_default(),
            url,
            author: raw.author.unwrap_or_default(),
            image: normalize_image(raw.image),
            language: raw.language.unwrap_or_default(),
            category: raw.category,
            published,
        })
    }
}
