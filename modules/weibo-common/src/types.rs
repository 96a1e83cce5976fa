use serde::{Deserialize, Serialize};

use crate::error::IngestError;

// --- Crawler input ---

/// A post record as delivered by the crawler, before enrichment.
///
/// Only `id` is required. Every other field may be absent or null; defaults
/// are applied once, when the record is mapped into an [`EnrichedDocument`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub bid: Option<String>,
    pub user_id: Option<String>,
    pub screen_name: Option<String>,
    pub text: Option<String>,
    pub article_url: Option<String>,
    pub location: Option<String>,
    pub at_users: Option<String>,
    /// Comma-joined topic names, e.g. "topic a,topic b".
    pub topics: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub reposts_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub comments_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub attitudes_count: Option<u64>,
    /// Free-form; repaired by the time normalizer.
    pub created_at: Option<String>,
    pub source: Option<String>,
    pub pics: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub retweet_id: Option<String>,
    pub ip: Option<String>,
    pub user_authentication: Option<String>,
    pub keyword: Option<String>,
}

impl RawItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Post text, or "" when the crawler sent none.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Counters arrive as numbers or numeric strings ("12"). A string the
/// crawler could not reduce to a number ("100万+") counts as absent rather
/// than rejecting the whole post.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => Ok(n.as_u64()),
        serde_json::Value::String(s) => Ok(s.trim().parse().ok()),
        _ => Err(de::Error::custom("count must be a number or numeric string")),
    }
}

/// One line of crawler output. The crawler yields either the bare record or
/// the record wrapped as `{"weibo": {...}, "keyword": "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CrawlerItem {
    Wrapped {
        weibo: RawItem,
        #[serde(default)]
        keyword: Option<String>,
    },
    Flat(RawItem),
}

impl CrawlerItem {
    pub fn from_json(line: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Unwrap into the record. A search keyword carried on the envelope fills
    /// in a record that has none of its own.
    pub fn into_raw(self) -> RawItem {
        match self {
            CrawlerItem::Wrapped { mut weibo, keyword } => {
                if weibo.keyword.as_deref().map_or(true, str::is_empty) {
                    if let Some(keyword) = keyword {
                        weibo.keyword = Some(keyword);
                    }
                }
                weibo
            }
            CrawlerItem::Flat(raw) => raw,
        }
    }
}

// --- Persisted document ---

/// Neutral sentiment, used whenever a real score cannot be obtained.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// The canonical, sentiment-scored record written to the search index.
/// Field names match the index mapping one to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedDocument {
    pub id: String,
    pub bid: String,
    pub user_id: String,
    pub screen_name: String,
    pub text: String,
    pub article_url: String,
    pub location: String,
    pub at_users: String,
    pub topics: Vec<String>,
    pub reposts_count: u64,
    pub comments_count: u64,
    pub attitudes_count: u64,
    pub created_at: String,
    pub source: String,
    pub pics_url: String,
    pub video_url: String,
    pub retweet_id: String,
    pub ip: String,
    pub user_authentication: String,
    pub score: f64,
    pub keyword: String,
}
