//! Destination index bootstrap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::traits::{DocumentStore, IndexAlreadyExists};

/// Outcome of [`IndexManager::ensure_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    AlreadyExists,
    Created,
    /// Existence check or creation failed; items are written anyway.
    Unconfirmed,
}

/// Field mapping for the post index.
pub fn index_mapping() -> serde_json::Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "bid": { "type": "keyword" },
                "user_id": { "type": "keyword" },
                "screen_name": { "type": "text" },
                "text": { "type": "text" },
                "article_url": { "type": "text" },
                "location": { "type": "text" },
                "at_users": { "type": "text" },
                "topics": { "type": "keyword" },
                "reposts_count": { "type": "integer" },
                "comments_count": { "type": "integer" },
                "attitudes_count": { "type": "integer" },
                "created_at": {
                    "type": "date",
                    "format": "yyyy-MM-dd HH:mm:ss||yyyy-MM-dd HH:mm"
                },
                "source": { "type": "text" },
                "pics_url": { "type": "text" },
                "video_url": { "type": "text" },
                "retweet_id": { "type": "keyword" },
                "ip": { "type": "keyword" },
                "user_authentication": { "type": "keyword" },
                "score": { "type": "float" },
                "keyword": { "type": "keyword" }
            }
        }
    })
}

pub struct IndexManager {
    store: Arc<dyn DocumentStore>,
    index: String,
    ensured: AtomicBool,
}

impl IndexManager {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            ensured: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn is_ensured(&self) -> bool {
        self.ensured.load(Ordering::Acquire)
    }

    /// Make sure the index exists with the post mapping. Never fails: errors
    /// are logged and reported as `Unconfirmed`, and the next call retries.
    /// Once the index is confirmed, later calls do not touch the store.
    pub async fn ensure_schema(&self) -> SchemaStatus {
        if self.is_ensured() {
            return SchemaStatus::AlreadyExists;
        }

        let status = match self.store.index_exists(&self.index).await {
            Ok(true) => SchemaStatus::AlreadyExists,
            Ok(false) => self.create().await,
            Err(e) => {
                warn!(index = %self.index, error = %e, "Index existence check failed, continuing without confirmed schema");
                SchemaStatus::Unconfirmed
            }
        };

        if status != SchemaStatus::Unconfirmed {
            self.ensured.store(true, Ordering::Release);
        }
        status
    }

    async fn create(&self) -> SchemaStatus {
        match self.store.create_index(&self.index, &index_mapping()).await {
            Ok(()) => {
                info!(index = %self.index, "Created index");
                SchemaStatus::Created
            }
            Err(e) if e.is::<IndexAlreadyExists>() => {
                info!(index = %self.index, "Index was created concurrently");
                SchemaStatus::AlreadyExists
            }
            Err(e) => {
                warn!(index = %self.index, error = %e, "Index creation failed, continuing without confirmed schema");
                SchemaStatus::Unconfirmed
            }
        }
    }
}
