// Trait abstractions for the pipeline's two external systems.
//
// SentimentModel: the chat endpoint that rates post text.
// DocumentStore: the search index that holds enriched documents.
//
// Production impls wrap ai_client::OpenAi and elastic_client::ElasticClient;
// testing.rs provides in-memory mocks so the pipeline runs without network.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use ai_client::{ChatOptions, OpenAi};
use elastic_client::ElasticClient;
use weibo_common::EnrichedDocument;

// ---------------------------------------------------------------------------
// SentimentModel
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SentimentModel: Send + Sync {
    /// Send one system + user exchange and return the raw reply text.
    /// `Err` means no usable reply was obtained (network, protocol, empty).
    async fn classify(&self, system: &str, prompt: &str, temperature: f32) -> Result<String>;
}

#[async_trait]
impl SentimentModel for OpenAi {
    async fn classify(&self, system: &str, prompt: &str, temperature: f32) -> Result<String> {
        let options = ChatOptions::default().temperature(temperature).max_tokens(8);
        Ok(self.chat_completion(system, prompt, options).await?)
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertResult {
    /// False when an existing document with the same id was replaced.
    pub created: bool,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create `index` with `mapping`. Implementations report a lost creation
    /// race as [`IndexAlreadyExists`].
    async fn create_index(&self, index: &str, mapping: &serde_json::Value) -> Result<()>;

    /// Write the whole document under `document.id`, replacing any previous one.
    async fn upsert(
        &self,
        index: &str,
        document: &EnrichedDocument,
        timeout: Duration,
    ) -> Result<UpsertResult>;
}

/// Marker error for a create that raced another writer.
#[derive(Debug, thiserror::Error)]
#[error("index {0} already exists")]
pub struct IndexAlreadyExists(pub String);

#[async_trait]
impl DocumentStore for ElasticClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(ElasticClient::index_exists(self, index).await?)
    }

    async fn create_index(&self, index: &str, mapping: &serde_json::Value) -> Result<()> {
        match ElasticClient::create_index(self, index, mapping).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_index_already_exists() => {
                Err(IndexAlreadyExists(index.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(
        &self,
        index: &str,
        document: &EnrichedDocument,
        timeout: Duration,
    ) -> Result<UpsertResult> {
        let resp = self
            .index_document(index, &document.id, document, timeout)
            .await?;
        Ok(UpsertResult {
            created: resp.created(),
        })
    }
}
