// Test mocks for the ingest pipeline.
//
// Two mocks matching the two trait boundaries:
// - ScriptedModel (SentimentModel): queued failures, text rules, fallback,
//   optional reply delay with in-flight tracking
// - MemoryStore (DocumentStore): in-memory indices with injectable failures
//
// Plus `raw_item` for building crawler records.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use weibo_common::{EnrichedDocument, RawItem};

use crate::traits::{DocumentStore, IndexAlreadyExists, SentimentModel, UpsertResult};

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
    Hang,
}

/// One recorded `classify` call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Sentiment model with scripted behaviour. Replies are chosen in order:
/// queued one-shot failures (`then_fail`), then the first `on_text` rule whose
/// needle occurs in the prompt, then the fallback.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<Reply>>,
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    delay: Option<Duration>,
    calls: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            fallback,
            delay: None,
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::with_fallback(Reply::Text(reply.to_string()))
    }

    pub fn failing(error: &str) -> Self {
        Self::with_fallback(Reply::Fail(error.to_string()))
    }

    /// Never answers; exercises deadlines.
    pub fn hanging() -> Self {
        Self::with_fallback(Reply::Hang)
    }

    pub fn then_fail(self, error: &str) -> Self {
        self.push(Reply::Fail(error.to_string()))
    }

    pub fn on_text(mut self, needle: &str, reply: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(reply.to_string())));
        self
    }

    pub fn fail_on_text(mut self, needle: &str, error: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Fail(error.to_string())));
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, reply: Reply) -> Self {
        self.queue.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `classify` calls observed running at once.
    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, prompt: &str) -> Reply {
        if let Some(reply) = self.queue.lock().unwrap().pop_front() {
            return reply;
        }
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl SentimentModel for ScriptedModel {
    async fn classify(&self, system: &str, prompt: &str, temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(ModelRequest {
            system: system.to_string(),
            prompt: prompt.to_string(),
            temperature,
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_reply(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) => bail!("ScriptedModel: {error}"),
            Reply::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory document store. Documents are keyed by (index, id) and fully
/// replaced on upsert.
#[derive(Default)]
pub struct MemoryStore {
    indices: Mutex<HashMap<String, serde_json::Value>>,
    documents: Mutex<HashMap<(String, String), EnrichedDocument>>,
    exists_calls: AtomicU32,
    create_calls: AtomicU32,
    upsert_calls: AtomicU32,
    unreachable: bool,
    create_error: Option<String>,
    create_race: bool,
    failing_ids: HashSet<String>,
    upsert_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `index` already present.
    pub fn with_index(self, index: &str) -> Self {
        self.indices
            .lock()
            .unwrap()
            .insert(index.to_string(), serde_json::json!({}));
        self
    }

    /// Every call fails as if the store were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn failing_create(mut self, error: &str) -> Self {
        self.create_error = Some(error.to_string());
        self
    }

    /// Index creation loses a race: another writer created it first.
    pub fn racing_create(mut self) -> Self {
        self.create_race = true;
        self
    }

    pub fn failing_upsert_for(mut self, id: &str) -> Self {
        self.failing_ids.insert(id.to_string());
        self
    }

    pub fn slow_upserts(mut self, delay: Duration) -> Self {
        self.upsert_delay = Some(delay);
        self
    }

    pub fn document(&self, index: &str, id: &str) -> Option<EnrichedDocument> {
        self.documents
            .lock()
            .unwrap()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.documents
            .lock()
            .unwrap()
            .keys()
            .filter(|(i, _)| i == index)
            .count()
    }

    pub fn mapping(&self, index: &str) -> Option<serde_json::Value> {
        self.indices.lock().unwrap().get(index).cloned()
    }

    pub fn exists_calls(&self) -> u32 {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            bail!("MemoryStore: connection refused");
        }
        Ok(self.indices.lock().unwrap().contains_key(index))
    }

    async fn create_index(&self, index: &str, mapping: &serde_json::Value) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            bail!("MemoryStore: connection refused");
        }
        if let Some(error) = &self.create_error {
            bail!("MemoryStore: {error}");
        }
        let mut indices = self.indices.lock().unwrap();
        if self.create_race || indices.contains_key(index) {
            indices.entry(index.to_string()).or_insert_with(|| mapping.clone());
            return Err(IndexAlreadyExists(index.to_string()).into());
        }
        indices.insert(index.to_string(), mapping.clone());
        Ok(())
    }

    async fn upsert(
        &self,
        index: &str,
        document: &EnrichedDocument,
        _timeout: Duration,
    ) -> Result<UpsertResult> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.upsert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable {
            bail!("MemoryStore: connection refused");
        }
        if self.failing_ids.contains(&document.id) {
            bail!("MemoryStore: rejected document {}", document.id);
        }
        let previous = self
            .documents
            .lock()
            .unwrap()
            .insert((index.to_string(), document.id.clone()), document.clone());
        Ok(UpsertResult {
            created: previous.is_none(),
        })
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A crawler record with an id, text and minute-precision timestamp.
pub fn raw_item(id: &str, text: &str) -> RawItem {
    RawItem {
        text: Some(text.to_string()),
        created_at: Some("2024-05-01 12:30".to_string()),
        ..RawItem::new(id)
    }
}
