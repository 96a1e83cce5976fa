//! Per-item ingest pipeline.
//!
//! dedup → created_at repair → sentiment → document → upsert
//!
//! `Pipeline` is the shared run context: the seen-id set, the scorer, the
//! store handles and the run counters are created once and borrowed by every
//! worker. Nothing here fails the run; each stage degrades to a default or a
//! log line, and only a duplicate stops an item early.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Instrument};
use typed_builder::TypedBuilder;

use weibo_common::RawItem;

use crate::dedup::DuplicateFilter;
use crate::index_manager::{IndexManager, SchemaStatus};
use crate::mapper::build_document;
use crate::persister::{PersistOutcome, Persister};
use crate::sentiment::{ScorerSettings, SentimentScore, SentimentScorer};
use crate::stats::{IngestStats, StatsSnapshot};
use crate::timestamp::normalize_with_repair;
use crate::traits::{DocumentStore, SentimentModel};

/// What happened to one crawler item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Id already admitted this run; nothing else was done.
    Duplicate,
    Persisted {
        score: SentimentScore,
        created: bool,
    },
    /// Enriched but not stored. Still counts as processed.
    PersistFailed {
        score: SentimentScore,
        reason: String,
    },
}

/// Long-lived resources a pipeline is built from.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub model: Arc<dyn SentimentModel>,
    pub store: Arc<dyn DocumentStore>,
    #[builder(default = "guoping".to_string(), setter(into))]
    pub index: String,
    #[builder(default)]
    pub scorer: ScorerSettings,
    #[builder(default = Duration::from_secs(30))]
    pub persist_timeout: Duration,
    /// Items processed at once by [`Pipeline::run`].
    #[builder(default = 4)]
    pub concurrency: usize,
}

impl PipelineDeps {
    pub fn build_pipeline(self) -> Pipeline {
        Pipeline {
            dedup: DuplicateFilter::new(),
            scorer: SentimentScorer::new(self.model, self.scorer),
            index_manager: IndexManager::new(self.store.clone(), self.index.clone()),
            persister: Persister::new(self.store, self.index, self.persist_timeout),
            concurrency: self.concurrency.max(1),
            stats: IngestStats::new(),
        }
    }
}

pub struct Pipeline {
    dedup: DuplicateFilter,
    scorer: SentimentScorer,
    index_manager: IndexManager,
    persister: Persister,
    concurrency: usize,
    stats: IngestStats,
}

impl Pipeline {
    /// Ensure the destination index exists. Call once before feeding items.
    pub async fn ensure_schema(&self) -> SchemaStatus {
        self.index_manager.ensure_schema().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Carry one item through every stage.
    pub async fn process(&self, raw: RawItem) -> ItemOutcome {
        let span = tracing::info_span!("item", id = %raw.id);
        self.process_inner(raw).instrument(span).await
    }

    async fn process_inner(&self, raw: RawItem) -> ItemOutcome {
        self.stats.record_received();

        if !self.dedup.check_and_admit(&raw.id) {
            debug!("Dropping duplicate post");
            self.stats.record_duplicate();
            return ItemOutcome::Duplicate;
        }

        let created_at = normalize_with_repair(raw.created_at.as_deref().unwrap_or_default());
        if created_at.is_sentinel() {
            self.stats.record_sentinel_timestamp();
        }

        let score = match self.scorer.score(raw.text()).await {
            Ok(score) => score,
            Err(e) => {
                warn!(error = %e, "Sentiment unavailable, using neutral score");
                SentimentScore::unavailable()
            }
        };
        self.stats.record_score(score.source);

        let document = build_document(&raw, created_at.into_value(), score.value);

        match self.persister.upsert(&document).await {
            PersistOutcome::Stored { created } => {
                self.stats.record_persisted();
                ItemOutcome::Persisted { score, created }
            }
            PersistOutcome::Failed { reason } => {
                self.stats.record_persist_failed();
                ItemOutcome::PersistFailed { score, reason }
            }
        }
    }

    /// Drain `items` until the producer hangs up, processing up to
    /// `concurrency` items at once. The channel's capacity is the backpressure
    /// bound on the producer.
    pub async fn run(&self, mut items: mpsc::Receiver<RawItem>) -> StatsSnapshot {
        let span = tracing::info_span!("ingest_run", run_id = %self.stats.run_id());

        async {
            info!(
                index = %self.index_manager.index(),
                concurrency = self.concurrency,
                "Ingest run started"
            );

            stream::poll_fn(|cx| items.poll_recv(cx))
                .map(|raw| self.process(raw))
                .buffer_unordered(self.concurrency)
                .for_each(|_| async {})
                .await;

            let snapshot = self.stats.snapshot();
            info!(
                received = snapshot.received,
                persisted = snapshot.persisted,
                "Ingest run finished"
            );
            snapshot
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::ScoreSource;
    use crate::testing::{raw_item, MemoryStore, ScriptedModel};

    fn pipeline(model: ScriptedModel, store: Arc<MemoryStore>) -> Pipeline {
        PipelineDeps::builder()
            .model(Arc::new(model))
            .store(store)
            .scorer(
                ScorerSettings::builder()
                    .timeout(Duration::from_millis(200))
                    .retry_base(Duration::ZERO)
                    .build(),
            )
            .build()
            .build_pipeline()
    }

    #[tokio::test]
    async fn duplicate_short_circuits() {
        let store = Arc::new(MemoryStore::new());
        let model = ScriptedModel::always("7");
        let pipeline = pipeline(model, store.clone());

        let first = pipeline.process(raw_item("1", "hello")).await;
        let second = pipeline.process(raw_item("1", "hello again")).await;

        assert!(matches!(first, ItemOutcome::Persisted { created: true, .. }));
        assert_eq!(second, ItemOutcome::Duplicate);
        assert_eq!(store.upsert_calls(), 1);
        assert_eq!(store.document("guoping", "1").unwrap().text, "hello");
    }

    #[tokio::test]
    async fn unavailable_scorer_falls_back_to_neutral() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(ScriptedModel::failing("dns error"), store.clone());

        let outcome = pipeline.process(raw_item("1", "text")).await;

        match outcome {
            ItemOutcome::Persisted { score, .. } => {
                assert_eq!(score.value, 5.0);
                assert_eq!(score.source, ScoreSource::Unavailable);
            }
            other => panic!("expected persisted, got {other:?}"),
        }
        assert_eq!(store.document("guoping", "1").unwrap().score, 5.0);
    }

    #[tokio::test]
    async fn bad_timestamp_is_counted_and_stored_as_sentinel() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(ScriptedModel::always("6"), store.clone());
        let raw = RawItem {
            created_at: Some("刚刚".into()),
            ..raw_item("1", "text")
        };

        pipeline.process(raw).await;

        assert_eq!(
            store.document("guoping", "1").unwrap().created_at,
            "1970-01-01 00:00:00"
        );
        assert_eq!(pipeline.stats().timestamps_sentinel, 1);
    }
}
