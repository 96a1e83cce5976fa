//! End-to-end pipeline tests: crawler items → Pipeline::run → MemoryStore.
//!
//! The sentiment model and the search index are in-memory mocks, so every
//! failure mode can be forced. No network, no Elasticsearch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use weibo_common::{CrawlerItem, RawItem, NEUTRAL_SCORE};
use weibo_ingest::index_manager::index_mapping;
use weibo_ingest::pipeline::PipelineDeps;
use weibo_ingest::sentiment::ScorerSettings;
use weibo_ingest::testing::{raw_item, MemoryStore, ScriptedModel};
use weibo_ingest::{ItemOutcome, Pipeline, SchemaStatus, ScoreSource};

const INDEX: &str = "guoping";

fn build(model: ScriptedModel, store: Arc<MemoryStore>, concurrency: usize) -> Pipeline {
    PipelineDeps::builder()
        .model(Arc::new(model))
        .store(store)
        .index(INDEX)
        .scorer(
            ScorerSettings::builder()
                .timeout(Duration::from_millis(200))
                .max_attempts(2)
                .retry_base(Duration::ZERO)
                .build(),
        )
        .persist_timeout(Duration::from_millis(500))
        .concurrency(concurrency)
        .build()
        .build_pipeline()
}

async fn run_items(pipeline: &Pipeline, items: Vec<RawItem>, capacity: usize) {
    let (tx, rx) = mpsc::channel(capacity);
    let producer = tokio::spawn(async move {
        for item in items {
            tx.send(item).await.unwrap();
        }
    });
    pipeline.run(rx).await;
    producer.await.unwrap();
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn each_id_is_persisted_at_most_once_per_run() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = build(ScriptedModel::always("7"), store.clone(), 8);

    let items: Vec<RawItem> = (0..60)
        .map(|i| raw_item(&format!("post-{}", i % 20), &format!("text {i}")))
        .collect();
    run_items(&pipeline, items, 4).await;

    let stats = pipeline.stats();
    assert_eq!(stats.received, 60);
    assert_eq!(stats.duplicates, 40);
    assert_eq!(stats.persisted, 20);
    assert_eq!(store.upsert_calls(), 20);
    assert_eq!(store.document_count(INDEX), 20);
}

#[tokio::test]
async fn later_run_overwrites_earlier_document() {
    let store = Arc::new(MemoryStore::new());

    let first = build(ScriptedModel::always("2"), store.clone(), 1);
    first.process(raw_item("42", "before")).await;

    let second = build(ScriptedModel::always("9"), store.clone(), 1);
    let outcome = second.process(raw_item("42", "after")).await;

    assert!(matches!(outcome, ItemOutcome::Persisted { created: false, .. }));
    let doc = store.document(INDEX, "42").unwrap();
    assert_eq!(doc.text, "after");
    assert_eq!(doc.score, 9.0);
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn crawler_line_becomes_enriched_document() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = build(ScriptedModel::always("8"), store.clone(), 1);

    let line = r#"{
        "weibo": {
            "id": "4981234567890123",
            "bid": "NzY8qB3xP",
            "user_id": "1669879400",
            "screen_name": "旅行日记",
            "text": "终于到了大理，阳光真好",
            "topics": "旅行, 大理 ,,",
            "reposts_count": 3,
            "comments_count": 10,
            "attitudes_count": 250,
            "created_at": "2024-05-01 12:30",
            "source": "iPhone 15 Pro",
            "pics": ["https://wx1.sinaimg.cn/a.jpg", "https://wx1.sinaimg.cn/b.jpg"],
            "ip": "云南"
        },
        "keyword": "大理"
    }"#;
    let raw = CrawlerItem::from_json(line).unwrap().into_raw();

    pipeline.process(raw).await;

    let doc = store.document(INDEX, "4981234567890123").unwrap();
    assert_eq!(doc.created_at, "2024-05-01 12:30:00");
    assert_eq!(doc.topics, vec!["旅行", "大理"]);
    assert_eq!(
        doc.pics_url,
        "https://wx1.sinaimg.cn/a.jpg,https://wx1.sinaimg.cn/b.jpg"
    );
    assert_eq!(doc.score, 8.0);
    assert_eq!(doc.keyword, "大理");
    assert_eq!(doc.video_url, "");
    assert_eq!(doc.retweet_id, "");
    assert_eq!(doc.attitudes_count, 250);
}

#[tokio::test]
async fn every_score_lands_in_range_or_neutral() {
    let store = Arc::new(MemoryStore::new());
    let model = ScriptedModel::always("5")
        .on_text("happy", "9")
        .on_text("sad", "2")
        .on_text("rambling", "Overall the tone seems positive.")
        .on_text("huge", "99")
        .fail_on_text("offline", "connection reset by peer");
    let pipeline = build(model, store.clone(), 3);

    let items = vec![
        raw_item("1", "happy day"),
        raw_item("2", "sad news"),
        raw_item("3", "rambling post"),
        raw_item("4", "huge number"),
        raw_item("5", "offline scorer"),
    ];
    run_items(&pipeline, items, 2).await;

    let score = |id: &str| store.document(INDEX, id).unwrap().score;
    assert_eq!(score("1"), 9.0);
    assert_eq!(score("2"), 2.0);
    assert_eq!(score("3"), NEUTRAL_SCORE);
    assert_eq!(score("4"), NEUTRAL_SCORE);
    assert_eq!(score("5"), NEUTRAL_SCORE);

    let stats = pipeline.stats();
    assert_eq!(stats.scored_by_model, 2);
    assert_eq!(stats.scores_unparseable, 2);
    assert_eq!(stats.scores_unavailable, 1);
}

#[tokio::test]
async fn scoring_sources_are_distinguished() {
    let store = Arc::new(MemoryStore::new());
    let model = ScriptedModel::always("n/a").fail_on_text("down", "503");
    let pipeline = build(model, store, 1);

    let unparseable = pipeline.process(raw_item("1", "fine")).await;
    let unavailable = pipeline.process(raw_item("2", "down")).await;

    let source = |outcome: &ItemOutcome| match outcome {
        ItemOutcome::Persisted { score, .. } => score.source,
        other => panic!("expected persisted, got {other:?}"),
    };
    assert_eq!(source(&unparseable), ScoreSource::Unparseable);
    assert_eq!(source(&unavailable), ScoreSource::Unavailable);
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ensure_schema_twice_creates_one_index() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = build(ScriptedModel::always("5"), store.clone(), 1);

    assert_eq!(pipeline.ensure_schema().await, SchemaStatus::Created);
    assert_eq!(pipeline.ensure_schema().await, SchemaStatus::AlreadyExists);

    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.mapping(INDEX), Some(index_mapping()));
}

#[tokio::test]
async fn failed_schema_creation_does_not_stop_ingest() {
    let store = Arc::new(MemoryStore::new().failing_create("cluster_block_exception"));
    let pipeline = build(ScriptedModel::always("6"), store.clone(), 1);

    assert_eq!(pipeline.ensure_schema().await, SchemaStatus::Unconfirmed);
    let outcome = pipeline.process(raw_item("1", "text")).await;

    assert!(matches!(outcome, ItemOutcome::Persisted { .. }));
    assert!(store.document(INDEX, "1").is_some());
}

// ---------------------------------------------------------------------------
// Persistence failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persistence_failure_does_not_block_next_item() {
    let store = Arc::new(MemoryStore::new().failing_upsert_for("bad"));
    let pipeline = build(ScriptedModel::always("7"), store.clone(), 1);

    let failed = pipeline.process(raw_item("bad", "text")).await;
    let stored = pipeline.process(raw_item("good", "text")).await;

    assert!(matches!(failed, ItemOutcome::PersistFailed { .. }));
    assert!(matches!(stored, ItemOutcome::Persisted { .. }));
    assert!(store.document(INDEX, "good").is_some());

    // A failed item is still "processed": resending it is a duplicate.
    let resent = pipeline.process(raw_item("bad", "text")).await;
    assert_eq!(resent, ItemOutcome::Duplicate);
}

#[tokio::test]
async fn unreachable_store_degrades_every_item() {
    let store = Arc::new(MemoryStore::unreachable());
    let pipeline = build(ScriptedModel::always("7"), store, 2);

    assert_eq!(pipeline.ensure_schema().await, SchemaStatus::Unconfirmed);
    let items = (0..5).map(|i| raw_item(&i.to_string(), "text")).collect();
    run_items(&pipeline, items, 1).await;

    let stats = pipeline.stats();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.persist_failed, 5);
    assert_eq!(stats.persisted, 0);
}

#[tokio::test]
async fn slow_store_times_out_per_item() {
    let store = Arc::new(MemoryStore::new().slow_upserts(Duration::from_secs(10)));
    let pipeline = build(ScriptedModel::always("7"), store.clone(), 2);

    let items = vec![raw_item("1", "a"), raw_item("2", "b")];
    run_items(&pipeline, items, 1).await;

    assert_eq!(pipeline.stats().persist_failed, 2);
    assert_eq!(store.document_count(INDEX), 0);
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_queue_pushes_back_on_producer() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = build(ScriptedModel::hanging(), store.clone(), 1);

    let (tx, rx) = mpsc::channel(1);
    let run = pipeline.run(rx);
    tokio::pin!(run);

    tx.send(raw_item("a", "text")).await.unwrap();
    // Let the single worker take "a" and block on the model.
    tokio::select! {
        _ = &mut run => panic!("run finished while the sender is open"),
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    // The worker is busy, so only the one queue slot is free.
    tx.try_send(raw_item("b", "text")).unwrap();
    assert!(matches!(
        tx.try_send(raw_item("c", "text")),
        Err(TrySendError::Full(_))
    ));

    drop(tx);
    let summary = run.await;
    assert_eq!(summary.received, 2);
    assert_eq!(summary.scores_unavailable, 2);
    assert_eq!(store.document_count(INDEX), 2);
}

#[tokio::test]
async fn run_never_exceeds_configured_concurrency() {
    let model = Arc::new(ScriptedModel::always("6").with_delay(Duration::from_millis(30)));
    let store = Arc::new(MemoryStore::new());
    let pipeline = PipelineDeps::builder()
        .model(model.clone())
        .store(store.clone())
        .index(INDEX)
        .scorer(ScorerSettings::builder().retry_base(Duration::ZERO).build())
        .concurrency(3)
        .build()
        .build_pipeline();

    let items = (0..20).map(|i| raw_item(&format!("post-{i}"), "text")).collect();
    run_items(&pipeline, items, 8).await;

    assert_eq!(store.document_count(INDEX), 20);
    assert_eq!(model.calls(), 20);
    let peak = model.peak_in_flight();
    assert!(peak <= 3, "peak in-flight {peak} exceeds concurrency");
    assert!(peak > 1, "items were never processed concurrently");
}
