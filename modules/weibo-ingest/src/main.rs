use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use elastic_client::ElasticClient;
use weibo_common::{Config, CrawlerItem, RawItem};
use weibo_ingest::pipeline::PipelineDeps;
use weibo_ingest::sentiment::ScorerSettings;

/// Default level for every workspace crate. `weibo` prefix-matches both
/// `weibo_common` and `weibo_ingest` targets.
const LOG_DIRECTIVES: [&str; 3] = ["weibo=info", "ai_client=info", "elastic_client=info"];

fn with_workspace_directives(mut filter: EnvFilter) -> Result<EnvFilter> {
    for directive in LOG_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = with_workspace_directives(EnvFilter::from_default_env())?;
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Weibo ingest starting...");

    // Load config
    let config = Config::from_env()?;
    config.log_redacted();

    let model = OpenAi::new(&config.sentiment_api_key, &config.sentiment_model)
        .with_base_url(&config.sentiment_base_url)
        .with_timeout(config.sentiment_timeout);

    let mut es = ElasticClient::new(&config.elasticsearch_url)?;
    if let (Some(user), Some(password)) = (
        &config.elasticsearch_username,
        &config.elasticsearch_password,
    ) {
        es = es.with_basic_auth(user, password);
    }

    let pipeline = PipelineDeps::builder()
        .model(Arc::new(model))
        .store(Arc::new(es))
        .index(config.elasticsearch_index.clone())
        .scorer(
            ScorerSettings::builder()
                .temperature(config.sentiment_temperature)
                .timeout(config.sentiment_timeout)
                .max_attempts(config.sentiment_max_attempts)
                .build(),
        )
        .persist_timeout(config.persist_timeout)
        .concurrency(config.concurrency)
        .build()
        .build_pipeline();

    let schema = pipeline.ensure_schema().await;
    info!(?schema, index = %config.elasticsearch_index, "Schema check done");

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let producer = tokio::spawn(read_crawler_items(tx));

    let summary = pipeline.run(rx).await;

    match producer.await {
        Ok(Ok(lines)) => info!(lines, "Crawler input exhausted"),
        Ok(Err(e)) => warn!(error = %e, "Reading crawler input failed"),
        Err(e) => warn!(error = %e, "Crawler input task panicked"),
    }

    info!("{summary}");
    Ok(())
}

/// Feed newline-delimited crawler items from stdin into the pipeline.
/// `send` waits while the channel is full. Returns the number of lines read.
async fn read_crawler_items(tx: mpsc::Sender<RawItem>) -> std::io::Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match CrawlerItem::from_json(&line) {
            Ok(item) => {
                if tx.send(item.into_raw()).await.is_err() {
                    warn!(line = line_no, "Pipeline stopped accepting items");
                    break;
                }
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed crawler item"),
        }
    }

    Ok(line_no)
}
