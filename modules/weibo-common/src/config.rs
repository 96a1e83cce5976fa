use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::IngestError;

/// Upper bound for `SENTIMENT_MAX_ATTEMPTS`.
pub const MAX_SENTIMENT_ATTEMPTS: u32 = 10;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Sentiment scoring service (OpenAI-compatible)
    pub sentiment_api_key: String,
    pub sentiment_base_url: String,
    pub sentiment_model: String,
    pub sentiment_temperature: f32,
    pub sentiment_timeout: Duration,
    pub sentiment_max_attempts: u32,

    // Elasticsearch
    pub elasticsearch_url: String,
    pub elasticsearch_username: Option<String>,
    pub elasticsearch_password: Option<String>,
    pub elasticsearch_index: String,
    pub persist_timeout: Duration,

    // Pipeline
    pub concurrency: usize,
    pub queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, IngestError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            sentiment_api_key: get("SENTIMENT_API_KEY").ok_or_else(|| {
                IngestError::Config("SENTIMENT_API_KEY environment variable is required".into())
            })?,
            sentiment_base_url: get("SENTIMENT_BASE_URL")
                .unwrap_or_else(|| "https://api.deepseek.com".to_string()),
            sentiment_model: get("SENTIMENT_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
            sentiment_temperature: parsed(&get, "SENTIMENT_TEMPERATURE", 0.5)?,
            sentiment_timeout: Duration::from_secs(parsed(&get, "SENTIMENT_TIMEOUT_SECS", 30)?),
            sentiment_max_attempts: parsed(&get, "SENTIMENT_MAX_ATTEMPTS", 3)?,
            elasticsearch_url: get("ELASTICSEARCH_URL")
                .unwrap_or_else(|| "http://localhost:9200".to_string()),
            elasticsearch_username: get("ELASTICSEARCH_USERNAME"),
            elasticsearch_password: get("ELASTICSEARCH_PASSWORD"),
            elasticsearch_index: get("ELASTICSEARCH_INDEX").unwrap_or_else(|| "guoping".to_string()),
            persist_timeout: Duration::from_secs(parsed(&get, "PERSIST_TIMEOUT_SECS", 30)?),
            concurrency: parsed(&get, "INGEST_CONCURRENCY", 4)?,
            queue_capacity: parsed(&get, "INGEST_QUEUE_CAPACITY", 64)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if !(0.0..=2.0).contains(&self.sentiment_temperature) {
            return Err(IngestError::Config(format!(
                "SENTIMENT_TEMPERATURE must be within 0.0..=2.0, got {}",
                self.sentiment_temperature
            )));
        }
        if !(1..=MAX_SENTIMENT_ATTEMPTS).contains(&self.sentiment_max_attempts) {
            return Err(IngestError::Config(format!(
                "SENTIMENT_MAX_ATTEMPTS must be within 1..={MAX_SENTIMENT_ATTEMPTS}, got {}",
                self.sentiment_max_attempts
            )));
        }
        if self.concurrency == 0 || self.queue_capacity == 0 {
            return Err(IngestError::Config(
                "INGEST_CONCURRENCY and INGEST_QUEUE_CAPACITY must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            sentiment_base_url = %self.sentiment_base_url,
            sentiment_model = %self.sentiment_model,
            sentiment_api_key = redact(&self.sentiment_api_key),
            sentiment_temperature = self.sentiment_temperature,
            sentiment_timeout_secs = self.sentiment_timeout.as_secs(),
            sentiment_max_attempts = self.sentiment_max_attempts,
            elasticsearch_url = %self.elasticsearch_url,
            elasticsearch_index = %self.elasticsearch_index,
            elasticsearch_auth = self.elasticsearch_username.is_some(),
            persist_timeout_secs = self.persist_timeout.as_secs(),
            concurrency = self.concurrency,
            queue_capacity = self.queue_capacity,
            "Loaded configuration"
        );
    }
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> Result<T, IngestError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IngestError::Config(format!("{key} is invalid ({raw}): {e}"))),
        None => Ok(default),
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
