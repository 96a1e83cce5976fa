//! Sentiment scoring through an external chat model.
//!
//! Failure layers:
//! - no usable reply (network, protocol, empty, deadline) after the retry
//!   budget: `Err(ScoringError)`, and the caller decides the fallback;
//! - a reply that is not a number in [1, 10]: neutral score, tagged
//!   `ScoreSource::Unparseable`. Never retried, the model answered.

use std::sync::Arc;
use std::time::Duration;

use ai_client::{strip_code_blocks, truncate_to_char_boundary};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use weibo_common::NEUTRAL_SCORE;

use crate::traits::SentimentModel;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Ceiling for a single retry backoff, jitter excluded.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are an expert in sentiment analysis of Weibo posts.";

fn build_prompt(text: &str) -> String {
    format!(
        "Rate the sentiment of the following Weibo post on a scale from 1 to 10, where \
         1-4 means negative, 5 means neutral and 6-10 means positive. Reply with a single \
         integer only and no explanation. If you cannot judge, reply 5.\n\nPost: {text}\n"
    )
}

/// Where a score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// Parsed from the model's reply.
    Model,
    /// The model replied, but not with a usable number.
    Unparseable,
    /// No reply could be obtained; substituted by the pipeline.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub value: f64,
    pub source: ScoreSource,
}

impl SentimentScore {
    pub fn neutral(source: ScoreSource) -> Self {
        Self {
            value: NEUTRAL_SCORE,
            source,
        }
    }

    /// The caller-side fallback for `Err(ScoringError)`.
    pub fn unavailable() -> Self {
        Self::neutral(ScoreSource::Unavailable)
    }
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("sentiment service unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ScorerSettings {
    #[builder(default = 0.5)]
    pub temperature: f32,
    /// Deadline for a single attempt.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    /// Total attempts for transport failures, including the first.
    #[builder(default = 3)]
    pub max_attempts: u32,
    /// Backoff before retry n is `retry_base * 3^n`, capped at one minute,
    /// plus up to a third of `retry_base` of jitter.
    #[builder(default = Duration::from_secs(1))]
    pub retry_base: Duration,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub struct SentimentScorer {
    model: Arc<dyn SentimentModel>,
    settings: ScorerSettings,
}

impl SentimentScorer {
    pub fn new(model: Arc<dyn SentimentModel>, settings: ScorerSettings) -> Self {
        Self { model, settings }
    }

    /// Score `text` in [1, 10].
    pub async fn score(&self, text: &str) -> Result<SentimentScore, ScoringError> {
        let prompt = build_prompt(text);
        let reply = self.request_with_retry(&prompt).await?;

        Ok(match parse_score(&reply) {
            Some(value) => {
                debug!(score = value, "Sentiment scored");
                SentimentScore {
                    value,
                    source: ScoreSource::Model,
                }
            }
            None => {
                warn!(
                    reply = truncate_to_char_boundary(reply.trim(), 64),
                    "Sentiment reply is not a score, using neutral"
                );
                SentimentScore::neutral(ScoreSource::Unparseable)
            }
        })
    }

    async fn request_with_retry(&self, prompt: &str) -> Result<String, ScoringError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut reason = String::new();

        for attempt in 0..attempts {
            let call = self
                .model
                .classify(SYSTEM_PROMPT, prompt, self.settings.temperature);

            match tokio::time::timeout(self.settings.timeout, call).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => reason = format!("{e:#}"),
                Err(_) => {
                    reason = format!(
                        "deadline of {}ms exceeded",
                        self.settings.timeout.as_millis()
                    )
                }
            }

            if attempt + 1 < attempts {
                let backoff = self.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %reason,
                    "Sentiment request failed, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(ScoringError::Unavailable { attempts, reason })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.settings.retry_base;
        let jitter_cap = (base.as_millis() / 3) as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_cap)
        };
        base.saturating_mul(3u32.saturating_pow(attempt)).min(MAX_BACKOFF)
            + Duration::from_millis(jitter)
    }
}

/// Parse a model reply into a score. `None` unless the reply is a single
/// finite number within [1, 10].
pub fn parse_score(reply: &str) -> Option<f64> {
    let value: f64 = strip_code_blocks(reply).parse().ok()?;
    (value.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&value)).then_some(value)
}
