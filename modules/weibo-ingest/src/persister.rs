//! Document upserts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use weibo_common::EnrichedDocument;

use crate::traits::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// `created` is false when a document with the same id was replaced.
    Stored { created: bool },
    Failed { reason: String },
}

impl PersistOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PersistOutcome::Stored { .. })
    }
}

pub struct Persister {
    store: Arc<dyn DocumentStore>,
    index: String,
    timeout: Duration,
}

impl Persister {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            index: index.into(),
            timeout,
        }
    }

    /// Write `document` keyed by its id, last write wins. Failures, including
    /// the deadline, are logged and returned as `Failed`; nothing is retried.
    pub async fn upsert(&self, document: &EnrichedDocument) -> PersistOutcome {
        let call = self.store.upsert(&self.index, document, self.timeout);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => {
                debug!(id = %document.id, index = %self.index, created = result.created, "Stored document");
                PersistOutcome::Stored {
                    created: result.created,
                }
            }
            Ok(Err(e)) => {
                warn!(id = %document.id, index = %self.index, error = %e, "Failed to store document");
                PersistOutcome::Failed {
                    reason: format!("{e:#}"),
                }
            }
            Err(_) => {
                warn!(
                    id = %document.id,
                    index = %self.index,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Storing document timed out"
                );
                PersistOutcome::Failed {
                    reason: format!("timed out after {:?}", self.timeout),
                }
            }
        }
    }
}
