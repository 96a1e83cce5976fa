pub mod dedup;
pub mod index_manager;
pub mod mapper;
pub mod persister;
pub mod pipeline;
pub mod sentiment;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod timestamp;
pub mod traits;

pub use dedup::DuplicateFilter;
pub use index_manager::{IndexManager, SchemaStatus};
pub use persister::{PersistOutcome, Persister};
pub use pipeline::{ItemOutcome, Pipeline};
pub use sentiment::{ScoreSource, ScoringError, SentimentScore, SentimentScorer};
pub use stats::{IngestStats, StatsSnapshot};
