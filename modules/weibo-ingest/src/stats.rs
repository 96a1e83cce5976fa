use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::sentiment::ScoreSource;

/// Live counters for one ingest run. Shared by all workers.
#[derive(Debug)]
pub struct IngestStats {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    received: AtomicU32,
    duplicates: AtomicU32,
    timestamps_sentinel: AtomicU32,
    scored_by_model: AtomicU32,
    scores_unparseable: AtomicU32,
    scores_unavailable: AtomicU32,
    persisted: AtomicU32,
    persist_failed: AtomicU32,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            received: AtomicU32::new(0),
            duplicates: AtomicU32::new(0),
            timestamps_sentinel: AtomicU32::new(0),
            scored_by_model: AtomicU32::new(0),
            scores_unparseable: AtomicU32::new(0),
            scores_unavailable: AtomicU32::new(0),
            persisted: AtomicU32::new(0),
            persist_failed: AtomicU32::new(0),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sentinel_timestamp(&self) {
        self.timestamps_sentinel.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_score(&self, source: ScoreSource) {
        let counter = match source {
            ScoreSource::Model => &self.scored_by_model,
            ScoreSource::Unparseable => &self.scores_unparseable,
            ScoreSource::Unavailable => &self.scores_unavailable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failed(&self) {
        self.persist_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            run_id: self.run_id,
            started_at: self.started_at,
            taken_at: Utc::now(),
            received: self.received.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            timestamps_sentinel: self.timestamps_sentinel.load(Ordering::Relaxed),
            scored_by_model: self.scored_by_model.load(Ordering::Relaxed),
            scores_unparseable: self.scores_unparseable.load(Ordering::Relaxed),
            scores_unavailable: self.scores_unavailable.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
    pub received: u32,
    pub duplicates: u32,
    pub timestamps_sentinel: u32,
    pub scored_by_model: u32,
    pub scores_unparseable: u32,
    pub scores_unavailable: u32,
    pub persisted: u32,
    pub persist_failed: u32,
}

impl StatsSnapshot {
    /// Items that made it past the duplicate filter. Counters are loaded
    /// one by one, so a mid-run snapshot may be momentarily inconsistent.
    pub fn admitted(&self) -> u32 {
        self.received.saturating_sub(self.duplicates)
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let elapsed = self.taken_at - self.started_at;
        writeln!(f, "\n=== Ingest Run Complete ===")?;
        writeln!(f, "Run id:             {}", self.run_id)?;
        writeln!(f, "Elapsed:            {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)?;
        writeln!(f, "Items received:     {}", self.received)?;
        writeln!(f, "Duplicates dropped: {}", self.duplicates)?;
        writeln!(f, "Admitted:           {}", self.admitted())?;
        writeln!(f, "Bad timestamps:     {}", self.timestamps_sentinel)?;
        writeln!(f, "\nSentiment:")?;
        writeln!(f, "  Model scored:     {}", self.scored_by_model)?;
        writeln!(f, "  Unparseable (5):  {}", self.scores_unparseable)?;
        writeln!(f, "  Unavailable (5):  {}", self.scores_unavailable)?;
        writeln!(f, "\nStorage:")?;
        writeln!(f, "  Persisted:        {}", self.persisted)?;
        write!(f, "  Failed:           {}", self.persist_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_feed_snapshot() {
        let stats = IngestStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_duplicate();
        stats.record_score(ScoreSource::Unavailable);
        stats.record_persist_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.admitted(), 1);
        assert_eq!(snapshot.scores_unavailable, 1);
        assert_eq!(snapshot.scored_by_model, 0);
        assert_eq!(snapshot.persist_failed, 1);
        assert_eq!(snapshot.run_id, stats.run_id());
    }

    #[test]
    fn admitted_never_underflows_on_torn_snapshot() {
        let stats = IngestStats::new();
        stats.record_duplicate();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 0);
        assert_eq!(snapshot.admitted(), 0);
        assert!(snapshot.to_string().contains("Admitted:           0"));
    }

    #[test]
    fn report_lists_counts() {
        let stats = IngestStats::new();
        stats.record_received();
        stats.record_score(ScoreSource::Model);
        stats.record_persisted();

        let report = stats.snapshot().to_string();
        assert!(report.contains("Items received:     1"));
        assert!(report.contains("Admitted:           1"));
        assert!(report.contains("Model scored:     1"));
        assert!(report.contains("Persisted:        1"));
    }
}
