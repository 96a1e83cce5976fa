//! Repair of truncated `created_at` strings.
//!
//! The crawler emits "YYYY-MM-DD HH:MM" for most posts and occasionally the
//! full "YYYY-MM-DD HH:MM:SS". Anything else is replaced by the epoch
//! sentinel. Only the character count is checked; calendar validity is not.

use tracing::warn;

/// Placeholder for timestamps that cannot be repaired.
pub const EPOCH_SENTINEL: &str = "1970-01-01 00:00:00";

const MINUTE_PRECISION_LEN: usize = 16;
const SECOND_PRECISION_LEN: usize = 19;

/// What the normalizer did to a raw timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampRepair {
    /// Already at second precision.
    Unchanged(String),
    /// Minute precision; ":00" appended.
    SecondsAppended(String),
    /// Unrecognised shape; replaced by [`EPOCH_SENTINEL`].
    Sentinel,
}

impl TimestampRepair {
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.chars().count() {
            MINUTE_PRECISION_LEN => TimestampRepair::SecondsAppended(format!("{trimmed}:00")),
            SECOND_PRECISION_LEN => TimestampRepair::Unchanged(trimmed.to_string()),
            _ => TimestampRepair::Sentinel,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, TimestampRepair::Sentinel)
    }

    pub fn into_value(self) -> String {
        match self {
            TimestampRepair::Unchanged(value) | TimestampRepair::SecondsAppended(value) => value,
            TimestampRepair::Sentinel => EPOCH_SENTINEL.to_string(),
        }
    }
}

/// Normalize a raw `created_at`, warning when it falls back to the sentinel.
pub fn normalize_created_at(raw: &str) -> String {
    normalize_with_repair(raw).into_value()
}

/// Like [`normalize_created_at`] but keeps the classification for callers
/// that count repairs.
pub fn normalize_with_repair(raw: &str) -> TimestampRepair {
    let repair = TimestampRepair::classify(raw);
    if repair.is_sentinel() {
        warn!(created_at = raw, "Invalid created_at, using epoch sentinel");
    }
    repair
}
