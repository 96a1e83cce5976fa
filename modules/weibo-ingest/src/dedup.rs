//! Per-run duplicate suppression keyed by post id.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Tracks the post ids admitted during the current run.
///
/// Membership test and insert happen under one lock acquisition, so two
/// workers racing on the same id can never both be admitted. State lives only
/// as long as the filter; a new run starts empty.
#[derive(Debug, Default)]
pub struct DuplicateFilter {
    seen: Mutex<HashSet<String>>,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `id` if it has not been seen this run. Returns false for a repeat.
    pub fn check_and_admit(&self, id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(id) {
            return false;
        }
        seen.insert(id.to_string())
    }

    /// Number of distinct ids admitted so far.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
