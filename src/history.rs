//! Bounded history of completed inpainting rounds

use crate::mask::MaskRaster;
use crate::types::{ImagePayload, IterationCount, JobId, ResultImage};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of entries retained by default
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Immutable record of one successful remote processing round
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: JobId,
    pub source: Arc<ImagePayload>,
    pub result: Arc<ResultImage>,
    pub mask: Arc<MaskRaster>,
    pub created_at: DateTime<Utc>,
    pub iterations: IterationCount,
}

/// Most-recent-first store that drops the oldest entry past its capacity
#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: VecDeque<Arc<HistoryEntry>>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Store keeping at most `capacity` entries (at least one)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert at the front, discarding whatever falls beyond the capacity
    pub fn append(&mut self, entry: HistoryEntry) -> Arc<HistoryEntry> {
        let entry = Arc::new(entry);
        self.entries.push_front(Arc::clone(&entry));
        self.entries.truncate(self.capacity);
        tracing::debug!(
            id = %entry.id,
            len = self.entries.len(),
            "History entry appended"
        );
        entry
    }

    /// Look up an entry by id without modifying the store
    #[must_use]
    pub fn select(&self, id: &JobId) -> Option<Arc<HistoryEntry>> {
        self.entries.iter().find(|e| &e.id == id).cloned()
    }

    #[must_use]
    pub fn front(&self) -> Option<&Arc<HistoryEntry>> {
        self.entries.front()
    }

    /// Entries newest first
    pub fn iter(&self) -> impl Iterator<Item = &Arc<HistoryEntry>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
