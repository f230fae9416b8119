use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::library::TrackId;

/// Default number of recently played tracks remembered.
pub const HISTORY_CAPACITY: usize = 10;

/// Bounded, deduplicated record of recently played tracks, most recent last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayHistory {
    capacity: usize,
    entries: VecDeque<TrackId>,
}

impl PlayHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild from stored ids in play order, keeping the newest `capacity`.
    pub fn from_ids(capacity: usize, ids: impl IntoIterator<Item = TrackId>) -> Self {
        let mut history = Self::with_capacity(capacity);
        for id in ids {
            history.record(id);
        }
        history
    }

    /// Mark `id` as just played. Re-playing moves it to the end.
    pub fn record(&mut self, id: TrackId) {
        if let Some(index) = self.entries.iter().position(|entry| *entry == id) {
            self.entries.remove(index);
        }
        self.entries.push_back(id);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.entries.contains(id)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&TrackId> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Owned copy for handing to [`find_next`](super::find_next).
    pub fn snapshot(&self) -> Vec<TrackId> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for PlayHistory {
    fn default() -> Self {
        Self::new()
    }
}
