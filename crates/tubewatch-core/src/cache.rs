use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::models::VideoRecord;

/// Default number of records kept.
pub const DEFAULT_CAPACITY: usize = 50;

/// Bounded map of resolved records keyed by video identifier.
///
/// Eviction is first-in first-out: re-inserting an existing key replaces its
/// value but keeps its original slot, and reads do not refresh anything.
#[derive(Debug, Clone)]
pub struct ResultCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, VideoRecord>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            entries: HashMap::with_capacity(capacity + 1),
        }
    }

    pub fn get(&self, video_id: &str) -> Option<&VideoRecord> {
        self.entries.get(video_id)
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.entries.contains_key(video_id)
    }

    /// Insert a record; returns the identifier evicted to stay in bounds.
    pub fn insert(&mut self, video_id: impl Into<String>, record: VideoRecord) -> Option<String> {
        let video_id = video_id.into();
        if self.entries.insert(video_id.clone(), record).is_some() {
            return None;
        }
        self.order.push_back(video_id);

        if self.order.len() > self.capacity {
            let evicted = self.order.pop_front()?;
            self.entries.remove(&evicted);
            debug!(video_id = %evicted, "Evicted oldest cached record");
            return Some(evicted);
        }
        None
    }

    /// Identifiers from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
