use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tubewatch_detect::AdSignal;

/// Maximum number of events retained in the ring buffer.
const EVENT_LOG_CAPACITY: usize = 200;

/// A typed event from the detection pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    Navigation {
        url: String,
    },
    PassSkipped {
        reason: SkipReason,
    },
    CacheHit {
        video_id: String,
    },
    LookupFailed {
        video_id: String,
        message: String,
    },
    AdWatchArmed {
        signal: Option<AdSignal>,
    },
    AdWatchCleared,
    AdWatchExpired,
    RecordEmitted {
        video_id: Option<String>,
        duration: Option<String>,
    },
    /// A result arrived after the page moved to another video.
    StaleResult {
        video_id: String,
    },
}

/// Why a detection pass ended without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RateLimited,
    NotWatchPage,
    MissingVideoId,
    AlreadyCurrent,
}

/// A timestamped event entry.
pub type EventEntry = (DateTime<Utc>, DebugEvent);

/// Bounded ring buffer of debug events.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventEntry>,
    stats: CacheStats,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
            stats: CacheStats::default(),
        }
    }

    /// Push a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: DebugEvent) {
        if self.entries.len() >= EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), event));
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<EventEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record_hit(&mut self) {
        self.stats.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.stats.misses += 1;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }
}

/// Thread-safe handle to the event log.
pub type SharedEventLog = Arc<Mutex<EventLog>>;

/// Create a new shared event log.
pub fn shared_event_log() -> SharedEventLog {
    Arc::new(Mutex::new(EventLog::new()))
}

/// Result cache hit/miss counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}
