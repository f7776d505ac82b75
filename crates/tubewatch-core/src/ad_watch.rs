use std::sync::atomic::{AtomicBool, Ordering};

use tubewatch_detect::AdWatchHook;

/// Shared flag saying an ad-completion watch is armed.
///
/// Duration resolution arms it from whatever task it runs on; the scheduler
/// owns the polling that clears it.
#[derive(Debug, Default)]
pub struct AdWatch {
    active: AtomicBool,
}

impl AdWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disarm; returns whether the watch was armed.
    pub fn clear(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

impl AdWatchHook for AdWatch {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn arm(&self) -> bool {
        !self.active.swap(true, Ordering::AcqRel)
    }
}
