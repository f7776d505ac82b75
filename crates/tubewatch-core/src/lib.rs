pub mod ad_watch;
pub mod cache;
pub mod config;
pub mod debug_log;
pub mod detection;
pub mod error;
pub mod identity;
pub mod messages;
pub mod models;
pub mod notify;
pub mod retry;
pub mod scheduler;

pub use ad_watch::AdWatch;
pub use cache::ResultCache;
pub use config::{AppConfig, Timings};
pub use detection::{DetectionState, Detector, PassOutcome, PendingLookup};
pub use error::CoreError;
pub use identity::{fallback_title, IdentityResolver};
pub use messages::{DetectorMessage, ExtractionRequest};
pub use models::{DurationText, Identity, VideoRecord};
pub use notify::Notifier;
pub use retry::{resolve_with_retry, RetryPolicy};
pub use scheduler::{DetectorHandle, SchedulerState};
