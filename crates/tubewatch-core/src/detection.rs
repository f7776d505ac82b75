//! One detection pass over the page.
//!
//! A pass is split in two so the scheduler can keep owning all state while
//! the title lookup runs on its own task: [`Detector::plan`] decides what to
//! do and applies everything that needs no network, and
//! [`Detector::apply`] folds a finished lookup back in.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument};
use tubewatch_api::TitleLookup;
use tubewatch_detect::{AdClassifier, DurationResolver, PageReader};

use crate::ad_watch::AdWatch;
use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::debug_log::{shared_event_log, DebugEvent, EventLog, SharedEventLog, SkipReason};
use crate::error::CoreError;
use crate::identity::IdentityResolver;
use crate::models::{DurationText, Identity, VideoRecord};
use crate::notify::Notifier;

/// Everything the detector remembers between passes.
#[derive(Debug, Default)]
pub struct DetectionState {
    pub current: Option<VideoRecord>,
    pub cache: ResultCache,
    /// When the last pass finished.
    pub last_detection: Option<Instant>,
}

/// A title lookup a pass decided it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLookup {
    pub url: String,
    pub video_id: String,
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Nothing changed.
    Skipped(SkipReason),
    /// Left the watch page; the current record was cleared.
    Cleared,
    /// A cached record became current.
    CacheHit(VideoRecord),
    /// The current record's placeholder duration was replaced.
    Refreshed(VideoRecord),
    /// A lookup is needed to finish the pass.
    Lookup(PendingLookup),
    /// The lookup finished; holds the record made current, if any.
    Detected(Option<VideoRecord>),
}

/// Owns the detection state and runs passes against a page.
pub struct Detector<L> {
    state: DetectionState,
    identity: Arc<IdentityResolver<L>>,
    notifier: Notifier,
    events: SharedEventLog,
    rate_gate: Duration,
}

impl<L: TitleLookup + 'static> Detector<L> {
    pub fn new(identity: IdentityResolver<L>, cache_capacity: usize, rate_gate: Duration) -> Self {
        let events = shared_event_log();
        Self {
            state: DetectionState {
                cache: ResultCache::new(cache_capacity),
                ..Default::default()
            },
            identity: Arc::new(identity.with_event_log(Arc::clone(&events))),
            notifier: Notifier::new(),
            events,
            rate_gate,
        }
    }

    /// Wire a detector from configuration around a title lookup.
    pub fn from_config(config: &AppConfig, lookup: L) -> Result<Self, CoreError> {
        let catalog = Arc::new(config.selector_catalog()?);
        let durations = DurationResolver::new(AdClassifier::new(catalog));
        let identity = IdentityResolver::new(Arc::new(lookup), durations, Arc::new(AdWatch::new()))
            .with_retry(config.retry_policy())
            .with_timeout(config.lookup_timeout());
        Ok(Self::new(
            identity,
            config.cache.capacity,
            config.timings().rate_gate,
        ))
    }

    pub fn current(&self) -> Option<&VideoRecord> {
        self.state.current.as_ref()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.state.cache
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn identity(&self) -> &Arc<IdentityResolver<L>> {
        &self.identity
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn events(&self) -> &SharedEventLog {
        &self.events
    }

    /// Time left before the rate gate admits another pass.
    pub fn rate_gate_remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.state.last_detection?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.rate_gate).then(|| self.rate_gate - elapsed)
    }

    /// Run everything in a pass that needs no lookup.
    ///
    /// Returns [`PassOutcome::Lookup`] when the pass must be finished with
    /// [`apply`](Self::apply) once the identity is resolved.
    #[instrument(skip_all)]
    pub fn plan(&mut self, page: &dyn PageReader, now: Instant) -> PassOutcome {
        if self.rate_gate_remaining(now).is_some() {
            debug!("Rate limited, skipping pass");
            return self.skip(SkipReason::RateLimited);
        }

        if !page.is_watch_page() {
            self.state.last_detection = Some(now);
            if self.state.current.as_ref().is_some_and(|r| r.is_valid) {
                info!("Left the watch page, clearing current video");
                self.set_current(None);
                return PassOutcome::Cleared;
            }
            return self.skip(SkipReason::NotWatchPage);
        }

        let Some(video_id) = page.video_id_from_url() else {
            self.state.last_detection = Some(now);
            debug!("Watch page without a video id");
            return self.skip(SkipReason::MissingVideoId);
        };
        let url = page.current_url();

        if let Some(current) = self.state.current.clone().filter(|r| r.url == url) {
            self.state.last_detection = Some(now);
            if current.duration.is_sentinel() {
                if let Some(refreshed) = self.refresh_duration(page, &current) {
                    info!(
                        video_id = %refreshed.video_id,
                        duration = %refreshed.duration,
                        "Refreshed duration"
                    );
                    self.state.cache.insert(video_id, refreshed.clone());
                    self.set_current(Some(refreshed.clone()));
                    return PassOutcome::Refreshed(refreshed);
                }
            }
            return self.skip(SkipReason::AlreadyCurrent);
        }

        if let Some(cached) = self.state.cache.get(&video_id).cloned() {
            self.state.last_detection = Some(now);
            self.log(DebugEvent::CacheHit {
                video_id: video_id.clone(),
            });
            self.with_log(|log| log.record_hit());

            let record = match self.refresh_duration(page, &cached) {
                Some(refreshed) => {
                    self.state.cache.insert(video_id.clone(), refreshed.clone());
                    refreshed
                }
                _ => cached,
            };
            info!(video_id = %video_id, "Using cached video");
            self.set_current(Some(record.clone()));
            return PassOutcome::CacheHit(record);
        }

        self.with_log(|log| log.record_miss());
        debug!(video_id = %video_id, "Needs lookup");
        PassOutcome::Lookup(PendingLookup { url, video_id })
    }

    /// Finish a pass with the resolved identity.
    ///
    /// The record is cached either way, but only becomes current while the
    /// page still shows the same video. Returns the record made current.
    pub fn apply(
        &mut self,
        page: &dyn PageReader,
        pending: PendingLookup,
        identity: Option<Identity>,
        now: Instant,
    ) -> Option<VideoRecord> {
        self.state.last_detection = Some(now);
        let Some(identity) = identity else {
            debug!(video_id = %pending.video_id, "No identity, keeping current video");
            return None;
        };

        let record = VideoRecord::new(pending.url, pending.video_id.clone(), identity);
        self.state.cache.insert(pending.video_id.clone(), record.clone());

        if page.video_id_from_url().as_deref() != Some(pending.video_id.as_str()) {
            info!(video_id = %pending.video_id, "Page moved on, cached result without emitting");
            self.log(DebugEvent::StaleResult {
                video_id: pending.video_id,
            });
            return None;
        }

        info!(
            video_id = %record.video_id,
            title = %record.title,
            duration = %record.duration,
            "Video detected"
        );
        self.set_current(Some(record.clone()));
        Some(record)
    }

    /// Run a whole pass inline, awaiting the lookup when one is needed.
    pub async fn run_pass(&mut self, page: &dyn PageReader) -> PassOutcome {
        match self.plan(page, Instant::now()) {
            PassOutcome::Lookup(pending) => {
                let identity = self.identity.resolve_identity(page, &pending.video_id).await;
                PassOutcome::Detected(self.apply(page, pending, identity, Instant::now()))
            }
            outcome => outcome,
        }
    }

    /// Single resolve for a record holding a placeholder duration.
    fn refresh_duration(&self, page: &dyn PageReader, record: &VideoRecord) -> Option<VideoRecord> {
        if !record.duration.is_sentinel() {
            return None;
        }
        let resolved = self
            .identity
            .durations()
            .resolve(page, self.identity.ad_watch().as_ref())
            .and_then(DurationText::clock)?;
        Some(record.with_duration(resolved))
    }

    fn set_current(&mut self, record: Option<VideoRecord>) {
        self.state.current = record.clone();
        self.log(DebugEvent::RecordEmitted {
            video_id: record.as_ref().map(|r| r.video_id.clone()),
            duration: record.as_ref().map(|r| r.duration.to_string()),
        });
        self.notifier.notify(record);
    }

    fn skip(&self, reason: SkipReason) -> PassOutcome {
        self.log(DebugEvent::PassSkipped { reason });
        PassOutcome::Skipped(reason)
    }

    fn log(&self, event: DebugEvent) {
        self.with_log(|log| log.push(event));
    }

    fn with_log(&self, f: impl FnOnce(&mut EventLog)) {
        let mut log = self.events.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut log);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tubewatch_api::VideoMetadata;
    use tubewatch_detect::{AdWatchHook, LivePage, PageSnapshot, SelectorCatalog};

    use super::*;
    use crate::messages::DetectorMessage;

    const URL: &str = "https://www.youtube.com/watch?v=abc123";
    const LENGTH_125: &str =
        r#"<script>var ytInitialPlayerResponse = {"videoDetails":{"lengthSeconds":"125"}};</script>"#;

    #[derive(Debug, thiserror::Error)]
    #[error("unreachable")]
    struct Never;

    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl TitleLookup for CountingLookup {
        type Error = Never;

        async fn lookup(&self, video_id: &str) -> Result<VideoMetadata, Never> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(VideoMetadata {
                title: format!("Title of {video_id}"),
                author_name: None,
                thumbnail_url: None,
            })
        }
    }

    fn detector() -> (Detector<CountingLookup>, Arc<CountingLookup>) {
        let lookup = Arc::new(CountingLookup::default());
        let classifier = AdClassifier::new(Arc::new(SelectorCatalog::embedded()));
        let durations = DurationResolver::new(classifier);
        let identity =
            IdentityResolver::new(Arc::clone(&lookup), durations, Arc::new(AdWatch::new()));
        (Detector::new(identity, 50, Duration::from_secs(2)), lookup)
    }

    fn page(url: &str, html: &str) -> PageSnapshot {
        PageSnapshot::capture(url, html, &SelectorCatalog::embedded())
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pass() {
        let (mut d, lookup) = detector();
        let mut rx = d.notifier().subscribe();

        let outcome = d.run_pass(&page(URL, LENGTH_125)).await;
        let PassOutcome::Detected(Some(record)) = outcome else {
            panic!("expected a detected record, got {outcome:?}");
        };
        assert_eq!(record.duration.as_str(), "2:05");
        assert_eq!(record.title, "Title of abc123");
        assert!(record.is_valid);
        assert!(d.cache().contains("abc123"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.recv().await.unwrap(), DetectorMessage::detected(Some(record)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_gate_leaves_state_unchanged() {
        let (mut d, _) = detector();
        d.run_pass(&page(URL, LENGTH_125)).await;

        tokio::time::advance(Duration::from_millis(500)).await;
        let other = page("https://www.youtube.com/watch?v=zzz999", LENGTH_125);
        assert_eq!(d.run_pass(&other).await, PassOutcome::Skipped(SkipReason::RateLimited));
        assert_eq!(d.current().unwrap().video_id, "abc123");
        assert_eq!(d.cache().len(), 1);
        assert_eq!(
            d.rate_gate_remaining(Instant::now()),
            Some(Duration::from_millis(1500))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_issues_no_lookup() {
        let (mut d, lookup) = detector();
        let first = page(URL, LENGTH_125);
        let second = page("https://www.youtube.com/watch?v=zzz999", LENGTH_125);

        d.run_pass(&first).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        d.run_pass(&second).await;
        tokio::time::advance(Duration::from_secs(3)).await;

        let outcome = d.run_pass(&first).await;
        assert!(matches!(outcome, PassOutcome::CacheHit(ref r) if r.video_id == "abc123"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(d.events().lock().unwrap().stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_url_is_skipped() {
        let (mut d, lookup) = detector();
        let p = page(URL, LENGTH_125);
        d.run_pass(&p).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(d.run_pass(&p).await, PassOutcome::Skipped(SkipReason::AlreadyCurrent));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_watch_page_clears() {
        let (mut d, _) = detector();
        let mut rx = d.notifier().subscribe();
        d.run_pass(&page(URL, LENGTH_125)).await;
        rx.recv().await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        let home = page("https://www.youtube.com/", "");
        assert_eq!(d.run_pass(&home).await, PassOutcome::Cleared);
        assert!(d.current().is_none());
        assert_eq!(rx.recv().await.unwrap(), DetectorMessage::detected(None));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(
            d.run_pass(&home).await,
            PassOutcome::Skipped(SkipReason::NotWatchPage)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_video_id() {
        let (mut d, lookup) = detector();
        let p = page("https://www.youtube.com/watch?v=&list=PL123", "");
        assert!(p.is_watch_page());
        assert_eq!(
            d.run_pass(&p).await,
            PassOutcome::Skipped(SkipReason::MissingVideoId)
        );
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(3)).await;
        let playlist = page("https://www.youtube.com/watch?list=PL123", "");
        assert_eq!(
            d.run_pass(&playlist).await,
            PassOutcome::Skipped(SkipReason::NotWatchPage)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_cached_not_current() {
        let (mut d, _) = detector();
        let live = LivePage::new(page(URL, LENGTH_125));

        let PassOutcome::Lookup(pending) = d.plan(&live, Instant::now()) else {
            panic!("expected a lookup");
        };
        let identity = d.identity().clone().resolve_identity(&live, &pending.video_id).await;
        live.replace(page("https://www.youtube.com/watch?v=zzz999", ""));

        assert_eq!(d.apply(&live, pending, identity, Instant::now()), None);
        assert!(d.current().is_none());
        assert!(d.cache().contains("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_duration_refreshed_after_ad() {
        let (mut d, _) = detector();
        let with_ad = format!(r#"<div class="ytp-ad-text">Ad</div>{LENGTH_125}"#);
        let live = LivePage::new(page(URL, &with_ad));

        let PassOutcome::Detected(Some(first)) = d.run_pass(&live).await else {
            panic!("expected a record");
        };
        assert_eq!(first.duration, DurationText::AwaitingAd);
        assert!(d.identity().ad_watch().is_active());

        d.identity().ad_watch().clear();
        live.replace(page(URL, LENGTH_125));
        tokio::time::advance(Duration::from_secs(3)).await;

        let PassOutcome::Refreshed(record) = d.run_pass(&live).await else {
            panic!("expected a refresh");
        };
        assert_eq!(record.duration.as_str(), "2:05");
        assert_eq!(d.cache().get("abc123"), Some(&record));
    }
}
