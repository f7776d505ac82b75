use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use tubewatch_api::TitleLookup;
use tubewatch_detect::{DurationResolver, PageReader};

use crate::ad_watch::AdWatch;
use crate::debug_log::{DebugEvent, SharedEventLog};
use crate::models::{DurationText, Identity, UNKNOWN_TITLE};
use crate::retry::{resolve_with_retry, RetryPolicy};

/// Suffix the host appends to document titles.
const TITLE_SUFFIX: &str = " - YouTube";

/// Document title of pages that have not rendered a video title yet.
const PLACEHOLDER_TITLE: &str = "YouTube";

/// Default bound on one title lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Produces the title and duration for a video identifier.
pub struct IdentityResolver<L> {
    lookup: Arc<L>,
    durations: DurationResolver,
    ad_watch: Arc<AdWatch>,
    retry: RetryPolicy,
    timeout: Duration,
    events: Option<SharedEventLog>,
}

impl<L: TitleLookup> IdentityResolver<L> {
    pub fn new(lookup: Arc<L>, durations: DurationResolver, ad_watch: Arc<AdWatch>) -> Self {
        Self {
            lookup,
            durations,
            ad_watch,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            events: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_log(mut self, events: SharedEventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn durations(&self) -> &DurationResolver {
        &self.durations
    }

    pub fn ad_watch(&self) -> &Arc<AdWatch> {
        &self.ad_watch
    }

    /// Resolve title and duration for `video_id`.
    ///
    /// A failed or timed-out lookup falls back to the document title and a
    /// single duration attempt. `None` only when that fallback would read a
    /// page that has already moved on to another video.
    #[instrument(skip(self, page))]
    pub async fn resolve_identity(
        &self,
        page: &dyn PageReader,
        video_id: &str,
    ) -> Option<Identity> {
        let failure = match timeout(self.timeout, self.lookup.lookup(video_id)).await {
            Ok(Ok(meta)) => {
                let duration =
                    resolve_with_retry(&self.durations, page, self.ad_watch.as_ref(), &self.retry)
                        .await
                        .unwrap_or(DurationText::Unknown);
                let title = if meta.title.trim().is_empty() {
                    UNKNOWN_TITLE.to_string()
                } else {
                    meta.title
                };
                return Some(Identity { title, duration });
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {} ms", self.timeout.as_millis()),
        };

        warn!(video_id, error = %failure, "Title lookup failed, using page title");
        if let Some(events) = &self.events {
            events
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(DebugEvent::LookupFailed {
                    video_id: video_id.to_string(),
                    message: failure,
                });
        }
        self.fallback(page, video_id)
    }

    fn fallback(&self, page: &dyn PageReader, video_id: &str) -> Option<Identity> {
        if page.video_id_from_url().as_deref() != Some(video_id) {
            debug!(video_id, "Page moved on, no fallback identity");
            return None;
        }
        let title = fallback_title(page.document_title().as_deref());
        let resolved = self.durations.resolve(page, self.ad_watch.as_ref());
        let duration = DurationText::or_unknown(resolved);
        debug!(%title, %duration, "Using fallback identity");
        Some(Identity { title, duration })
    }
}

/// Title derived from the document title when the lookup is unavailable.
pub fn fallback_title(document_title: Option<&str>) -> String {
    let title = document_title.unwrap_or_default().trim_end();
    let title = title.strip_suffix(TITLE_SUFFIX).unwrap_or(title).trim();
    if title.is_empty() || title == PLACEHOLDER_TITLE {
        UNKNOWN_TITLE.to_string()
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;
    use tubewatch_api::VideoMetadata;
    use tubewatch_detect::{AdClassifier, AdWatchHook, PageSnapshot, SelectorCatalog};

    use super::*;
    use crate::debug_log::shared_event_log;

    const URL: &str = "https://www.youtube.com/watch?v=abc123";
    const PAGE: &str = r#"<html><head><title>Learning Rust - YouTube</title></head><body>
        <script>var ytInitialPlayerResponse = {"videoDetails":{"lengthSeconds":"125"}};</script>
        </body></html>"#;

    #[derive(Debug, thiserror::Error)]
    #[error("lookup refused")]
    struct Refused;

    enum Behavior {
        Title(&'static str),
        Fail,
        Hang,
    }

    struct FakeLookup {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeLookup {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TitleLookup for FakeLookup {
        type Error = Refused;

        async fn lookup(&self, _video_id: &str) -> Result<VideoMetadata, Refused> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Title(title) => Ok(VideoMetadata {
                    title: title.to_string(),
                    author_name: None,
                    thumbnail_url: None,
                }),
                Behavior::Fail => Err(Refused),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn resolver(lookup: Arc<FakeLookup>) -> IdentityResolver<FakeLookup> {
        let classifier = AdClassifier::new(Arc::new(SelectorCatalog::embedded()));
        let durations = DurationResolver::new(classifier);
        IdentityResolver::new(lookup, durations, Arc::new(AdWatch::new()))
    }

    fn page(html: &str) -> PageSnapshot {
        PageSnapshot::capture(URL, html, &SelectorCatalog::embedded())
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(fallback_title(Some("Learning Rust - YouTube")), "Learning Rust");
        assert_eq!(fallback_title(Some("Learning Rust")), "Learning Rust");
        assert_eq!(fallback_title(Some("YouTube")), UNKNOWN_TITLE);
        assert_eq!(fallback_title(Some("")), UNKNOWN_TITLE);
        assert_eq!(fallback_title(Some(" - YouTube")), UNKNOWN_TITLE);
        assert_eq!(fallback_title(Some("  Padded - YouTube  ")), "Padded");
        assert_eq!(fallback_title(Some("YouTube - YouTube")), UNKNOWN_TITLE);
        assert_eq!(fallback_title(None), UNKNOWN_TITLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_success() {
        let lookup = FakeLookup::new(Behavior::Title("Rust in 100 Seconds"));
        let identity = resolver(Arc::clone(&lookup))
            .resolve_identity(&page(PAGE), "abc123")
            .await
            .unwrap();
        assert_eq!(identity.title, "Rust in 100 Seconds");
        assert_eq!(identity.duration, DurationText::from_seconds(125));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_title_and_unknown_duration() {
        let lookup = FakeLookup::new(Behavior::Title("  "));
        let identity = resolver(lookup)
            .resolve_identity(&page("<div></div>"), "abc123")
            .await
            .unwrap();
        assert_eq!(identity.title, UNKNOWN_TITLE);
        assert_eq!(identity.duration, DurationText::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_falls_back() {
        let events = shared_event_log();
        let resolver = resolver(FakeLookup::new(Behavior::Fail)).with_event_log(events.clone());
        let identity = resolver.resolve_identity(&page(PAGE), "abc123").await.unwrap();
        assert_eq!(identity.title, "Learning Rust");
        assert_eq!(identity.duration, DurationText::from_seconds(125));

        let log = events.lock().unwrap().snapshot();
        assert!(matches!(
            &log[0].1,
            DebugEvent::LookupFailed { video_id, .. } if video_id == "abc123"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_falls_back() {
        let start = Instant::now();
        let identity = resolver(FakeLookup::new(Behavior::Hang))
            .resolve_identity(&page(PAGE), "abc123")
            .await
            .unwrap();
        assert_eq!(start.elapsed(), DEFAULT_LOOKUP_TIMEOUT);
        assert_eq!(identity.title, "Learning Rust");
        assert_eq!(identity.duration, DurationText::from_seconds(125));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_does_not_retry() {
        let resolver = resolver(FakeLookup::new(Behavior::Fail));
        let start = Instant::now();
        let with_ad = page(r#"<title>Ad Break - YouTube</title><div class="ytp-ad-text">Ad</div>"#);
        let identity = resolver.resolve_identity(&with_ad, "abc123").await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(identity.duration, DurationText::Unknown);
        assert!(resolver.ad_watch().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_skipped_after_navigation() {
        let resolver = resolver(FakeLookup::new(Behavior::Fail));
        let other = PageSnapshot::capture(
            "https://www.youtube.com/watch?v=zzz999",
            PAGE,
            &SelectorCatalog::embedded(),
        );
        assert_eq!(resolver.resolve_identity(&other, "abc123").await, None);
    }
}
