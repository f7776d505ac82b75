use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::ad::AdClassifier;
use crate::page::PageReader;

/// Canonical duration text: `M:SS` or `H:MM:SS`.
static RE_CLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+:\d{2}(:\d{2})?$").unwrap());
static RE_ISO8601: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap());

/// Real videos are longer than this; shorter rendered values are stale ad
/// remnants.
pub const MIN_CONTENT_SECONDS: u64 = 10;

/// Whether `text` is canonical duration text.
pub fn is_clock(text: &str) -> bool {
    RE_CLOCK.is_match(text)
}

/// Format whole seconds as `H:MM:SS`, or `M:SS` when under an hour.
pub fn format_clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Parse canonical duration text back into seconds.
pub fn parse_clock(text: &str) -> Option<u64> {
    if !is_clock(text) {
        return None;
    }
    text.split(':')
        .try_fold(0u64, |acc, part| Some(acc * 60 + part.parse::<u64>().ok()?))
}

/// Convert an ISO 8601 duration (`PT1H2M3S`) into canonical text.
pub fn parse_iso8601(text: &str) -> Option<String> {
    let caps = RE_ISO8601.captures(text.trim())?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    Some(format_clock(part(1) * 3600 + part(2) * 60 + part(3)))
}

/// Connection from the resolver to whoever watches for the end of an ad.
pub trait AdWatchHook: Send + Sync {
    /// Whether an ad-completion watch is armed.
    fn is_active(&self) -> bool;

    /// Arm the watch. Arming an active watch does nothing; returns whether
    /// this call armed it.
    fn arm(&self) -> bool;
}

/// Hook for callers that do not watch for ads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdWatch;

impl AdWatchHook for NoAdWatch {
    fn is_active(&self) -> bool {
        false
    }

    fn arm(&self) -> bool {
        false
    }
}

/// Where a resolved duration came from, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// Player-state `lengthSeconds`; authoritative and unaffected by ads.
    StructuredSeconds,
    /// Initial-data length text.
    StructuredText,
    /// Rendered duration element.
    VisibleText,
    /// The media element's own duration.
    MediaElement,
}

impl DurationSource {
    pub const ORDER: [DurationSource; 4] = [
        Self::StructuredSeconds,
        Self::StructuredText,
        Self::VisibleText,
        Self::MediaElement,
    ];
}

/// Fuses the page's duration sources into one canonical string.
#[derive(Debug, Clone)]
pub struct DurationResolver {
    classifier: AdClassifier,
}

impl DurationResolver {
    pub fn new(classifier: AdClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &AdClassifier {
        &self.classifier
    }

    /// One synchronous resolution pass.
    pub fn resolve(&self, page: &dyn PageReader, watch: &dyn AdWatchHook) -> Option<String> {
        self.resolve_with_source(page, watch).map(|(text, _)| text)
    }

    /// Like [`resolve`](Self::resolve), also reporting which source won.
    ///
    /// While an ad is on screen nothing is trusted: the ad watch is armed and
    /// `None` returned.
    pub fn resolve_with_source(
        &self,
        page: &dyn PageReader,
        watch: &dyn AdWatchHook,
    ) -> Option<(String, DurationSource)> {
        if self.classifier.is_ad_active(page) {
            if watch.arm() {
                debug!("Ad on screen, armed ad-completion watch");
            }
            return None;
        }

        let resolved = DurationSource::ORDER
            .into_iter()
            .find_map(|source| self.try_source(source, page).map(|text| (text, source)));

        match &resolved {
            Some((text, source)) => debug!(duration = %text, ?source, "Resolved duration"),
            None => debug!("No duration source available"),
        }
        resolved
    }

    fn try_source(&self, source: DurationSource, page: &dyn PageReader) -> Option<String> {
        let found = match source {
            DurationSource::StructuredSeconds => page.structured_length_seconds().map(format_clock),
            DurationSource::StructuredText => page
                .structured_length_text()
                .filter(|text| is_clock(text)),
            DurationSource::VisibleText => page
                .visible_duration_text()
                .filter(|text| parse_clock(text).is_some_and(|s| s > MIN_CONTENT_SECONDS)),
            DurationSource::MediaElement => {
                if self.classifier.is_ad_active(page) {
                    return None;
                }
                page.media_element_duration_seconds()
                    .filter(|s| s.is_finite() && *s > MIN_CONTENT_SECONDS as f64)
                    .map(|s| format_clock(s.floor() as u64))
            }
        };
        trace!(?source, found = ?found, "Tried duration source");
        found
    }
}
