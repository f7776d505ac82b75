//! Read-only view of the watch page.
//!
//! The resolvers depend only on [`PageReader`], so they run the same against
//! a captured [`PageSnapshot`](crate::PageSnapshot), a swappable
//! [`LivePage`](crate::LivePage), or a hand-built test fixture.

use url::Url;

/// Host serving watch pages.
pub const WATCH_HOST: &str = "www.youtube.com";

/// Path of a watch page.
pub const WATCH_PATH: &str = "/watch";

/// Query parameter carrying the video identifier.
pub const VIDEO_ID_PARAM: &str = "v";

/// Query parameter carrying a start timestamp.
pub const TIMESTAMP_PARAM: &str = "t";

/// Accessors over the live page. Implementations never mutate or cache.
pub trait PageReader: Send + Sync {
    /// Full URL of the page.
    fn current_url(&self) -> String;

    /// Document title, if the page has one.
    fn document_title(&self) -> Option<String>;

    /// Declared length from the embedded player-state object, if positive.
    fn structured_length_seconds(&self) -> Option<u64>;

    /// Length text from the embedded initial-data object.
    fn structured_length_text(&self) -> Option<String>;

    /// Trimmed text of the first element found by the duration selectors.
    ///
    /// This is the first element present, not the first holding a valid
    /// duration.
    fn visible_duration_text(&self) -> Option<String>;

    /// `duration` of the media element, when one exists.
    fn media_element_duration_seconds(&self) -> Option<f64>;

    /// Whether the first element matching `selector` is visible.
    fn element_visible(&self, selector: &str) -> bool;

    /// Trimmed text content of the first element matching `selector`.
    fn element_text(&self, selector: &str) -> Option<String>;

    /// Class list of the first element matching `selector`.
    fn element_classes(&self, selector: &str) -> Vec<String>;

    /// Video identifier from the URL, or `None` when this is not a watch URL.
    fn video_id_from_url(&self) -> Option<String> {
        video_id_from_url(&self.current_url())
    }

    /// True iff the URL is a watch page carrying a video identifier.
    fn is_watch_page(&self) -> bool {
        is_watch_url(&self.current_url())
    }

    /// Whether the URL carries a start timestamp.
    fn has_timestamp(&self) -> bool {
        query_param(&self.current_url(), TIMESTAMP_PARAM).is_some()
    }
}

/// Extract the `v` parameter from a URL string.
pub fn video_id_from_url(url: &str) -> Option<String> {
    query_param(url, VIDEO_ID_PARAM).filter(|id| !id.is_empty())
}

/// True iff `url` is `https://www.youtube.com/watch?v=…`.
pub fn is_watch_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    parsed.host_str() == Some(WATCH_HOST)
        && parsed.path() == WATCH_PATH
        && parsed.query_pairs().any(|(k, _)| k == VIDEO_ID_PARAM)
}

/// Canonical watch URL for a video identifier.
pub fn watch_url(video_id: &str) -> String {
    format!("https://{WATCH_HOST}{WATCH_PATH}?{VIDEO_ID_PARAM}={video_id}")
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_from_url() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=abc123&list=PL1").as_deref(),
            Some("abc123")
        );
        assert_eq!(video_id_from_url("https://www.youtube.com/watch?v="), None);
        assert_eq!(video_id_from_url("https://www.youtube.com/feed/subscriptions"), None);
        assert_eq!(video_id_from_url("not a url"), None);
    }

    #[test]
    fn test_is_watch_url() {
        assert!(is_watch_url("https://www.youtube.com/watch?v=abc123"));
        assert!(is_watch_url("https://www.youtube.com/watch?t=30&v=abc123"));
        assert!(!is_watch_url("https://www.youtube.com/"));
        assert!(!is_watch_url("https://www.youtube.com/watch?list=PL1"));
        assert!(!is_watch_url("https://m.youtube.com/watch?v=abc123"));
        assert!(!is_watch_url("https://www.youtube.com/shorts/abc123"));
    }

    #[test]
    fn test_watch_url_roundtrips_id() {
        let url = watch_url("dQw4w9WgXcQ");
        assert!(is_watch_url(&url));
        assert_eq!(video_id_from_url(&url).as_deref(), Some("dQw4w9WgXcQ"));
    }
}
