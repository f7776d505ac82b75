use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::duration::parse_clock;
use crate::page::PageReader;
use crate::selectors::{ProbeRole, SelectorCatalog};

/// Rendered durations under this many seconds, on pages that do not look
/// like short content, are treated as ad remnants.
pub const AD_REMNANT_MAX_SECONDS: u64 = 90;

/// Why the classifier decided an advertisement is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdSignal {
    /// A visible element matched an ad-marker selector.
    VisibleMarker { selector: String },
    /// The player container carries an ad-showing class.
    PlayerClass { class: String },
    /// The rendered duration is short and the page is not short content.
    ShortDuration { seconds: u64 },
}

/// Decides whether an advertisement currently occupies the player.
#[derive(Debug, Clone)]
pub struct AdClassifier {
    catalog: Arc<SelectorCatalog>,
}

impl AdClassifier {
    pub fn new(catalog: Arc<SelectorCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    pub fn is_ad_active(&self, page: &dyn PageReader) -> bool {
        self.classify(page).is_some()
    }

    /// Evaluate the ad rules in order, stopping at the first that fires.
    pub fn classify(&self, page: &dyn PageReader) -> Option<AdSignal> {
        let signal = self
            .visible_marker(page)
            .or_else(|| self.player_class(page))
            .or_else(|| short_duration(page));
        if let Some(signal) = &signal {
            debug!(?signal, "Ad detected");
        }
        signal
    }

    fn visible_marker(&self, page: &dyn PageReader) -> Option<AdSignal> {
        self.catalog
            .selectors(ProbeRole::AdMarker)
            .into_iter()
            .find(|selector| page.element_visible(selector))
            .map(|selector| AdSignal::VisibleMarker {
                selector: selector.to_string(),
            })
    }

    fn player_class(&self, page: &dyn PageReader) -> Option<AdSignal> {
        let ad_classes = self.catalog.ad_classes();
        self.catalog
            .selectors(ProbeRole::PlayerContainer)
            .into_iter()
            .flat_map(|selector| page.element_classes(selector))
            .find(|class| ad_classes.contains(class))
            .map(|class| AdSignal::PlayerClass { class })
    }
}

fn short_duration(page: &dyn PageReader) -> Option<AdSignal> {
    let seconds = page
        .visible_duration_text()
        .as_deref()
        .and_then(parse_clock)?;
    if seconds == 0 || seconds >= AD_REMNANT_MAX_SECONDS || looks_like_short_content(page) {
        return None;
    }
    Some(AdSignal::ShortDuration { seconds })
}

/// Short videos legitimately render short durations.
fn looks_like_short_content(page: &dyn PageReader) -> bool {
    let title = page.document_title().unwrap_or_default().to_lowercase();
    title.contains("#shorts") || title.contains("youtube shorts") || page.has_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PageSnapshot;

    const URL: &str = "https://www.youtube.com/watch?v=abc123";

    fn classifier() -> AdClassifier {
        AdClassifier::new(Arc::new(SelectorCatalog::embedded()))
    }

    fn page(url: &str, html: &str) -> PageSnapshot {
        PageSnapshot::capture(url, html, &SelectorCatalog::embedded())
    }

    #[test]
    fn test_visible_marker() {
        let marker = page(URL, r#"<div class="ytp-ad-text">Ad 1 of 2</div>"#);
        let signal = classifier().classify(&marker);
        assert_eq!(
            signal,
            Some(AdSignal::VisibleMarker {
                selector: ".ytp-ad-text".into()
            })
        );
    }

    #[test]
    fn test_hidden_marker_ignored() {
        let p = page(URL, r#"<div class="ytp-ad-module" style="display:none"></div>"#);
        assert!(!classifier().is_ad_active(&p));
    }

    #[test]
    fn test_player_class() {
        // Hidden player, so only the class rule can fire.
        let p = page(
            URL,
            r#"<div id="movie_player" class="html5-video-player ytp-ad-showing" hidden></div>"#,
        );
        assert_eq!(
            classifier().classify(&p),
            Some(AdSignal::PlayerClass {
                class: "ytp-ad-showing".into()
            })
        );
    }

    #[test]
    fn test_short_duration_is_ad_remnant() {
        let p = page(URL, r#"<span class="ytp-time-duration">0:15</span>"#);
        assert_eq!(
            classifier().classify(&p),
            Some(AdSignal::ShortDuration { seconds: 15 })
        );
    }

    #[test]
    fn test_short_duration_allowed_for_shorts_title() {
        let p = page(URL, r#"<span class="ytp-time-duration">0:45</span>"#)
            .with_title("Cat jumps #Shorts - YouTube");
        assert!(!classifier().is_ad_active(&p));
    }

    #[test]
    fn test_short_duration_allowed_with_timestamp() {
        let p = page(
            "https://www.youtube.com/watch?v=abc123&t=42",
            r#"<span class="ytp-time-duration">0:45</span>"#,
        );
        assert!(!classifier().is_ad_active(&p));
    }

    #[test]
    fn test_long_duration_is_not_ad() {
        let p = page(URL, r#"<span class="ytp-time-duration">1:30</span>"#);
        assert!(!classifier().is_ad_active(&p));
    }

    #[test]
    fn test_invalid_duration_text_is_not_ad() {
        let p = page(URL, r#"<span class="ytp-time-duration">LIVE</span>"#);
        assert!(!classifier().is_ad_active(&p));
    }
}
