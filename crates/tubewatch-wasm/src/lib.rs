use std::sync::{Arc, LazyLock};

use tubewatch_detect::{AdClassifier, DurationResolver, NoAdWatch, PageSnapshot, SelectorCatalog};
use wasm_bindgen::prelude::*;

static CATALOG: LazyLock<Arc<SelectorCatalog>> =
    LazyLock::new(|| Arc::new(SelectorCatalog::embedded()));

fn classifier() -> AdClassifier {
    AdClassifier::new(Arc::clone(&CATALOG))
}

#[wasm_bindgen]
pub fn parse_video_id(url: &str) -> Option<String> {
    tubewatch_detect::video_id_from_url(url)
}

#[wasm_bindgen]
pub fn is_watch_url(url: &str) -> bool {
    tubewatch_detect::is_watch_url(url)
}

/// Canonical duration text for a media element's `duration`.
#[wasm_bindgen]
pub fn format_duration(seconds: f64) -> Option<String> {
    (seconds.is_finite() && seconds >= 0.0)
        .then(|| tubewatch_detect::format_clock(seconds.floor() as u64))
}

/// Ad state of a page as JSON: `{"adActive": bool, "signal": …}`.
#[wasm_bindgen]
pub fn classify_ad(url: &str, html: &str) -> String {
    let page = PageSnapshot::capture(url, html, &CATALOG);
    let signal = classifier().classify(&page);
    serde_json::json!({
        "adActive": signal.is_some(),
        "signal": signal,
    })
    .to_string()
}

/// Single duration resolution over a page, without ad watching.
#[wasm_bindgen]
pub fn resolve_duration(url: &str, html: &str) -> Option<String> {
    let page = PageSnapshot::capture(url, html, &CATALOG);
    DurationResolver::new(classifier()).resolve(&page, &NoAdWatch)
}
