use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::trace;

use crate::page::PageReader;
use crate::selectors::{ProbeRole, SelectorCatalog};

static RE_PLAYER_RESPONSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ytInitialPlayerResponse"?\]?\s*=\s*"#).unwrap());
static RE_INITIAL_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ytInitialData"?\]?\s*=\s*"#).unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static VIDEO: LazyLock<Selector> = LazyLock::new(|| Selector::parse("video").unwrap());

/// What the first element matching a selector looked like at capture time.
#[derive(Debug, Clone, Default)]
struct Probe {
    visible: bool,
    text: Option<String>,
    classes: Vec<String>,
}

/// Immutable capture of a watch page.
///
/// Every catalog selector is evaluated once at capture time. Selectors outside
/// the catalog are answered by re-parsing the stored HTML.
///
/// A static document has no layout, so visibility is approximated: an element
/// is hidden when it or an ancestor has the `hidden` attribute or an inline
/// `display: none`, or when its own inline style sets a zero width or height.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    url: String,
    title: Option<String>,
    player_response: Option<Value>,
    initial_data: Option<Value>,
    media_duration: Option<f64>,
    probes: HashMap<String, Option<Probe>>,
    duration_selectors: Vec<String>,
    html: String,
}

impl PageSnapshot {
    /// Capture a page from its URL and serialized DOM.
    pub fn capture(url: impl Into<String>, html: &str, catalog: &SelectorCatalog) -> Self {
        let document = Html::parse_document(html);

        let probes = catalog
            .all()
            .map(|(def, selector)| {
                let probe = document.select(selector).next().map(probe_element);
                (def.selector.clone(), probe)
            })
            .collect::<HashMap<_, _>>();

        let title = document
            .select(&TITLE)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let media_duration = document
            .select(&VIDEO)
            .next()
            .and_then(|el| el.value().attr("data-duration"))
            .and_then(|d| d.trim().parse::<f64>().ok());

        let snapshot = Self {
            url: url.into(),
            title,
            player_response: extract_json(html, &RE_PLAYER_RESPONSE),
            initial_data: extract_json(html, &RE_INITIAL_DATA),
            media_duration,
            probes,
            duration_selectors: catalog
                .selectors(ProbeRole::Duration)
                .into_iter()
                .map(str::to_string)
                .collect(),
            html: html.to_string(),
        };
        trace!(
            url = %snapshot.url,
            probes_matched = snapshot.probes.values().filter(|p| p.is_some()).count(),
            player_response = snapshot.player_response.is_some(),
            initial_data = snapshot.initial_data.is_some(),
            "Captured page snapshot"
        );
        snapshot
    }

    /// A page with nothing rendered yet, e.g. right after navigation.
    pub fn blank(url: impl Into<String>) -> Self {
        Self::capture(url, "", &SelectorCatalog::embedded())
    }

    /// Override the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Override the media element duration.
    pub fn with_media_duration(mut self, seconds: Option<f64>) -> Self {
        self.media_duration = seconds;
        self
    }

    /// Evaluate an off-catalog selector against the stored HTML.
    fn query(&self, selector: &str) -> Option<Probe> {
        let selector = Selector::parse(selector).ok()?;
        let document = Html::parse_document(&self.html);
        let probe = document.select(&selector).next().map(probe_element);
        probe
    }

    fn probe(&self, selector: &str) -> Option<Probe> {
        match self.probes.get(selector) {
            Some(probe) => probe.clone(),
            None => self.query(selector),
        }
    }
}

impl PageReader for PageSnapshot {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn document_title(&self) -> Option<String> {
        self.title.clone()
    }

    fn structured_length_seconds(&self) -> Option<u64> {
        let raw = self
            .player_response
            .as_ref()?
            .pointer("/videoDetails/lengthSeconds")?;
        let seconds = match raw {
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            Value::Number(n) => n.as_f64()?,
            _ => return None,
        };
        // Fractional lengths count whole seconds only.
        let seconds = seconds.floor();
        (seconds.is_finite() && seconds >= 1.0).then_some(seconds as u64)
    }

    fn structured_length_text(&self) -> Option<String> {
        let contents = self
            .initial_data
            .as_ref()?
            .pointer("/contents/twoColumnWatchNextResults/results/results/contents")?
            .as_array()?;

        contents
            .iter()
            .filter_map(|c| c.get("videoPrimaryInfoRenderer"))
            .find_map(|info| {
                let length = info.get("lengthText")?;
                length
                    .get("simpleText")
                    .and_then(Value::as_str)
                    .or_else(|| length.pointer("/runs/0/text").and_then(Value::as_str))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
    }

    fn visible_duration_text(&self) -> Option<String> {
        self.duration_selectors
            .iter()
            .find_map(|selector| {
                self.probes
                    .get(selector)
                    .and_then(Option::as_ref)
                    .and_then(|p| p.text.clone())
            })
    }

    fn media_element_duration_seconds(&self) -> Option<f64> {
        self.media_duration
    }

    fn element_visible(&self, selector: &str) -> bool {
        self.probe(selector).is_some_and(|p| p.visible)
    }

    fn element_text(&self, selector: &str) -> Option<String> {
        self.probe(selector).and_then(|p| p.text)
    }

    fn element_classes(&self, selector: &str) -> Vec<String> {
        self.probe(selector).map(|p| p.classes).unwrap_or_default()
    }
}

/// A page that changes under the detector: navigation and re-rendering swap
/// in a new snapshot.
#[derive(Debug)]
pub struct LivePage {
    current: RwLock<Arc<PageSnapshot>>,
}

impl LivePage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Replace the page contents.
    pub fn replace(&self, snapshot: PageSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// The snapshot currently rendered.
    pub fn snapshot(&self) -> Arc<PageSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl PageReader for LivePage {
    fn current_url(&self) -> String {
        self.snapshot().current_url()
    }

    fn document_title(&self) -> Option<String> {
        self.snapshot().document_title()
    }

    fn structured_length_seconds(&self) -> Option<u64> {
        self.snapshot().structured_length_seconds()
    }

    fn structured_length_text(&self) -> Option<String> {
        self.snapshot().structured_length_text()
    }

    fn visible_duration_text(&self) -> Option<String> {
        self.snapshot().visible_duration_text()
    }

    fn media_element_duration_seconds(&self) -> Option<f64> {
        self.snapshot().media_element_duration_seconds()
    }

    fn element_visible(&self, selector: &str) -> bool {
        self.snapshot().element_visible(selector)
    }

    fn element_text(&self, selector: &str) -> Option<String> {
        self.snapshot().element_text(selector)
    }

    fn element_classes(&self, selector: &str) -> Vec<String> {
        self.snapshot().element_classes(selector)
    }
}

fn probe_element(el: ElementRef<'_>) -> Probe {
    let text = el.text().collect::<String>();
    let text = text.trim();
    Probe {
        visible: is_visible(el),
        text: (!text.is_empty()).then(|| text.to_string()),
        classes: el.value().classes().map(str::to_string).collect(),
    }
}

fn is_visible(el: ElementRef<'_>) -> bool {
    if hides(el, true) {
        return false;
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .all(|ancestor| !hides(ancestor, false))
}

fn hides(el: ElementRef<'_>, check_size: bool) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    let Some(style) = value.attr("style") else {
        return false;
    };
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .any(|(prop, val)| {
            let val = val.trim().to_ascii_lowercase();
            match prop.trim().to_ascii_lowercase().as_str() {
                "display" => val == "none",
                "width" | "height" if check_size => is_zero_length(&val),
                _ => false,
            }
        })
}

fn is_zero_length(value: &str) -> bool {
    value
        .trim_end_matches("px")
        .trim()
        .parse::<f64>()
        .is_ok_and(|n| n == 0.0)
}

/// Parse the JSON object assigned right after the first matching marker.
fn extract_json(html: &str, marker: &Regex) -> Option<Value> {
    marker.find_iter(html).find_map(|m| {
        let rest = &html[m.end()..];
        if !rest.starts_with('{') {
            return None;
        }
        serde_json::Deserializer::from_str(rest)
            .into_iter::<Value>()
            .next()?
            .ok()
            .filter(Value::is_object)
    })
}
