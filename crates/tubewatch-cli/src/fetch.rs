use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use tubewatch_core::CoreError;
use tubewatch_detect::{PageSnapshot, SelectorCatalog};
use url::Url;

const USER_AGENT: &str = concat!("tubewatch/", env!("CARGO_PKG_VERSION"));

/// Loads watch pages into snapshots.
pub struct PageFetcher {
    http: Client,
    catalog: Arc<SelectorCatalog>,
}

impl PageFetcher {
    pub fn new(timeout: Duration, catalog: Arc<SelectorCatalog>) -> Result<Self, CoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CoreError::PageFetch(e.to_string()))?;
        Ok(Self { http, catalog })
    }

    /// Download a page and capture it.
    pub async fn fetch(&self, url: &str) -> Result<PageSnapshot, CoreError> {
        let parsed = Url::parse(url).map_err(|e| CoreError::PageFetch(format!("{url}: {e}")))?;
        debug!(%parsed, "Fetching page");
        let resp = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|e| CoreError::PageFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CoreError::PageFetch(format!("{url}: HTTP {}", resp.status())));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| CoreError::PageFetch(e.to_string()))?;
        Ok(PageSnapshot::capture(url, &html, &self.catalog))
    }

    /// Capture a page saved to disk, as if loaded from `url`.
    pub fn from_file(&self, url: &str, path: &Path) -> Result<PageSnapshot, CoreError> {
        let html = std::fs::read_to_string(path)?;
        Ok(PageSnapshot::capture(url, &html, &self.catalog))
    }
}

#[cfg(test)]
mod tests {
    use tubewatch_detect::PageReader;

    use super::*;

    fn fetcher() -> PageFetcher {
        let catalog = Arc::new(SelectorCatalog::embedded());
        PageFetcher::new(Duration::from_secs(1), catalog).unwrap()
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(
            &path,
            "<html><head><title>Saved - YouTube</title></head><body></body></html>",
        )
        .unwrap();

        let fetcher = fetcher();
        let page = fetcher
            .from_file("https://www.youtube.com/watch?v=abc123", &path)
            .unwrap();
        assert_eq!(page.document_title().as_deref(), Some("Saved - YouTube"));
        assert_eq!(page.video_id_from_url().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_rejects_bad_url() {
        let fetcher = fetcher();
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(CoreError::PageFetch(_))
        ));
    }
}
