use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use super::error::OEmbedError;
use super::types::OEmbedResponse;
use crate::traits::{TitleLookup, VideoMetadata};

/// Public oEmbed endpoint of the video host.
pub const DEFAULT_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of responses kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Responses kept in insertion order; the oldest is dropped when full.
#[derive(Debug)]
struct ResponseCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, OEmbedResponse>,
}

impl ResponseCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, video_id: &str) -> Option<&OEmbedResponse> {
        self.entries.get(video_id)
    }

    fn insert(&mut self, video_id: String, response: OEmbedResponse) {
        if self.entries.insert(video_id.clone(), response).is_some() {
            return;
        }
        self.order.push_back(video_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// oEmbed client with an in-memory response cache.
///
/// Responses are cached per video identifier and served from memory on
/// repeat requests. The cache is bounded; the oldest response is evicted
/// first.
pub struct OEmbedClient {
    http: Client,
    endpoint: String,
    cache_enabled: bool,
    cache: Mutex<ResponseCache>,
}

impl OEmbedClient {
    pub fn new(timeout: Duration) -> Result<Self, OEmbedError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cache_enabled: true,
            cache: Mutex::new(ResponseCache::new(DEFAULT_CACHE_CAPACITY)),
        })
    }

    /// Point the client at another endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Enable or disable the response cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Bound the response cache, dropping anything cached so far.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Mutex::new(ResponseCache::new(capacity));
        self
    }

    /// Number of cached responses.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Full request URL for a video.
    pub fn request_url(&self, video_id: &str) -> Result<Url, OEmbedError> {
        let watch = format!("https://www.youtube.com/watch?v={video_id}");
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[("url", watch.as_str()), ("format", "json")],
        )?)
    }

    /// Previously fetched response for a video, if cached.
    pub fn cached(&self, video_id: &str) -> Option<OEmbedResponse> {
        if !self.cache_enabled {
            return None;
        }
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(video_id)
            .cloned()
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, OEmbedError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(OEmbedError::Api {
                status,
                message: body,
            })
        }
    }

    /// Fetch the oEmbed document for a video, preferring the cache.
    pub async fn fetch(&self, video_id: &str) -> Result<OEmbedResponse, OEmbedError> {
        if let Some(hit) = self.cached(video_id) {
            debug!(video_id, "oEmbed cache hit");
            return Ok(hit);
        }

        let url = self.request_url(video_id)?;
        debug!(video_id, %url, "Fetching oEmbed");
        let resp = self.http.get(url).send().await?;
        let resp = Self::check_response(resp).await?;
        let body: OEmbedResponse = resp
            .json()
            .await
            .map_err(|e| OEmbedError::Parse(e.to_string()))?;

        info!(video_id, title = %body.title, "Fetched video title");
        if self.cache_enabled {
            self.cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(video_id.to_string(), body.clone());
        }
        Ok(body)
    }
}

impl TitleLookup for OEmbedClient {
    type Error = OEmbedError;

    async fn lookup(&self, video_id: &str) -> Result<VideoMetadata, OEmbedError> {
        self.fetch(video_id).await.map(VideoMetadata::from)
    }
}
