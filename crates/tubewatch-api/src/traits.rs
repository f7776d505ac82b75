//! Trait definitions for video metadata lookups.
//!
//! The identity resolver only needs a title for a video identifier; any
//! source implementing [`TitleLookup`] can supply it.

use std::future::Future;

/// Canonical metadata for one video.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author_name: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// A source of canonical video titles, keyed by video identifier.
pub trait TitleLookup: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch metadata for a video. Does not carry a duration.
    fn lookup(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<VideoMetadata, Self::Error>> + Send;
}
