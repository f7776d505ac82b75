use serde::{Deserialize, Serialize};

use crate::traits::VideoMetadata;

/// Body of an oEmbed response for a watch URL.
///
/// Only `title` is required; the host fills the rest in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OEmbedResponse {
    pub title: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub provider_url: Option<String>,
    #[serde(default)]
    pub thumbnail_height: Option<u32>,
    #[serde(default)]
    pub thumbnail_width: Option<u32>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl From<OEmbedResponse> for VideoMetadata {
    fn from(r: OEmbedResponse) -> Self {
        Self {
            title: r.title,
            author_name: r.author_name,
            thumbnail_url: r.thumbnail_url,
        }
    }
}
