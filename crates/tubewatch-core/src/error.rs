use thiserror::Error;
use tubewatch_api::OEmbedError;
use tubewatch_detect::DetectError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("detect error: {0}")]
    Detect(#[from] DetectError),

    #[error("lookup error: {0}")]
    Lookup(#[from] OEmbedError),

    #[error("page fetch failed: {0}")]
    PageFetch(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("detector stopped")]
    Stopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
