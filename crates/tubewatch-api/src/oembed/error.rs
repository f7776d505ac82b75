use thiserror::Error;

/// Errors from the oEmbed client.
#[derive(Debug, Error)]
pub enum OEmbedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

impl OEmbedError {
    /// Whether the request gave up waiting for the server.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}
