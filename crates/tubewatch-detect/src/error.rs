use thiserror::Error;

/// Errors raised while loading selector catalogs or capturing page snapshots.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("catalog parse failed: {0}")]
    Catalog(#[from] toml::de::Error),

    #[error("invalid selector `{selector}` in probe `{name}`")]
    Selector { name: String, selector: String },
}
