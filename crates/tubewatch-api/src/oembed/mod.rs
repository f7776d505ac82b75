pub mod client;
pub mod error;
pub mod types;

pub use client::{OEmbedClient, DEFAULT_CACHE_CAPACITY, DEFAULT_ENDPOINT};
pub use error::OEmbedError;
pub use types::OEmbedResponse;
