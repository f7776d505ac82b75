pub mod oembed;
pub mod traits;

pub use oembed::{OEmbedClient, OEmbedError};
pub use traits::{TitleLookup, VideoMetadata};
