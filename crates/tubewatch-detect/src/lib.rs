pub mod ad;
pub mod duration;
pub mod error;
pub mod page;
pub mod selectors;
pub mod snapshot;

pub use ad::{AdClassifier, AdSignal};
pub use duration::{
    format_clock, is_clock, parse_clock, parse_iso8601, AdWatchHook, DurationResolver,
    DurationSource, NoAdWatch,
};
pub use error::DetectError;
pub use page::{is_watch_url, video_id_from_url, watch_url, PageReader};
pub use selectors::{ProbeDef, ProbeRole, SelectorCatalog};
pub use snapshot::{LivePage, PageSnapshot};
