use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tubewatch_detect::{format_clock, is_clock};

/// Duration text used when no source produced a value.
pub const UNKNOWN_DURATION: &str = "Unknown Duration";

/// Duration text used while an ad still hides the real duration.
pub const AWAITING_AD: &str = "Waiting for ad completion";

/// Title used when neither the lookup nor the document has one.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// A video's duration as shown to consumers.
///
/// `Clock` always holds canonical `H:MM:SS` / `M:SS` text; build it through
/// [`DurationText::clock`] or [`DurationText::from_seconds`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DurationText {
    Clock(String),
    Unknown,
    AwaitingAd,
}

impl DurationText {
    /// Validate canonical clock text.
    pub fn clock(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        is_clock(&text).then_some(Self::Clock(text))
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::Clock(format_clock(seconds))
    }

    /// Clock text or either sentinel.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            UNKNOWN_DURATION => Some(Self::Unknown),
            AWAITING_AD => Some(Self::AwaitingAd),
            other => Self::clock(other),
        }
    }

    /// A resolved duration, or `Unknown` when resolution produced nothing.
    pub fn or_unknown(resolved: Option<String>) -> Self {
        resolved.and_then(Self::clock).unwrap_or(Self::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Clock(text) => text,
            Self::Unknown => UNKNOWN_DURATION,
            Self::AwaitingAd => AWAITING_AD,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Clock(_))
    }
}

impl fmt::Display for DurationText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DurationText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DurationText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration text: {text:?}")))
    }
}

/// Title and duration resolved for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub title: String,
    pub duration: DurationText,
}

/// The detector's answer for one watch page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Full page URL at detection time.
    pub url: String,
    pub video_id: String,
    pub title: String,
    pub duration: DurationText,
    pub is_valid: bool,
}

impl VideoRecord {
    pub fn new(url: impl Into<String>, video_id: impl Into<String>, identity: Identity) -> Self {
        Self {
            url: url.into(),
            video_id: video_id.into(),
            title: identity.title,
            duration: identity.duration,
            is_valid: true,
        }
    }

    /// Same record with a different duration.
    pub fn with_duration(&self, duration: DurationText) -> Self {
        Self {
            duration,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_validation() {
        assert!(DurationText::clock("2:05").is_some());
        assert!(DurationText::clock("1:02:05").is_some());
        assert!(DurationText::clock("2:5").is_none());
        assert!(DurationText::clock("LIVE").is_none());
        assert_eq!(DurationText::from_seconds(125).as_str(), "2:05");
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(DurationText::or_unknown(None), DurationText::Unknown);
        assert_eq!(
            DurationText::or_unknown(Some("bogus".into())),
            DurationText::Unknown
        );
        assert_eq!(
            DurationText::or_unknown(Some("4:20".into())),
            DurationText::Clock("4:20".into())
        );
    }

    #[test]
    fn test_sentinels() {
        assert!(DurationText::Unknown.is_sentinel());
        assert!(DurationText::AwaitingAd.is_sentinel());
        assert!(!DurationText::from_seconds(60).is_sentinel());
        assert_eq!(DurationText::parse(AWAITING_AD), Some(DurationText::AwaitingAd));
        assert_eq!(DurationText::AwaitingAd.to_string(), "Waiting for ad completion");
    }

    #[test]
    fn test_record_json_shape() {
        let record = VideoRecord::new(
            "https://www.youtube.com/watch?v=abc123",
            "abc123",
            Identity {
                title: "Learning Rust".into(),
                duration: DurationText::from_seconds(125),
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "https://www.youtube.com/watch?v=abc123",
                "videoId": "abc123",
                "title": "Learning Rust",
                "duration": "2:05",
                "isValid": true,
            })
        );
        let back: VideoRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_rejects_bad_duration() {
        let json = r#"{"url":"u","videoId":"v","title":"t","duration":"soon","isValid":true}"#;
        assert!(serde_json::from_str::<VideoRecord>(json).is_err());
    }
}
