//! Message shapes exchanged with the detector's consumers.

use serde::{Deserialize, Serialize};

use crate::models::VideoRecord;

/// A message to or from the detector, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorMessage {
    /// Ask for the current record.
    GetCurrentVideo,
    /// Reply to [`DetectorMessage::GetCurrentVideo`].
    CurrentVideoResponse { data: Option<VideoRecord> },
    /// The current record changed; `None` means no video.
    VideoDetected { data: Option<VideoRecord> },
}

impl DetectorMessage {
    pub fn detected(record: Option<VideoRecord>) -> Self {
        Self::VideoDetected { data: record }
    }

    pub fn response(record: Option<VideoRecord>) -> Self {
        Self::CurrentVideoResponse { data: record }
    }
}

/// Body a downstream consumer posts to request extraction for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub video_url: String,
    pub title: String,
    pub duration: String,
}

impl ExtractionRequest {
    /// Build the request for a valid record.
    pub fn from_record(record: &VideoRecord) -> Option<Self> {
        record.is_valid.then(|| Self {
            video_url: record.url.clone(),
            title: record.title.clone(),
            duration: record.duration.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{DurationText, Identity};

    fn record() -> VideoRecord {
        VideoRecord::new(
            "https://www.youtube.com/watch?v=abc123",
            "abc123",
            Identity {
                title: "Learning Rust".into(),
                duration: DurationText::AwaitingAd,
            },
        )
    }

    #[test]
    fn test_request_shape() {
        let msg: DetectorMessage =
            serde_json::from_value(json!({"type": "GET_CURRENT_VIDEO"})).unwrap();
        assert_eq!(msg, DetectorMessage::GetCurrentVideo);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "GET_CURRENT_VIDEO"})
        );
    }

    #[test]
    fn test_detected_shape() {
        let value = serde_json::to_value(DetectorMessage::detected(Some(record()))).unwrap();
        assert_eq!(value["type"], "VIDEO_DETECTED");
        assert_eq!(value["data"]["videoId"], "abc123");
        assert_eq!(value["data"]["duration"], "Waiting for ad completion");

        let cleared = serde_json::to_value(DetectorMessage::detected(None)).unwrap();
        assert_eq!(cleared, json!({"type": "VIDEO_DETECTED", "data": null}));
    }

    #[test]
    fn test_response_shape() {
        let value = serde_json::to_value(DetectorMessage::response(None)).unwrap();
        assert_eq!(value, json!({"type": "CURRENT_VIDEO_RESPONSE", "data": null}));
    }

    #[test]
    fn test_extraction_request() {
        let req = ExtractionRequest::from_record(&record()).unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "video_url": "https://www.youtube.com/watch?v=abc123",
                "title": "Learning Rust",
                "duration": "Waiting for ad completion",
            })
        );

        let mut invalid = record();
        invalid.is_valid = false;
        assert!(ExtractionRequest::from_record(&invalid).is_none());
    }
}
