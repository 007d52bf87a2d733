// src/api/types.rs
// Wire shapes of the remote service

use crate::transcript::Segment;
use serde::{Deserialize, Serialize};

/// Markers the create-audio ack carries once generation has completed,
/// either on this call or on an earlier one.
const READY_MARKERS: [&str; 2] = ["already generated", "generated successfully"];

#[derive(Debug, Deserialize)]
pub struct TranscriptResponse {
    #[serde(default)]
    pub transcript: Option<Vec<Segment>>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub concise_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesResponse {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest {
    pub query: String,
    pub addition_mode: bool,
    pub video_id: String,
}

/// Answer to a Q&A query, including the video metadata the service echoes
/// back.
#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
    pub final_answer: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

/// Ack of the idempotent create-audio call. A `message` indicates progress
/// or completion; an `error` means generation cannot succeed at all.
#[derive(Debug, Deserialize)]
pub struct CreateAudioAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CreateAudioAck {
    pub fn is_ready(&self) -> bool {
        self.message
            .as_deref()
            .map(|message| {
                let message = message.to_ascii_lowercase();
                READY_MARKERS.iter().any(|marker| message.contains(marker))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_fields_are_capitalized_on_the_wire() {
        let raw = r#"{"transcript": [{"Start": "0:00", "End": "0:04", "Text": "hello"}]}"#;
        let response: TranscriptResponse = serde_json::from_str(raw).unwrap();
        let segments = response.transcript.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, "0:00");
        assert_eq!(segments[0].text, "hello");
    }

    #[test]
    fn ack_ready_markers() {
        let ready: CreateAudioAck =
            serde_json::from_str(r#"{"message": "Audio already generated for this video in es"}"#)
                .unwrap();
        assert!(ready.is_ready());

        let fresh: CreateAudioAck =
            serde_json::from_str(r#"{"message": "Audio generated successfully"}"#).unwrap();
        assert!(fresh.is_ready());

        let pending: CreateAudioAck =
            serde_json::from_str(r#"{"message": "Generation in progress"}"#).unwrap();
        assert!(!pending.is_ready());

        let failed: CreateAudioAck =
            serde_json::from_str(r#"{"error": "No transcript found"}"#).unwrap();
        assert!(!failed.is_ready());
    }
}
