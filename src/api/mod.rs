// src/api/mod.rs
// HTTP client for the companion service

mod types;

pub use types::{Answer, CreateAudioAck, ErrorResponse, NotesResponse, QueryRequest, SummaryResponse, TranscriptResponse};

use crate::config::PanelConfig;
use crate::transcript::TranscriptIndex;
use crate::video::VideoId;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out. Please try again.")]
    Timeout,

    #[error("{0}")]
    NotFound(String),

    #[error("HTTP Error: {0}")]
    Http(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    Service(String),

    #[error("Audio generation timed out after {attempts} attempts. Please try again.")]
    GenerationTimeout { attempts: u32 },
}

impl ApiError {
    /// True for the deadline failures, as opposed to transport or service
    /// errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::GenerationTimeout { .. })
    }
}

/// The slice of the service contract the audio delivery strategies use,
/// split out so the poll handshake can be exercised against a scripted
/// service in tests.
#[async_trait]
pub trait AudioService: Send + Sync {
    /// Idempotent create call; re-issued while generation is in progress.
    async fn create_audio(&self, video: &VideoId, language: &str) -> Result<CreateAudioAck, ApiError>;

    /// Playable audio for one transcript segment. `segment_number` is
    /// 1-based, matching the service path.
    async fn segment_audio(
        &self,
        video: &VideoId,
        language: &str,
        segment_number: usize,
    ) -> Result<Bytes, ApiError>;
}

/// Source of the transcript fetched when a playback session primes without
/// one.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn transcript(&self, video: &VideoId) -> Result<TranscriptIndex, ApiError>;
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &PanelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn fetch_transcript(&self, video: &VideoId) -> Result<TranscriptIndex, ApiError> {
        tracing::info!("Fetching transcript for video {}", video);
        let url = format!("{}/show_transcript/{}", self.base_url, video);
        let response: TranscriptResponse = self.get_json(&url).await?;
        let segments = response.transcript.unwrap_or_default();
        if segments.is_empty() {
            return Err(ApiError::NotFound("Transcript not available.".to_string()));
        }
        TranscriptIndex::new(segments).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn concise_summary(&self, video: &VideoId) -> Result<String, ApiError> {
        tracing::info!("Fetching summary for video {}", video);
        let url = format!("{}/concise_summary/{}", self.base_url, video);
        let response: SummaryResponse = self.get_json(&url).await?;
        match response.concise_summary.filter(|summary| !summary.trim().is_empty()) {
            Some(summary) => Ok(summary),
            None => Err(ApiError::NotFound(
                "No summary available for this video.".to_string(),
            )),
        }
    }

    pub async fn notes(&self, video: &VideoId) -> Result<String, ApiError> {
        tracing::info!("Fetching notes for video {}", video);
        let url = format!("{}/notes/{}", self.base_url, video);
        let response: NotesResponse = self.get_json(&url).await?;
        match response.notes.filter(|notes| !notes.trim().is_empty()) {
            Some(notes) => Ok(notes),
            None => Err(ApiError::NotFound(
                "No notes available for this video.".to_string(),
            )),
        }
    }

    pub async fn ask(
        &self,
        video: &VideoId,
        query: &str,
        addition_mode: bool,
    ) -> Result<Answer, ApiError> {
        tracing::info!("Submitting query for video {}: {} chars", video, query.len());
        let url = format!("{}/process", self.base_url);
        let body = QueryRequest {
            query: query.to_string(),
            addition_mode,
            video_id: video.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<Answer>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))
        } else {
            let detail: ErrorResponse = response.json().await.unwrap_or_default();
            Err(ApiError::Service(
                detail
                    .error
                    .unwrap_or_else(|| "Unknown error occurred".to_string()),
            ))
        }
    }

    /// Fire-and-forget warm-up; only the ack status matters.
    pub async fn precompute(&self, video: &VideoId) -> Result<(), ApiError> {
        tracing::debug!("Precomputing data for video {}", video);
        let url = format!("{}/precompute/{}", self.base_url, video);
        let response = self.client.get(&url).send().await.map_err(map_transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Service(
                "Failed to precompute video data.".to_string(),
            ))
        }
    }

    /// Raw per-video state held by the service, for inspection.
    pub async fn video_data(&self, video: &VideoId) -> Result<serde_json::Value, ApiError> {
        tracing::debug!("Fetching raw data for video {}", video);
        let url = format!("{}/show_data/{}", self.base_url, video);
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.client.get(url).send().await.map_err(map_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AudioService for ApiClient {
    async fn create_audio(
        &self,
        video: &VideoId,
        language: &str,
    ) -> Result<CreateAudioAck, ApiError> {
        let url = format!("{}/create_audio/{}/{}", self.base_url, video, language);
        self.get_json(&url).await
    }

    async fn segment_audio(
        &self,
        video: &VideoId,
        language: &str,
        segment_number: usize,
    ) -> Result<Bytes, ApiError> {
        let url = format!(
            "{}/listen_audio/{}/{}/{}",
            self.base_url, video, language, segment_number
        );
        let response = self.client.get(&url).send().await.map_err(map_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }
}

#[async_trait]
impl TranscriptSource for ApiClient {
    async fn transcript(&self, video: &VideoId) -> Result<TranscriptIndex, ApiError> {
        self.fetch_transcript(video).await
    }
}

fn map_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(error.to_string())
    }
}
