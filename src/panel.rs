use crate::api::{ApiClient, ApiError, AudioService, TranscriptSource};
use crate::audio::{self, AudioOutput, PollPolicy};
use crate::config::PanelConfig;
use crate::gate::{Busy, RequestGate};
use crate::playback::{PlaybackSequencer, SessionEvent};
use crate::timesource::TimeSource;
use crate::transcript::{Segment, TranscriptIndex};
use crate::video::VideoId;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

const DESC_SUMMARY: &str = "Fetching video summary";
const DESC_NOTES: &str = "Fetching video notes";
const DESC_TRANSCRIPT: &str = "Fetching video transcript";
const DESC_QUERY: &str = "Processing your query";
const DESC_PRECOMPUTE: &str = "Precomputing video data";
const DESC_DATA: &str = "Fetching video data";
const DESC_TRANSLATION: &str = "Processing audio translation";

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Busy(#[from] Busy),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Please enter a question")]
    EmptyQuery,

    #[error("Please enter a target language.")]
    EmptyLanguage,
}

impl PanelError {
    /// Busy rejections are expected and should not be reported as
    /// failures.
    pub fn is_busy(&self) -> bool {
        matches!(self, PanelError::Busy(_))
    }
}

/// Feedback the embedding panel renders into its output area.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelUpdate {
    Processing { description: String },
    Playing { segment_index: usize, text: String },
    PlaybackStopped,
    PlaybackFailed { message: String },
}

/// One answered Q&A query, most recent first in the history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: String,
    pub query: String,
    pub answer: String,
    pub title: String,
    pub channel: String,
    pub timestamp: String,
}

/// The action layer behind the companion panel for one video. Every
/// long-running action runs under the single-flight [`RequestGate`];
/// `stop_playback` is deliberately ungated so a stop request works while a
/// playback session holds the gate.
pub struct Panel {
    config: PanelConfig,
    api: Arc<ApiClient>,
    gate: RequestGate,
    sequencer: Arc<PlaybackSequencer>,
    time: Arc<dyn TimeSource>,
    video: VideoId,
    transcript: TokioMutex<Option<TranscriptIndex>>,
    history: Mutex<Vec<AnswerRecord>>,
    updates: mpsc::UnboundedSender<PanelUpdate>,
}

impl Panel {
    /// Build a panel for `video`. Returns the panel and the update stream
    /// the embedder renders.
    pub fn new(
        config: PanelConfig,
        video: VideoId,
        time: Arc<dyn TimeSource>,
        output: Arc<dyn AudioOutput>,
    ) -> (Self, mpsc::UnboundedReceiver<PanelUpdate>) {
        let api = Arc::new(ApiClient::new(&config));
        let delivery = audio::delivery_for(
            config.delivery_mode,
            api.clone() as Arc<dyn AudioService>,
            PollPolicy::from_config(&config),
        );
        let sequencer = Arc::new(PlaybackSequencer::new(
            time.clone(),
            api.clone() as Arc<dyn TranscriptSource>,
            delivery,
            output,
            config.pacing_delay,
        ));
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let panel = Self {
            config,
            api,
            gate: RequestGate::new(),
            sequencer,
            time,
            video,
            transcript: TokioMutex::new(None),
            history: Mutex::new(Vec::new()),
            updates: updates_tx,
        };
        (panel, updates_rx)
    }

    pub fn video(&self) -> &VideoId {
        &self.video
    }

    pub async fn fetch_summary(&self) -> Result<String, PanelError> {
        self.gated(DESC_SUMMARY, async {
            Ok(self.api.concise_summary(&self.video).await?)
        })
        .await
    }

    pub async fn fetch_notes(&self) -> Result<String, PanelError> {
        self.gated(DESC_NOTES, async { Ok(self.api.notes(&self.video).await?) })
            .await
    }

    /// Fetch and cache the transcript; the cached copy also feeds
    /// [`Panel::current_segment`] and spares a later playback session its
    /// priming fetch.
    pub async fn fetch_transcript(&self) -> Result<TranscriptIndex, PanelError> {
        self.gated(DESC_TRANSCRIPT, async {
            let index = self.api.fetch_transcript(&self.video).await?;
            *self.transcript.lock().await = Some(index.clone());
            Ok(index)
        })
        .await
    }

    pub async fn ask(&self, query: &str, addition_mode: bool) -> Result<AnswerRecord, PanelError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(PanelError::EmptyQuery);
        }

        self.gated(DESC_QUERY, async {
            let answer = self.api.ask(&self.video, &query, addition_mode).await?;
            let record = AnswerRecord {
                id: Uuid::new_v4().to_string(),
                query,
                answer: answer.final_answer,
                title: answer.title,
                channel: answer.channel,
                timestamp: Utc::now().to_rfc3339(),
            };

            let mut history = lock_history(&self.history);
            history.insert(0, record.clone());
            if history.len() > self.config.history_limit {
                history.truncate(self.config.history_limit);
            }
            Ok(record)
        })
        .await
    }

    pub fn answer_history(&self) -> Vec<AnswerRecord> {
        lock_history(&self.history).clone()
    }

    /// Warm the service's per-video caches before the first query.
    pub async fn warm_up(&self) -> Result<(), PanelError> {
        self.gated(DESC_PRECOMPUTE, async {
            Ok(self.api.precompute(&self.video).await?)
        })
        .await
    }

    /// Raw per-video service state, pretty-printed for inspection.
    pub async fn fetch_video_data(&self) -> Result<String, PanelError> {
        self.gated(DESC_DATA, async {
            let data = self.api.video_data(&self.video).await?;
            serde_json::to_string_pretty(&data)
                .map_err(|e| PanelError::Api(ApiError::Decode(e.to_string())))
        })
        .await
    }

    /// The transcript line nearest the current play position, for the
    /// embedder's follow/highlight timer. Ungated (it runs every second);
    /// a failed host round trip skips the tick instead of surfacing.
    pub async fn current_segment(&self) -> Option<(usize, Segment)> {
        let transcript = self.transcript.lock().await;
        let index = transcript.as_ref()?;

        let position = match self.time.current_position().await {
            Ok(Some(position)) => position,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("Skipping transcript-follow tick: {}", e);
                return None;
            }
        };

        let located = index.locate(position)?;
        index
            .get(located)
            .map(|segment| (located, segment.clone()))
    }

    /// Start segment-synchronized translated playback. Returns once the
    /// session is spawned; the gate stays busy until the session ends and
    /// progress arrives on the update stream.
    pub async fn start_translated_playback(&self, language: &str) -> Result<(), PanelError> {
        let language = language.trim().to_string();
        if language.is_empty() {
            return Err(PanelError::EmptyLanguage);
        }

        let permit = self.gate.try_begin(DESC_TRANSLATION)?;
        self.update(PanelUpdate::Processing {
            description: DESC_TRANSLATION.to_string(),
        });

        let transcript = self.transcript.lock().await.clone();
        let (_control, mut events) = self
            .sequencer
            .start(self.video.clone(), language, transcript)
            .await;

        let updates = self.updates.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let update = match event {
                    SessionEvent::Playing {
                        segment_index,
                        text,
                    } => PanelUpdate::Playing {
                        segment_index,
                        text,
                    },
                    SessionEvent::Stopped => PanelUpdate::PlaybackStopped,
                    SessionEvent::Failed { message } => PanelUpdate::PlaybackFailed { message },
                };
                let _ = updates.send(update);
            }
            // The event stream closing means the session ended; only now
            // may the gate admit the next action.
            drop(permit);
        });

        Ok(())
    }

    /// Stop the active playback session, if any.
    pub async fn stop_playback(&self) {
        self.sequencer.stop().await;
    }

    pub async fn playback_active(&self) -> bool {
        self.sequencer.is_active().await
    }

    async fn gated<T>(
        &self,
        description: &str,
        action: impl Future<Output = Result<T, PanelError>>,
    ) -> Result<T, PanelError> {
        self.gate
            .execute(description, async {
                self.update(PanelUpdate::Processing {
                    description: description.to_string(),
                });
                action.await
            })
            .await?
    }

    fn update(&self, update: PanelUpdate) {
        let _ = self.updates.send(update);
    }
}

fn lock_history(history: &Mutex<Vec<AnswerRecord>>) -> std::sync::MutexGuard<'_, Vec<AnswerRecord>> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timesource::{TimeSource, TimeSourceError};
    use async_trait::async_trait;

    struct NoVideoTime;

    #[async_trait]
    impl TimeSource for NoVideoTime {
        async fn current_position(&self) -> Result<Option<u64>, TimeSourceError> {
            Ok(None)
        }
    }

    struct SilentOutput;

    impl AudioOutput for SilentOutput {
        fn play(&self, _data: bytes::Bytes) -> Result<crate::audio::ClipHandle, crate::audio::OutputError> {
            Err(crate::audio::OutputError::WorkerGone)
        }
    }

    fn panel() -> Panel {
        let (panel, _updates) = Panel::new(
            PanelConfig::default(),
            VideoId::new("abcdefghijk"),
            Arc::new(NoVideoTime),
            Arc::new(SilentOutput),
        );
        panel
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_the_gate() {
        let panel = panel();
        let error = panel.ask("   ", true).await.unwrap_err();
        assert!(matches!(error, PanelError::EmptyQuery));
        assert!(panel.answer_history().is_empty());
    }

    #[tokio::test]
    async fn blank_language_is_rejected_before_the_gate() {
        let panel = panel();
        let error = panel.start_translated_playback("  ").await.unwrap_err();
        assert!(matches!(error, PanelError::EmptyLanguage));
        assert!(!panel.playback_active().await);
    }

    #[tokio::test]
    async fn current_segment_without_a_transcript_is_none() {
        let panel = panel();
        assert!(panel.current_segment().await.is_none());
    }

    #[test]
    fn busy_is_not_reported_as_a_failure() {
        let error = PanelError::Busy(Busy {
            in_flight: DESC_SUMMARY.to_string(),
        });
        assert!(error.is_busy());
        assert_eq!(
            error.to_string(),
            "Please wait. A request is already in progress: Fetching video summary"
        );
    }
}
