use crate::api::{ApiError, TranscriptSource};
use crate::audio::{AudioDelivery, AudioOutput, ClipHandle, ClipOutcome, ClipStopper};
use crate::timesource::{TimeSource, TimeSourceError};
use crate::transcript::TranscriptIndex;
use crate::video::VideoId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use uuid::Uuid;

/// Lifecycle of one translated-playback session. "Idle" is the absence of
/// a session; a spawned session starts in `Priming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Priming,
    Looping,
    Stopped,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Stopped | SessionPhase::Failed)
    }
}

/// Progress feedback emitted by the playback loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Playing { segment_index: usize, text: String },
    Stopped,
    Failed { message: String },
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Transcript not available.")]
    NoTranscript,

    #[error("Could not determine the current segment.")]
    SegmentOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    TimeSource(#[from] TimeSourceError),

    #[error("Failed to fetch current video time.")]
    NoMediaElement,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Audio output error: {0}")]
    Output(String),
}

/// Identity of one playback session.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: String,
    pub video: VideoId,
    pub language: String,
}

impl PlaybackSession {
    pub fn new(video: VideoId, language: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video,
            language,
        }
    }
}

/// Shared control block of a running session: the cooperative cancellation
/// flag, the stopper of the clip currently sounding, and the published
/// phase. Cancellation is observed by the loop at its suspension points;
/// the stopper lets a stop request silence the in-flight clip immediately
/// instead of waiting for it to play out.
#[derive(Debug)]
pub struct SessionControl {
    cancelled: AtomicBool,
    current_clip: Mutex<Option<ClipStopper>>,
    phase: watch::Sender<SessionPhase>,
}

impl SessionControl {
    pub(crate) fn new() -> Self {
        let (phase, _) = watch::channel(SessionPhase::Priming);
        Self {
            cancelled: AtomicBool::new(false),
            current_clip: Mutex::new(None),
            phase,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(stopper) = self.lock_clip().as_ref() {
            stopper.stop();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn phase_watch(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    pub(crate) fn install_clip(&self, stopper: ClipStopper) {
        let mut slot = self.lock_clip();
        // A cancel that raced in between play() and install would miss the
        // new clip; stop it here instead of at the next checkpoint.
        if self.is_cancelled() {
            stopper.stop();
        }
        *slot = Some(stopper);
    }

    pub(crate) fn release_clip(&self) {
        if let Some(stopper) = self.lock_clip().take() {
            stopper.stop();
        }
    }

    fn lock_clip(&self) -> std::sync::MutexGuard<'_, Option<ClipStopper>> {
        self.current_clip
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything one session task owns while it runs.
pub(crate) struct SessionRuntime {
    pub(crate) session: PlaybackSession,
    pub(crate) control: Arc<SessionControl>,
    pub(crate) time: Arc<dyn TimeSource>,
    pub(crate) transcripts: Arc<dyn TranscriptSource>,
    pub(crate) delivery: Arc<dyn AudioDelivery>,
    pub(crate) output: Arc<dyn AudioOutput>,
    pub(crate) events: mpsc::UnboundedSender<SessionEvent>,
    pub(crate) pacing_delay: Duration,
    pub(crate) transcript: Option<TranscriptIndex>,
}

impl SessionRuntime {
    pub(crate) async fn run(mut self) {
        tracing::info!(
            "Playback session {} started: video={}, language={}",
            self.session.id,
            self.session.video,
            self.session.language
        );

        let outcome = self.drive().await;
        self.control.release_clip();

        match outcome {
            Ok(()) => {
                self.control.set_phase(SessionPhase::Stopped);
                let _ = self.events.send(SessionEvent::Stopped);
                tracing::info!("Playback session {} stopped", self.session.id);
            }
            Err(e) => {
                self.control.set_phase(SessionPhase::Failed);
                let _ = self.events.send(SessionEvent::Failed {
                    message: e.to_string(),
                });
                tracing::error!("Playback session {} failed: {}", self.session.id, e);
            }
        }
    }

    async fn drive(&mut self) -> Result<(), PlaybackError> {
        // Priming: a transcript must exist before the loop may run.
        let transcript = match self.transcript.take() {
            Some(index) => index,
            None => self.transcripts.transcript(&self.session.video).await?,
        };
        if transcript.is_empty() {
            return Err(PlaybackError::NoTranscript);
        }
        if self.control.is_cancelled() {
            return Ok(());
        }

        self.control.set_phase(SessionPhase::Looping);
        let mut active: Option<ClipHandle> = None;

        loop {
            if self.control.is_cancelled() {
                break;
            }

            // Sample the host video position. The segment is re-located
            // from scratch every iteration so the loop follows seeking,
            // at the cost of repeating or skipping a segment.
            let position = self
                .time
                .current_position()
                .await?
                .ok_or(PlaybackError::NoMediaElement)?;
            if self.control.is_cancelled() {
                break;
            }

            let index = transcript
                .locate(position)
                .ok_or(PlaybackError::NoTranscript)?;
            let Some(segment) = transcript.get(index) else {
                return Err(PlaybackError::SegmentOutOfRange {
                    index,
                    len: transcript.len(),
                });
            };

            let data = self
                .delivery
                .resolve(&self.session.video, &self.session.language, index)
                .await?;
            if self.control.is_cancelled() {
                break;
            }

            // One sounding clip at a time: retire the previous handle
            // before the next clip starts.
            if let Some(previous) = active.take() {
                previous.stop();
            }

            let _ = self.events.send(SessionEvent::Playing {
                segment_index: index,
                text: segment.text.clone(),
            });
            tracing::info!(
                "Session {}: playing segment {} at t={}s",
                self.session.id,
                index,
                position
            );

            let mut handle = self
                .output
                .play(data)
                .map_err(|e| PlaybackError::Output(e.to_string()))?;
            self.control.install_clip(handle.stopper());

            // Suspend until the clip resolves. An internal playback error
            // does not end the session; the loop moves to the next
            // segment.
            match handle.wait().await {
                ClipOutcome::Failed => {
                    tracing::warn!(
                        "Session {}: clip for segment {} failed to play, moving on",
                        self.session.id,
                        index
                    );
                }
                ClipOutcome::Completed | ClipOutcome::Stopped => {}
            }
            active = Some(handle);

            sleep(self.pacing_delay).await;
        }

        Ok(())
    }
}
