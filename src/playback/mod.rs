// src/playback/mod.rs
// Segment-synchronized playback sessions

mod session;

pub use session::{
    PlaybackError, PlaybackSession, SessionControl, SessionEvent, SessionPhase,
};

use crate::api::TranscriptSource;
use crate::audio::{AudioDelivery, AudioOutput};
use crate::timesource::TimeSource;
use crate::transcript::TranscriptIndex;
use crate::video::VideoId;
use session::SessionRuntime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

struct ActiveSession {
    control: Arc<SessionControl>,
    task: JoinHandle<()>,
}

/// Drives translated-audio sessions. At most one session is active; each
/// iteration samples the play position, locates the segment, resolves its
/// audio and plays it to completion before the pacing delay, and starting
/// a new session cancels and fully stops the previous one first.
pub struct PlaybackSequencer {
    time: Arc<dyn TimeSource>,
    transcripts: Arc<dyn TranscriptSource>,
    delivery: Arc<dyn AudioDelivery>,
    output: Arc<dyn AudioOutput>,
    pacing_delay: Duration,
    active: TokioMutex<Option<ActiveSession>>,
}

impl PlaybackSequencer {
    pub fn new(
        time: Arc<dyn TimeSource>,
        transcripts: Arc<dyn TranscriptSource>,
        delivery: Arc<dyn AudioDelivery>,
        output: Arc<dyn AudioOutput>,
        pacing_delay: Duration,
    ) -> Self {
        Self {
            time,
            transcripts,
            delivery,
            output,
            pacing_delay,
            active: TokioMutex::new(None),
        }
    }

    /// Start a session for `video` in `language`. A transcript already held
    /// by the caller skips the priming fetch. Returns the control handle
    /// and the event stream; the stream closes when the session ends.
    pub async fn start(
        &self,
        video: VideoId,
        language: String,
        transcript: Option<TranscriptIndex>,
    ) -> (Arc<SessionControl>, mpsc::UnboundedReceiver<SessionEvent>) {
        self.stop().await;

        let session = PlaybackSession::new(video, language);
        let control = Arc::new(SessionControl::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let runtime = SessionRuntime {
            session,
            control: control.clone(),
            time: self.time.clone(),
            transcripts: self.transcripts.clone(),
            delivery: self.delivery.clone(),
            output: self.output.clone(),
            events: events_tx,
            pacing_delay: self.pacing_delay,
            transcript,
        };
        let task = tokio::spawn(runtime.run());

        *self.active.lock().await = Some(ActiveSession {
            control: control.clone(),
            task,
        });

        (control, events_rx)
    }

    /// Cooperative stop: flag the session, silence the sounding clip, and
    /// wait for the loop to wind down. No-op when nothing is active.
    pub async fn stop(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        active.control.cancel();
        if let Err(e) = active.task.await {
            tracing::warn!("Playback session task ended abnormally: {}", e);
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| !active.control.phase().is_terminal())
            .unwrap_or(false)
    }
}
