use bytes::Bytes;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

const SINK_POLL_MS: u64 = 25;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Audio device unavailable: {0}")]
    Device(String),

    #[error("Audio playback worker stopped")]
    WorkerGone,
}

/// How a clip ended. `Failed` covers decode and device errors inside the
/// worker; the sequencer treats it like a finished clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOutcome {
    Completed,
    Stopped,
    Failed,
}

/// Cloneable stop switch for one clip.
#[derive(Debug, Clone, Default)]
pub struct ClipStopper(Arc<AtomicBool>);

impl ClipStopper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handle to a clip that has been handed to the output. At most one handle
/// per sounding clip; the owner either awaits completion or stops it.
pub struct ClipHandle {
    stopper: ClipStopper,
    done: oneshot::Receiver<ClipOutcome>,
}

impl ClipHandle {
    pub fn new(stopper: ClipStopper, done: oneshot::Receiver<ClipOutcome>) -> Self {
        Self { stopper, done }
    }

    pub fn stopper(&self) -> ClipStopper {
        self.stopper.clone()
    }

    /// Stop the clip immediately; its playback position is discarded.
    pub fn stop(&self) {
        self.stopper.stop();
    }

    /// Suspend until the clip completes, errors internally, or is stopped.
    pub async fn wait(&mut self) -> ClipOutcome {
        match (&mut self.done).await {
            Ok(outcome) => outcome,
            Err(_) => ClipOutcome::Failed,
        }
    }
}

/// Sink for playable clip bytes.
pub trait AudioOutput: Send + Sync {
    fn play(&self, data: Bytes) -> Result<ClipHandle, OutputError>;
}

struct PlayRequest {
    data: Bytes,
    stopper: ClipStopper,
    done: oneshot::Sender<ClipOutcome>,
}

/// Plays clips through rodio on a dedicated worker thread. The output
/// stream lives on the worker for the panel's lifetime; a fresh sink is
/// created per clip and torn down before the next request is served, so
/// clips queued behind a stopped one start promptly.
pub struct RodioOutput {
    requests: mpsc::Sender<PlayRequest>,
}

impl RodioOutput {
    pub fn new() -> Result<Self, OutputError> {
        let (requests_tx, requests_rx) = mpsc::channel::<PlayRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        std::thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || playback_worker(requests_rx, ready_tx))
            .map_err(|e| OutputError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                requests: requests_tx,
            }),
            Ok(Err(message)) => Err(OutputError::Device(message)),
            Err(_) => Err(OutputError::WorkerGone),
        }
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, data: Bytes) -> Result<ClipHandle, OutputError> {
        let stopper = ClipStopper::new();
        let (done_tx, done_rx) = oneshot::channel();
        self.requests
            .send(PlayRequest {
                data,
                stopper: stopper.clone(),
                done: done_tx,
            })
            .map_err(|_| OutputError::WorkerGone)?;
        Ok(ClipHandle::new(stopper, done_rx))
    }
}

fn playback_worker(requests: mpsc::Receiver<PlayRequest>, ready: mpsc::Sender<Result<(), String>>) {
    let stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            tracing::error!("Failed to open audio output stream: {}", e);
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    while let Ok(request) = requests.recv() {
        let outcome = play_clip(&stream, &request);
        let _ = request.done.send(outcome);
    }
}

fn play_clip(stream: &OutputStream, request: &PlayRequest) -> ClipOutcome {
    let source = match Decoder::new(Cursor::new(request.data.clone())) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!("Failed to decode audio clip: {}", e);
            return ClipOutcome::Failed;
        }
    };

    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);

    loop {
        if request.stopper.is_stopped() {
            sink.stop();
            return ClipOutcome::Stopped;
        }
        if sink.empty() {
            return ClipOutcome::Completed;
        }
        std::thread::sleep(Duration::from_millis(SINK_POLL_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stopped_handle_reports_the_stop() {
        let stopper = ClipStopper::new();
        let (done_tx, done_rx) = oneshot::channel();
        let mut handle = ClipHandle::new(stopper.clone(), done_rx);

        handle.stop();
        assert!(stopper.is_stopped());

        done_tx.send(ClipOutcome::Stopped).unwrap();
        assert_eq!(handle.wait().await, ClipOutcome::Stopped);
    }

    #[tokio::test]
    async fn dropped_worker_counts_as_a_failed_clip() {
        let (done_tx, done_rx) = oneshot::channel::<ClipOutcome>();
        let mut handle = ClipHandle::new(ClipStopper::new(), done_rx);
        drop(done_tx);
        assert_eq!(handle.wait().await, ClipOutcome::Failed);
    }
}
