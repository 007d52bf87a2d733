use crate::api::{ApiError, AudioService};
use crate::config::{AudioDeliveryMode, PanelConfig};
use crate::video::VideoId;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::{sleep, timeout};

/// Resolves playable audio for one transcript segment (0-based index).
#[async_trait]
pub trait AudioDelivery: Send + Sync {
    async fn resolve(
        &self,
        video: &VideoId,
        language: &str,
        segment_index: usize,
    ) -> Result<Bytes, ApiError>;
}

/// Direct per-segment streaming; the service synthesizes on demand and the
/// response is immediately playable.
pub struct StreamingDelivery {
    service: Arc<dyn AudioService>,
}

impl StreamingDelivery {
    pub fn new(service: Arc<dyn AudioService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl AudioDelivery for StreamingDelivery {
    async fn resolve(
        &self,
        video: &VideoId,
        language: &str,
        segment_index: usize,
    ) -> Result<Bytes, ApiError> {
        self.service
            .segment_audio(video, language, segment_index + 1)
            .await
    }
}

/// Bounded fixed-interval polling of the create call.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            interval: config.poll_interval,
            attempt_timeout: config.poll_attempt_timeout,
            max_attempts: config.poll_max_attempts,
        }
    }
}

/// Create/poll handshake: issue the idempotent create call, re-issue it at
/// a fixed interval until the ack reports completion, then fetch segments
/// like the streaming variant. Exactly `max_attempts` create calls are made
/// before the handshake is declared timed out.
pub struct CreatePollDelivery {
    service: Arc<dyn AudioService>,
    policy: PollPolicy,
    ensured: TokioMutex<HashSet<String>>,
}

impl CreatePollDelivery {
    pub fn new(service: Arc<dyn AudioService>, policy: PollPolicy) -> Self {
        Self {
            service,
            policy,
            ensured: TokioMutex::new(HashSet::new()),
        }
    }

    async fn ensure_generated(&self, video: &VideoId, language: &str) -> Result<(), ApiError> {
        let key = format!("{}/{}", video, language);
        let mut ensured = self.ensured.lock().await;
        if ensured.contains(&key) {
            return Ok(());
        }

        for attempt in 1..=self.policy.max_attempts {
            let ack = match timeout(
                self.policy.attempt_timeout,
                self.service.create_audio(video, language),
            )
            .await
            {
                Ok(Ok(ack)) => Some(ack),
                Ok(Err(e)) => {
                    tracing::warn!(
                        "create_audio attempt {}/{} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        "create_audio attempt {}/{} timed out",
                        attempt,
                        self.policy.max_attempts
                    );
                    None
                }
            };

            if let Some(ack) = ack {
                if let Some(error) = ack.error {
                    return Err(ApiError::Service(error));
                }
                if ack.is_ready() {
                    tracing::info!(
                        "Audio ready for {} in {} after {} attempt(s)",
                        video,
                        language,
                        attempt
                    );
                    ensured.insert(key);
                    return Ok(());
                }
            }

            if attempt < self.policy.max_attempts {
                sleep(self.policy.interval).await;
            }
        }

        Err(ApiError::GenerationTimeout {
            attempts: self.policy.max_attempts,
        })
    }
}

#[async_trait]
impl AudioDelivery for CreatePollDelivery {
    async fn resolve(
        &self,
        video: &VideoId,
        language: &str,
        segment_index: usize,
    ) -> Result<Bytes, ApiError> {
        self.ensure_generated(video, language).await?;
        self.service
            .segment_audio(video, language, segment_index + 1)
            .await
    }
}

pub fn delivery_for(
    mode: AudioDeliveryMode,
    service: Arc<dyn AudioService>,
    policy: PollPolicy,
) -> Arc<dyn AudioDelivery> {
    match mode {
        AudioDeliveryMode::Streaming => Arc::new(StreamingDelivery::new(service)),
        AudioDeliveryMode::CreatePoll => Arc::new(CreatePollDelivery::new(service, policy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CreateAudioAck;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted service: reports "generated" after a fixed number of
    /// create calls.
    struct ScriptedService {
        ready_after: usize,
        create_calls: AtomicUsize,
        segment_calls: AtomicUsize,
    }

    impl ScriptedService {
        fn new(ready_after: usize) -> Self {
            Self {
                ready_after,
                create_calls: AtomicUsize::new(0),
                segment_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AudioService for ScriptedService {
        async fn create_audio(
            &self,
            _video: &VideoId,
            language: &str,
        ) -> Result<CreateAudioAck, ApiError> {
            let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let message = if call >= self.ready_after {
                format!("Audio already generated for this video in {}", language)
            } else {
                "Generation in progress".to_string()
            };
            Ok(CreateAudioAck {
                message: Some(message),
                error: None,
            })
        }

        async fn segment_audio(
            &self,
            _video: &VideoId,
            _language: &str,
            _segment_number: usize,
        ) -> Result<Bytes, ApiError> {
            self.segment_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"clip"))
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(50),
            max_attempts: 20,
        }
    }

    fn video() -> VideoId {
        VideoId::new("abcdefghijk")
    }

    #[tokio::test]
    async fn poll_succeeds_when_ready_on_the_last_attempt() {
        let service = Arc::new(ScriptedService::new(20));
        let delivery = CreatePollDelivery::new(service.clone(), fast_policy());

        let clip = delivery.resolve(&video(), "es", 0).await.unwrap();
        assert_eq!(clip.as_ref(), b"clip");
        assert_eq!(service.create_calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn poll_times_out_after_exactly_the_attempt_budget() {
        let service = Arc::new(ScriptedService::new(usize::MAX));
        let delivery = CreatePollDelivery::new(service.clone(), fast_policy());

        let error = delivery.resolve(&video(), "es", 0).await.unwrap_err();
        assert!(matches!(error, ApiError::GenerationTimeout { attempts: 20 }));
        assert!(error.is_timeout());
        assert_eq!(service.create_calls.load(Ordering::SeqCst), 20);
        assert_eq!(service.segment_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generation_is_ensured_once_per_video_and_language() {
        let service = Arc::new(ScriptedService::new(1));
        let delivery = CreatePollDelivery::new(service.clone(), fast_policy());

        delivery.resolve(&video(), "es", 0).await.unwrap();
        delivery.resolve(&video(), "es", 1).await.unwrap();

        assert_eq!(service.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.segment_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn service_error_aborts_the_handshake() {
        struct FailingService;

        #[async_trait]
        impl AudioService for FailingService {
            async fn create_audio(
                &self,
                _video: &VideoId,
                _language: &str,
            ) -> Result<CreateAudioAck, ApiError> {
                Ok(CreateAudioAck {
                    message: None,
                    error: Some("No transcript found".to_string()),
                })
            }

            async fn segment_audio(
                &self,
                _video: &VideoId,
                _language: &str,
                _segment_number: usize,
            ) -> Result<Bytes, ApiError> {
                unreachable!("segment audio must not be fetched after a service error")
            }
        }

        let delivery = CreatePollDelivery::new(Arc::new(FailingService), fast_policy());
        let error = delivery.resolve(&video(), "es", 0).await.unwrap_err();
        assert!(matches!(error, ApiError::Service(message) if message == "No transcript found"));
    }

    #[tokio::test]
    async fn streaming_uses_one_based_segment_numbers() {
        struct RecordingService(AtomicUsize);

        #[async_trait]
        impl AudioService for RecordingService {
            async fn create_audio(
                &self,
                _video: &VideoId,
                _language: &str,
            ) -> Result<CreateAudioAck, ApiError> {
                unreachable!("streaming delivery never issues create calls")
            }

            async fn segment_audio(
                &self,
                _video: &VideoId,
                _language: &str,
                segment_number: usize,
            ) -> Result<Bytes, ApiError> {
                self.0.store(segment_number, Ordering::SeqCst);
                Ok(Bytes::new())
            }
        }

        let service = Arc::new(RecordingService(AtomicUsize::new(0)));
        let delivery = StreamingDelivery::new(service.clone());
        delivery.resolve(&video(), "fr", 4).await.unwrap();
        assert_eq!(service.0.load(Ordering::SeqCst), 5);
    }
}
