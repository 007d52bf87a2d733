use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Failed to fetch current video time: {0}")]
pub struct TimeSourceError(pub String);

/// Reports the host video's current play position in whole seconds.
///
/// Each call is one asynchronous round trip to the host page (the panel
/// cannot observe the player directly). `Ok(None)` means the page has no
/// media element; an `Err` means the round trip itself failed. Both are
/// recoverable conditions the caller surfaces to the user instead of
/// crashing the session.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn current_position(&self) -> Result<Option<u64>, TimeSourceError>;
}
