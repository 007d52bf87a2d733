use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 100;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_POLL_ATTEMPT_TIMEOUT_SECS: u64 = 2;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 20;
const DEFAULT_PACING_DELAY_MS: u64 = 500;
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// How translated audio is obtained from the service: a direct per-segment
/// stream, or an idempotent create call polled until generation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDeliveryMode {
    Streaming,
    CreatePoll,
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub base_url: String,
    /// Deadline for the one-shot informational fetches (summary, notes,
    /// transcript, Q&A).
    pub fetch_timeout: Duration,
    /// Delay between re-issues of the audio create call.
    pub poll_interval: Duration,
    /// Deadline for a single create call; a timed-out attempt counts
    /// against the budget like a not-ready response.
    pub poll_attempt_timeout: Duration,
    /// Total create attempts before audio generation is declared failed.
    pub poll_max_attempts: u32,
    /// Pause between playback-loop iterations.
    pub pacing_delay: Duration,
    pub delivery_mode: AudioDeliveryMode,
    /// Most recent answered queries kept in the panel history.
    pub history_limit: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_attempt_timeout: Duration::from_secs(DEFAULT_POLL_ATTEMPT_TIMEOUT_SECS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            pacing_delay: Duration::from_millis(DEFAULT_PACING_DELAY_MS),
            delivery_mode: AudioDeliveryMode::Streaming,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl PanelConfig {
    /// Build a config from `AGENTPLAY_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(url) = std::env::var("AGENTPLAY_BASE_URL") {
            let trimmed = url.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                config.base_url = trimmed.to_string();
            }
        }

        if let Some(secs) = env_u64("AGENTPLAY_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("AGENTPLAY_POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("AGENTPLAY_POLL_ATTEMPT_TIMEOUT_SECS") {
            config.poll_attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = env_u64("AGENTPLAY_POLL_MAX_ATTEMPTS") {
            if attempts > 0 {
                config.poll_max_attempts = attempts as u32;
            }
        }
        if let Some(ms) = env_u64("AGENTPLAY_PACING_DELAY_MS") {
            config.pacing_delay = Duration::from_millis(ms);
        }

        if let Ok(mode) = std::env::var("AGENTPLAY_AUDIO_DELIVERY") {
            config.delivery_mode = parse_delivery_mode(&mode).unwrap_or(config.delivery_mode);
        }

        config
    }
}

pub fn parse_delivery_mode(raw: &str) -> Option<AudioDeliveryMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "stream" | "streaming" => Some(AudioDeliveryMode::Streaming),
        "poll" | "create-poll" | "create_poll" => Some(AudioDeliveryMode::CreatePoll),
        _ => None,
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let config = PanelConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(100));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_max_attempts, 20);
        assert_eq!(config.pacing_delay, Duration::from_millis(500));
        assert_eq!(config.delivery_mode, AudioDeliveryMode::Streaming);
    }

    #[test]
    fn delivery_mode_parsing() {
        assert_eq!(parse_delivery_mode("streaming"), Some(AudioDeliveryMode::Streaming));
        assert_eq!(parse_delivery_mode(" Create-Poll "), Some(AudioDeliveryMode::CreatePoll));
        assert_eq!(parse_delivery_mode("other"), None);
    }
}
