//! Cloud session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the cloud relay session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// WebSocket endpoint of the relay
    pub server_url: String,
    /// Token presented in the connection handshake
    pub core_token: Option<String>,
    /// Wait after the socket opens before the handshake is sent
    pub settle_delay_ms: u64,
    /// Wait after each reconnect attempt before checking whether it took
    pub reconnect_wait_ms: u64,
    pub calendar_push_interval_ms: u64,
    pub datetime_push_interval_ms: u64,
    /// Upcoming calendar events sent per push
    pub max_calendar_events: usize,
    /// Audio frames held while the socket can not take them
    pub audio_buffer_capacity: usize,
    /// Sleep of the audio sender when it has nothing to do
    pub audio_poll_interval_ms: u64,
    /// Glasses model reported in connection state updates
    pub model_name: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8002/glasses-ws".to_string(),
            core_token: None,
            settle_delay_ms: 1_000,
            reconnect_wait_ms: 5_000,
            calendar_push_interval_ms: 3_600_000,
            datetime_push_interval_ms: 60_000,
            max_calendar_events: 5,
            audio_buffer_capacity: 300,
            audio_poll_interval_ms: 10,
            model_name: "Even Realities G1".to_string(),
        }
    }
}

impl CloudConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_core_token(mut self, token: impl Into<String>) -> Self {
        self.core_token = Some(token.into());
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_reconnect_wait(mut self, wait: Duration) -> Self {
        self.reconnect_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn with_audio_buffer_capacity(mut self, capacity: usize) -> Self {
        self.audio_buffer_capacity = capacity;
        self
    }

    pub fn with_audio_poll_interval(mut self, interval: Duration) -> Self {
        self.audio_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_push_intervals(mut self, calendar: Duration, datetime: Duration) -> Self {
        self.calendar_push_interval_ms = calendar.as_millis() as u64;
        self.datetime_push_interval_ms = datetime.as_millis() as u64;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reconnect_wait(&self) -> Duration {
        Duration::from_millis(self.reconnect_wait_ms)
    }

    pub fn calendar_push_interval(&self) -> Duration {
        Duration::from_millis(self.calendar_push_interval_ms)
    }

    pub fn datetime_push_interval(&self) -> Duration {
        Duration::from_millis(self.datetime_push_interval_ms)
    }

    pub fn audio_poll_interval(&self) -> Duration {
        Duration::from_millis(self.audio_poll_interval_ms)
    }

    /// Check values that would make the session unusable
    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.server_url)
            .map_err(|e| format!("server_url {:?} is invalid: {}", self.server_url, e))?;
        if self.audio_buffer_capacity == 0 {
            return Err("audio_buffer_capacity must be at least 1".into());
        }
        if self.audio_poll_interval_ms == 0 {
            return Err("audio_poll_interval_ms must be non-zero".into());
        }
        if self.calendar_push_interval_ms == 0 || self.datetime_push_interval_ms == 0 {
            return Err("push intervals must be non-zero".into());
        }
        if self.reconnect_wait_ms == 0 {
            return Err("reconnect_wait_ms must be non-zero".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CloudConfig::default();
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.reconnect_wait(), Duration::from_secs(5));
        assert_eq!(config.calendar_push_interval(), Duration::from_secs(3600));
        assert_eq!(config.datetime_push_interval(), Duration::from_secs(60));
        assert_eq!(config.max_calendar_events, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sub_second_push_intervals_survive() {
        let config = CloudConfig::default()
            .with_push_intervals(Duration::from_millis(500), Duration::from_millis(250));
        assert_eq!(config.calendar_push_interval(), Duration::from_millis(500));
        assert_eq!(config.datetime_push_interval(), Duration::from_millis(250));
        assert!(config.validate().is_ok());

        let zero = CloudConfig::default().with_push_intervals(Duration::ZERO, Duration::ZERO);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = CloudConfig::default().with_server_url("not a url");
        assert!(config.validate().is_err());
    }
}
