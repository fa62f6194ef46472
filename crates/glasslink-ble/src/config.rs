//! BLE link configuration

use std::path::PathBuf;
use std::time::Duration;

use glasslink_core::protocol::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the glasses link
///
/// Timings are kept as integer milliseconds so the struct round-trips through
/// TOML unchanged; use the `Duration` accessors in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Advertised name prefix shared by both arms
    pub device_name_prefix: String,
    /// Name fragment that picks one pair among several nearby
    pub search_filter: Option<String>,
    /// Maximum time to wait for a connection to complete
    pub connection_timeout_ms: u64,
    /// Interval of the reconnect timer
    pub reconnect_interval_ms: u64,
    /// Acknowledgement timeout of the first attempt
    pub ack_timeout_base_ms: u64,
    /// Added to the acknowledgement timeout on each retry
    pub ack_timeout_step_ms: u64,
    /// Attempts per side before a command gives up on it
    pub max_send_attempts: u32,
    /// Pause between frames of one command
    pub inter_frame_delay_ms: u64,
    /// Pause between commands when the command asks for none
    pub min_command_delay_ms: u64,
    /// Largest frame written in one go
    pub max_frame_size: usize,
    /// Heartbeat interval while both arms are ready
    pub heartbeat_interval_ms: u64,
    /// Where paired identities are remembered
    pub pairing_file: Option<PathBuf>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name_prefix: "Even G1_".to_string(),
            search_filter: None,
            connection_timeout_ms: 10_000,
            reconnect_interval_ms: 5_000,
            ack_timeout_base_ms: 300,
            ack_timeout_step_ms: 200,
            max_send_attempts: 5,
            inter_frame_delay_ms: 8,
            min_command_delay_ms: 50,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            heartbeat_interval_ms: 15_000,
            pairing_file: None,
        }
    }
}

impl BleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.device_name_prefix = prefix.into();
        self
    }

    pub fn with_search_filter(mut self, filter: impl Into<String>) -> Self {
        self.search_filter = Some(filter.into());
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the first acknowledgement timeout and the per-retry increment
    pub fn with_ack_timeouts(mut self, base: Duration, step: Duration) -> Self {
        self.ack_timeout_base_ms = base.as_millis() as u64;
        self.ack_timeout_step_ms = step.as_millis() as u64;
        self
    }

    pub fn with_max_send_attempts(mut self, attempts: u32) -> Self {
        self.max_send_attempts = attempts;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_pairing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pairing_file = Some(path.into());
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Timing knobs consumed by the command dispatcher
    pub fn dispatch_timing(&self) -> DispatchTiming {
        DispatchTiming {
            ack_timeout_base: Duration::from_millis(self.ack_timeout_base_ms),
            ack_timeout_step: Duration::from_millis(self.ack_timeout_step_ms),
            max_attempts: self.max_send_attempts.max(1),
            inter_frame_delay: Duration::from_millis(self.inter_frame_delay_ms),
            min_command_delay: Duration::from_millis(self.min_command_delay_ms),
        }
    }

    /// Check values that would make the link unusable
    pub fn validate(&self) -> Result<(), String> {
        if self.device_name_prefix.is_empty() {
            return Err("device_name_prefix must not be empty".into());
        }
        if self.max_send_attempts == 0 {
            return Err("max_send_attempts must be at least 1".into());
        }
        if self.max_frame_size <= glasslink_core::protocol::MULTI_FRAME_HEADER_LEN {
            return Err(format!(
                "max_frame_size {} leaves no room for a payload",
                self.max_frame_size
            ));
        }
        if self.reconnect_interval_ms == 0 || self.heartbeat_interval_ms == 0 {
            return Err("timer intervals must be non-zero".into());
        }
        Ok(())
    }
}

/// Pacing and retry parameters of the command dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTiming {
    pub ack_timeout_base: Duration,
    pub ack_timeout_step: Duration,
    pub max_attempts: u32,
    pub inter_frame_delay: Duration,
    pub min_command_delay: Duration,
}

impl DispatchTiming {
    /// Timeout of the zero-based `attempt`; strictly grows when `step` is non-zero
    pub fn ack_timeout(&self, attempt: u32) -> Duration {
        self.ack_timeout_base + self.ack_timeout_step * attempt
    }
}

impl Default for DispatchTiming {
    fn default() -> Self {
        BleConfig::default().dispatch_timing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_timeout_grows() {
        let timing = DispatchTiming::default();
        let timeouts: Vec<_> = (0..timing.max_attempts)
            .map(|attempt| timing.ack_timeout(attempt))
            .collect();
        assert_eq!(timeouts.len(), 5);
        assert_eq!(timeouts[0], Duration::from_millis(300));
        assert_eq!(timeouts[4], Duration::from_millis(1100));
        assert!(timeouts.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_serde_round_trip_keeps_defaults() {
        let config = BleConfig::default().with_search_filter("G1_74_");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let partial: BleConfig = serde_json::from_str(r#"{"max_send_attempts": 3}"#).unwrap();
        assert_eq!(partial.max_send_attempts, 3);
        assert_eq!(partial.reconnect_interval_ms, 5_000);
    }

    #[test]
    fn test_validate() {
        assert!(BleConfig::default().validate().is_ok());
        assert!(BleConfig::default().with_max_send_attempts(0).validate().is_err());
        assert!(BleConfig::default()
            .with_device_name_prefix("")
            .validate()
            .is_err());
    }
}
