//! JSON message envelope exchanged with the cloud relay
//!
//! Every text frame is an object with a mandatory `type` field. Inbound frames
//! are decoded into [`InboundMessage`]; types outside the known set decode to
//! [`InboundMessage::Unknown`] and are logged, never treated as fatal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{CloudError, CloudResult};

// ----------------------------------------------------------------------------
// Inbound
// ----------------------------------------------------------------------------

/// Message received from the relay
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ConnectionAck {
        #[serde(default, rename = "userSession")]
        user_session: Option<Value>,
    },
    AppStateChange {
        #[serde(default, rename = "userSession")]
        user_session: Option<Value>,
    },
    ConnectionError {
        #[serde(default)]
        message: Option<String>,
    },
    AuthError {
        #[serde(default)]
        message: Option<String>,
    },
    MicrophoneStateChange {
        #[serde(rename = "isMicrophoneEnabled")]
        enabled: bool,
    },
    DisplayEvent {
        layout: DisplayLayout,
        #[serde(default, rename = "durationMs")]
        duration_ms: Option<u64>,
    },
    AudioPlayRequest {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(default, rename = "audioUrl")]
        audio_url: Option<String>,
    },
    AudioStopRequest {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    RequestSingle {
        data_type: String,
    },
    RequestSingleLocation {
        #[serde(default)]
        accuracy: Option<String>,
        #[serde(default, rename = "correlationId")]
        correlation_id: Option<String>,
    },
    Interim {
        #[serde(default)]
        text: String,
    },
    Final {
        #[serde(default)]
        text: String,
    },
    SettingsUpdate {
        #[serde(default)]
        settings: Value,
    },
    SetLocationTier {
        tier: String,
    },
    AppStarted {
        #[serde(rename = "packageName")]
        package_name: String,
    },
    AppStopped {
        #[serde(rename = "packageName")]
        package_name: String,
    },
    #[serde(other)]
    Unknown,
}

/// Layout carried by a display event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "layoutType", rename_all = "snake_case")]
pub enum DisplayLayout {
    TextWall {
        #[serde(default)]
        text: String,
    },
    DoubleTextWall {
        #[serde(default, rename = "topText")]
        top_text: String,
        #[serde(default, rename = "bottomText")]
        bottom_text: String,
    },
    ReferenceCard {
        #[serde(default)]
        title: String,
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl InboundMessage {
    /// Decode one text frame.
    ///
    /// A frame without a `type` string is malformed. A known type with missing
    /// or mistyped fields is also malformed. An unrecognised type decodes to
    /// [`InboundMessage::Unknown`].
    pub fn parse(text: &str) -> CloudResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CloudError::MalformedMessage("missing type field".into()))?
            .to_string();

        let message: InboundMessage = serde_json::from_value(value)
            .map_err(|e| CloudError::MalformedMessage(format!("{}: {}", kind, e)))?;
        if message == InboundMessage::Unknown {
            warn!("Ignoring unknown cloud message type {:?}", kind);
        }
        Ok(message)
    }

    /// Whether the relay rejected the session outright
    pub fn is_session_rejection(&self) -> bool {
        matches!(
            self,
            InboundMessage::AuthError { .. } | InboundMessage::ConnectionError { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Outbound
// ----------------------------------------------------------------------------

/// Calendar entry pushed to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub title: String,
    #[serde(rename = "dtStart")]
    pub start: DateTime<Utc>,
    #[serde(rename = "dtEnd")]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Glasses connection state as reported to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlassesLinkState {
    Connected,
    Disconnected,
}

/// Message sent to the relay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ConnectionInit {
        #[serde(rename = "coreToken")]
        core_token: String,
    },
    CalendarEvent {
        #[serde(flatten)]
        entry: CalendarEntry,
        timestamp: i64,
    },
    LocationUpdate {
        lat: f64,
        lng: f64,
        #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
        timestamp: i64,
    },
    GlassesBatteryUpdate {
        level: u8,
        charging: bool,
        timestamp: i64,
    },
    GlassesConnectionState {
        #[serde(rename = "modelName")]
        model_name: String,
        status: GlassesLinkState,
        timestamp: i64,
    },
    DatetimeUpdate {
        datetime: String,
        timestamp: i64,
    },
}

impl OutboundMessage {
    pub fn connection_init(core_token: impl Into<String>) -> Self {
        OutboundMessage::ConnectionInit {
            core_token: core_token.into(),
        }
    }

    pub fn calendar_event(entry: CalendarEntry) -> Self {
        OutboundMessage::CalendarEvent {
            entry,
            timestamp: now_millis(),
        }
    }

    pub fn location(lat: f64, lng: f64, correlation_id: Option<String>) -> Self {
        OutboundMessage::LocationUpdate {
            lat,
            lng,
            correlation_id,
            timestamp: now_millis(),
        }
    }

    pub fn battery(level: u8, charging: bool) -> Self {
        OutboundMessage::GlassesBatteryUpdate {
            level,
            charging,
            timestamp: now_millis(),
        }
    }

    pub fn connection_state(model_name: impl Into<String>, status: GlassesLinkState) -> Self {
        OutboundMessage::GlassesConnectionState {
            model_name: model_name.into(),
            status,
            timestamp: now_millis(),
        }
    }

    pub fn datetime(at: DateTime<Utc>) -> Self {
        OutboundMessage::DatetimeUpdate {
            datetime: at.to_rfc3339(),
            timestamp: now_millis(),
        }
    }

    /// Value of the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::ConnectionInit { .. } => "connection_init",
            OutboundMessage::CalendarEvent { .. } => "calendar_event",
            OutboundMessage::LocationUpdate { .. } => "location_update",
            OutboundMessage::GlassesBatteryUpdate { .. } => "glasses_battery_update",
            OutboundMessage::GlassesConnectionState { .. } => "glasses_connection_state",
            OutboundMessage::DatetimeUpdate { .. } => "datetime_update",
        }
    }

    pub fn to_json(&self) -> CloudResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
