//! Inbound notification decoding
//!
//! Every notification is dispatched on its first byte. Decoding never fails:
//! unknown identifiers and short frames are logged and dropped, so a
//! misbehaving arm can not take down the notification loop.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::protocol::*;

// ----------------------------------------------------------------------------
// Event Types
// ----------------------------------------------------------------------------

/// Result an arm reports for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckOutcome {
    Success,
    Failure,
}

impl AckOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AckOutcome::Success)
    }
}

/// Unsolicited gesture, wear, and case events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceOrder {
    HeadUp,
    HeadDown,
    Activated,
    Silenced,
    DisplayReady,
    TriggerAi,
    StopRecording,
    ChangePage,
    CaseRemoved,
    CaseOpen,
    CaseClosed,
    CaseChargingStatus { charging: bool },
    CaseChargeInfo { battery_percent: u8 },
    DoubleTap,
}

impl DeviceOrder {
    fn decode(code: u8, argument: Option<u8>) -> Option<Self> {
        let order = match code {
            0x00 => DeviceOrder::DisplayReady,
            0x01 => DeviceOrder::TriggerAi,
            0x02 | 0x1E => DeviceOrder::HeadUp,
            0x03 => DeviceOrder::ChangePage,
            0x04 => DeviceOrder::Silenced,
            0x05 => DeviceOrder::Activated,
            0x07 => DeviceOrder::CaseRemoved,
            0x08 => DeviceOrder::CaseOpen,
            0x0B => DeviceOrder::CaseClosed,
            0x0E => DeviceOrder::CaseChargingStatus {
                charging: argument? == 0x01,
            },
            0x0F => DeviceOrder::CaseChargeInfo {
                battery_percent: argument?,
            },
            0x18 => DeviceOrder::StopRecording,
            0x1F => DeviceOrder::HeadDown,
            0x20 => DeviceOrder::DoubleTap,
            _ => return None,
        };
        Some(order)
    }
}

/// A decoded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Plain acknowledgement of a command
    Ack { command: u8, outcome: AckOutcome },
    /// Heartbeat echo
    Heartbeat { sequence: u8 },
    /// Battery reply; voltage is the raw reading divided by ten
    Battery { percent: u8, voltage: u16 },
    /// Serial number reply
    Serial(String),
    Order(DeviceOrder),
    /// Compressed microphone audio
    VoiceData { sequence: u8, data: Vec<u8> },
}

impl DeviceEvent {
    /// How this event resolves the side's pending command, if at all
    ///
    /// Replies to queries count as a successful acknowledgement of the query.
    pub fn acknowledgement(&self) -> Option<AckOutcome> {
        match self {
            DeviceEvent::Ack { outcome, .. } => Some(*outcome),
            DeviceEvent::Heartbeat { .. } | DeviceEvent::Battery { .. } | DeviceEvent::Serial(_) => {
                Some(AckOutcome::Success)
            }
            DeviceEvent::Order(_) | DeviceEvent::VoiceData { .. } => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Decode one notification frame
pub fn decode_notification(data: &[u8]) -> Option<DeviceEvent> {
    let (&command, rest) = data.split_first()?;

    match command {
        CMD_BATTERY => decode_battery(data),
        CMD_HEARTBEAT => Some(DeviceEvent::Heartbeat {
            sequence: rest.get(2).copied().unwrap_or_default(),
        }),
        CMD_SERIAL => decode_serial_reply(data),
        CMD_DEVICE_ORDER => {
            let code = *rest.first()?;
            match DeviceOrder::decode(code, rest.get(1).copied()) {
                Some(order) => Some(DeviceEvent::Order(order)),
                None => {
                    warn!("Unrecognized device order 0x{:02X}", code);
                    None
                }
            }
        }
        CMD_VOICE_DATA => {
            let (&sequence, audio) = rest.split_first()?;
            Some(DeviceEvent::VoiceData {
                sequence,
                data: audio.to_vec(),
            })
        }
        CMD_INIT | CMD_BRIGHTNESS | CMD_HEAD_UP_ANGLE | CMD_MIC | CMD_EXIT
        | CMD_DASHBOARD_POSITION | CMD_TEXT => decode_ack(command, rest),
        _ => {
            warn!(
                "Dropping notification with unknown identifier 0x{:02X} ({} bytes)",
                command,
                data.len()
            );
            None
        }
    }
}

fn decode_ack(command: u8, rest: &[u8]) -> Option<DeviceEvent> {
    let outcome = match rest.first() {
        Some(&ACK_SUCCESS) => AckOutcome::Success,
        Some(&ACK_FAILURE) => AckOutcome::Failure,
        other => {
            debug!(
                "Ignoring reply to 0x{:02X} with status {:?}",
                command, other
            );
            return None;
        }
    };
    Some(DeviceEvent::Ack { command, outcome })
}

fn decode_battery(data: &[u8]) -> Option<DeviceEvent> {
    if data.len() < 6 || data[1] != BATTERY_REPLY_MARKER {
        debug!("Ignoring battery reply {}", hex::encode(data));
        return None;
    }
    let raw = u16::from_le_bytes([data[4], data[5]]);
    Some(DeviceEvent::Battery {
        percent: data[2],
        voltage: raw / 10,
    })
}

fn decode_serial_reply(data: &[u8]) -> Option<DeviceEvent> {
    let body = data.get(2..)?;
    let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    match core::str::from_utf8(&body[..end]) {
        Ok(serial) if !serial.trim().is_empty() => {
            Some(DeviceEvent::Serial(serial.trim().to_string()))
        }
        _ => {
            warn!("Malformed serial reply {}", hex::encode(data));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_reply() {
        let event = decode_notification(&[0x2C, 0x66, 0x4B, 0x00, 0x64, 0x00]).unwrap();
        assert_eq!(
            event,
            DeviceEvent::Battery {
                percent: 75,
                voltage: 10
            }
        );
        assert_eq!(event.acknowledgement(), Some(AckOutcome::Success));
    }

    #[test]
    fn test_battery_reply_rejects_short_or_unmarked() {
        assert_eq!(decode_notification(&[0x2C, 0x66, 0x4B, 0x00, 0x64]), None);
        assert_eq!(
            decode_notification(&[0x2C, 0x65, 0x4B, 0x00, 0x64, 0x00]),
            None
        );
    }

    #[test]
    fn test_voltage_is_little_endian() {
        let event = decode_notification(&[0x2C, 0x66, 0x50, 0x00, 0x10, 0x27]).unwrap();
        // 0x2710 = 10000
        assert_eq!(
            event,
            DeviceEvent::Battery {
                percent: 80,
                voltage: 1000
            }
        );
    }

    #[test]
    fn test_ack_and_nack() {
        assert_eq!(
            decode_notification(&[CMD_INIT, ACK_SUCCESS]),
            Some(DeviceEvent::Ack {
                command: CMD_INIT,
                outcome: AckOutcome::Success
            })
        );
        let nack = decode_notification(&[CMD_TEXT, ACK_FAILURE]).unwrap();
        assert_eq!(nack.acknowledgement(), Some(AckOutcome::Failure));
        assert_eq!(decode_notification(&[CMD_TEXT, 0x00]), None);
    }

    #[test]
    fn test_device_orders() {
        let cases = [
            (0x00, DeviceOrder::DisplayReady),
            (0x01, DeviceOrder::TriggerAi),
            (0x02, DeviceOrder::HeadUp),
            (0x1E, DeviceOrder::HeadUp),
            (0x1F, DeviceOrder::HeadDown),
            (0x03, DeviceOrder::ChangePage),
            (0x04, DeviceOrder::Silenced),
            (0x05, DeviceOrder::Activated),
            (0x07, DeviceOrder::CaseRemoved),
            (0x08, DeviceOrder::CaseOpen),
            (0x0B, DeviceOrder::CaseClosed),
            (0x18, DeviceOrder::StopRecording),
            (0x20, DeviceOrder::DoubleTap),
        ];
        for (code, order) in cases {
            assert_eq!(
                decode_notification(&[CMD_DEVICE_ORDER, code]),
                Some(DeviceEvent::Order(order)),
                "code 0x{code:02X}"
            );
        }

        assert_eq!(
            decode_notification(&[CMD_DEVICE_ORDER, 0x0F, 64]),
            Some(DeviceEvent::Order(DeviceOrder::CaseChargeInfo {
                battery_percent: 64
            }))
        );
        assert_eq!(
            decode_notification(&[CMD_DEVICE_ORDER, 0x0E, 0x01]),
            Some(DeviceEvent::Order(DeviceOrder::CaseChargingStatus {
                charging: true
            }))
        );
    }

    #[test]
    fn test_orders_carry_no_acknowledgement() {
        let event = decode_notification(&[CMD_DEVICE_ORDER, 0x20]).unwrap();
        assert_eq!(event.acknowledgement(), None);
    }

    #[test]
    fn test_unknown_inputs_are_dropped() {
        assert_eq!(decode_notification(&[]), None);
        assert_eq!(decode_notification(&[0x99, 0x01]), None);
        assert_eq!(decode_notification(&[CMD_DEVICE_ORDER, 0x77]), None);
        assert_eq!(decode_notification(&[CMD_DEVICE_ORDER]), None);
        assert_eq!(decode_notification(&[CMD_DEVICE_ORDER, 0x0F]), None);
    }

    #[test]
    fn test_voice_data() {
        assert_eq!(
            decode_notification(&[CMD_VOICE_DATA, 3, 0xAA, 0xBB]),
            Some(DeviceEvent::VoiceData {
                sequence: 3,
                data: vec![0xAA, 0xBB]
            })
        );
    }

    #[test]
    fn test_serial_reply() {
        let mut frame = vec![CMD_SERIAL, 0x10];
        frame.extend_from_slice(b"S110LBA0200001\0\0");
        assert_eq!(
            decode_notification(&frame),
            Some(DeviceEvent::Serial("S110LBA0200001".into()))
        );
        assert_eq!(decode_notification(&[CMD_SERIAL, 0x10]), None);
    }
}
