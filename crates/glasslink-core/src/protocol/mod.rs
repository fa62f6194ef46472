//! Device wire protocol
//!
//! Every frame written to an arm starts with a one-byte command identifier.
//! Replies and unsolicited events arrive as notifications whose first byte is
//! again a command/event identifier.

pub mod chunk;
pub mod commands;
pub mod layout;
pub mod notification;
pub mod serial;

pub use chunk::{encode_chunks, MULTI_FRAME_HEADER_LEN};

// ----------------------------------------------------------------------------
// Command Identifiers
// ----------------------------------------------------------------------------

pub const CMD_BRIGHTNESS: u8 = 0x01;
pub const CMD_HEAD_UP_ANGLE: u8 = 0x0B;
pub const CMD_MIC: u8 = 0x0E;
pub const CMD_EXIT: u8 = 0x18;
pub const CMD_HEARTBEAT: u8 = 0x25;
pub const CMD_DASHBOARD_POSITION: u8 = 0x26;
pub const CMD_BATTERY: u8 = 0x2C;
pub const CMD_SERIAL: u8 = 0x34;
pub const CMD_INIT: u8 = 0x4D;
pub const CMD_TEXT: u8 = 0x4E;
pub const CMD_VOICE_DATA: u8 = 0xF1;
pub const CMD_DEVICE_ORDER: u8 = 0xF5;

// ----------------------------------------------------------------------------
// Reply Markers
// ----------------------------------------------------------------------------

/// Second byte of a reply when the arm accepted the command
pub const ACK_SUCCESS: u8 = 0xC9;

/// Second byte of a reply when the arm rejected the command
pub const ACK_FAILURE: u8 = 0xCA;

/// Second byte of a battery reply that carries telemetry
pub const BATTERY_REPLY_MARKER: u8 = 0x66;

/// Conservative per-frame payload budget for the arms' link
pub const DEFAULT_MAX_FRAME_SIZE: usize = 180;
