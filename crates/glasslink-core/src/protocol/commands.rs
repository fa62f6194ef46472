//! Builders for the commands the glasses understand
//!
//! Each builder returns a [`BufferedCommand`] already targeted at the side(s)
//! the firmware expects it on. Arguments outside the accepted range are
//! rejected rather than clamped.

use crate::command::BufferedCommand;
use crate::errors::{GlasslinkError, Result};
use crate::protocol::chunk::encode_chunks;
use crate::protocol::*;
use crate::types::Side;

/// Highest brightness level the display accepts
pub const MAX_BRIGHTNESS_LEVEL: u8 = 0x3F;

/// Highest head-up activation angle in degrees
pub const MAX_HEAD_UP_ANGLE: u8 = 60;

pub const MAX_DASHBOARD_HEIGHT: u8 = 8;
pub const DASHBOARD_DEPTH_RANGE: core::ops::RangeInclusive<u8> = 1..=9;

/// Display flag for a fresh text screen
const TEXT_NEW_SCREEN: u8 = 0x71;

// ----------------------------------------------------------------------------
// Link Management
// ----------------------------------------------------------------------------

/// Initialization handshake sent to one side after it is subscribed
pub fn init(side: Side) -> BufferedCommand {
    BufferedCommand::single(vec![CMD_INIT, 0x01]).to_side(side)
}

/// Keep-alive with a rolling sequence number
pub fn heartbeat(sequence: u8) -> BufferedCommand {
    BufferedCommand::single(vec![CMD_HEARTBEAT, 0x06, 0x00, sequence, 0x04, sequence])
}

/// Leave whatever feature is on screen and return to the dashboard
pub fn exit() -> BufferedCommand {
    BufferedCommand::single(vec![CMD_EXIT])
}

// ----------------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------------

pub fn battery_query() -> BufferedCommand {
    BufferedCommand::single(vec![CMD_BATTERY, 0x01])
}

/// Serial number lives on the left arm
pub fn serial_query() -> BufferedCommand {
    BufferedCommand::single(vec![CMD_SERIAL]).to_side(Side::Left)
}

// ----------------------------------------------------------------------------
// Settings
// ----------------------------------------------------------------------------

/// Brightness as a percentage, scaled to the display's 0..=63 range
pub fn brightness(percent: u8, auto: bool) -> Result<BufferedCommand> {
    if percent > 100 {
        return Err(GlasslinkError::invalid_argument(
            "brightness",
            format!("{percent} is above 100%"),
        ));
    }
    let level = ((percent as u16 * MAX_BRIGHTNESS_LEVEL as u16) / 100) as u8;
    Ok(
        BufferedCommand::single(vec![CMD_BRIGHTNESS, level, u8::from(auto)])
            .to_side(Side::Right),
    )
}

pub fn head_up_angle(degrees: u8) -> Result<BufferedCommand> {
    if degrees > MAX_HEAD_UP_ANGLE {
        return Err(GlasslinkError::invalid_argument(
            "head_up_angle",
            format!("{degrees} exceeds {MAX_HEAD_UP_ANGLE} degrees"),
        ));
    }
    Ok(BufferedCommand::single(vec![CMD_HEAD_UP_ANGLE, degrees, 0x01]).to_side(Side::Right))
}

pub fn dashboard_position(height: u8, depth: u8) -> Result<BufferedCommand> {
    if height > MAX_DASHBOARD_HEIGHT {
        return Err(GlasslinkError::invalid_argument(
            "height",
            format!("{height} exceeds {MAX_DASHBOARD_HEIGHT}"),
        ));
    }
    if !DASHBOARD_DEPTH_RANGE.contains(&depth) {
        return Err(GlasslinkError::invalid_argument(
            "depth",
            format!("{depth} is outside {DASHBOARD_DEPTH_RANGE:?}"),
        ));
    }
    Ok(BufferedCommand::single(vec![
        CMD_DASHBOARD_POSITION,
        0x08,
        0x00,
        0x00,
        0x02,
        0x01,
        height,
        depth,
    ]))
}

/// Microphone toggle; only the right arm carries a microphone
pub fn mic(enabled: bool) -> BufferedCommand {
    BufferedCommand::single(vec![CMD_MIC, u8::from(enabled)]).to_side(Side::Right)
}

// ----------------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------------

/// Text screen, split across as many frames as the payload needs
///
/// `page` and `max_page` are 1-based as rendered by the firmware.
pub fn text_page(text: &str, page: u8, max_page: u8, max_frame_size: usize) -> Result<BufferedCommand> {
    if page == 0 || page > max_page {
        return Err(GlasslinkError::invalid_argument(
            "page",
            format!("{page} is outside 1..={max_page}"),
        ));
    }
    let sub_header = [TEXT_NEW_SCREEN, 0x00, 0x00, page, max_page];
    let frames = encode_chunks(CMD_TEXT, &sub_header, text.as_bytes(), max_frame_size)?;
    Ok(BufferedCommand::new(frames))
}

/// Single-page text wall
pub fn text(text: &str, max_frame_size: usize) -> Result<BufferedCommand> {
    text_page(text, 1, 1, max_frame_size)
}
