//! Core types shared by the device and cloud layers

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Side
// ----------------------------------------------------------------------------

/// One of the two independent BLE peripherals that make up the glasses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides in wire order (left is always addressed first)
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Marker the arm embeds in its advertised local name, e.g. `Even G1_74_L_3A5B1C`
    pub fn name_marker(self) -> &'static str {
        match self {
            Side::Left => "_L_",
            Side::Right => "_R_",
        }
    }

    /// Determine the side from an advertised local name
    pub fn from_advertised_name(name: &str) -> Option<Side> {
        if name.contains(Side::Left.name_marker()) {
            Some(Side::Left)
        } else if name.contains(Side::Right.name_marker()) {
            Some(Side::Right)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

// ----------------------------------------------------------------------------
// Link Status
// ----------------------------------------------------------------------------

/// Connection progress of a single side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    Disconnected,
    Connecting,
    ServicesDiscovered,
    Initialized,
}

impl LinkStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, LinkStatus::ServicesDiscovered | LinkStatus::Initialized)
    }
}

/// Persisted identity of one side, enough to reconnect without a fresh scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideIdentity {
    /// Platform peripheral address as rendered by the BLE stack
    pub address: String,
    /// Advertised local name at the time of pairing
    pub name: String,
}

impl SideIdentity {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Whether this identity was captured under the given search filter
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.name.contains(filter)
    }
}

// ----------------------------------------------------------------------------
// Glasses Info
// ----------------------------------------------------------------------------

/// Frame shape encoded in the serial number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStyle {
    Round,
    Rectangular,
    Unknown,
}

/// Frame color encoded in the serial number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameColor {
    Grey,
    Brown,
    Green,
    Unknown,
}

/// Serial number and the attributes decoded from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlassesInfo {
    pub serial_number: String,
    pub style: FrameStyle,
    pub color: FrameColor,
}

impl fmt::Display for GlassesInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?})",
            self.serial_number, self.style, self.color
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_from_advertised_name() {
        assert_eq!(
            Side::from_advertised_name("Even G1_74_L_3A5B1C"),
            Some(Side::Left)
        );
        assert_eq!(
            Side::from_advertised_name("Even G1_74_R_3A5B1C"),
            Some(Side::Right)
        );
        assert_eq!(Side::from_advertised_name("Even G1_74"), None);
    }

    #[test]
    fn test_side_other() {
        assert_eq!(Side::Left.other(), Side::Right);
        assert_eq!(Side::Right.other(), Side::Left);
    }

    #[test]
    fn test_identity_filter() {
        let identity = SideIdentity::new("AA:BB:CC:DD:EE:FF", "Even G1_74_L_3A5B1C");
        assert!(identity.matches_filter("G1_74_"));
        assert!(!identity.matches_filter("G1_75_"));
    }
}
