//! Serial number extraction and decoding
//!
//! Serial numbers are 14 ASCII alphanumerics starting with `S`. The frame
//! style is encoded at index 2 and the color at index 5.

use tracing::debug;

use crate::types::{FrameColor, FrameStyle, GlassesInfo};

pub const SERIAL_LEN: usize = 14;

const STYLE_INDEX: usize = 2;
const COLOR_INDEX: usize = 5;

/// Find a serial number inside advertisement manufacturer data
pub fn extract_serial(manufacturer_data: &[u8]) -> Option<String> {
    let found = manufacturer_data
        .windows(SERIAL_LEN)
        .find(|window| window[0] == b'S' && window.iter().all(u8::is_ascii_alphanumeric))
        .map(|window| window.iter().map(|&b| b as char).collect());

    if found.is_none() {
        debug!(
            "No serial number in manufacturer data {}",
            hex::encode(manufacturer_data)
        );
    }
    found
}

/// Decode style and color from a serial number
pub fn decode_serial(serial: &str) -> Option<GlassesInfo> {
    let bytes = serial.as_bytes();
    if bytes.len() != SERIAL_LEN || !bytes.iter().all(u8::is_ascii_alphanumeric) {
        debug!("Serial number {:?} has an unexpected shape", serial);
        return None;
    }

    let style = match bytes[STYLE_INDEX] {
        b'0' => FrameStyle::Round,
        b'1' => FrameStyle::Rectangular,
        _ => FrameStyle::Unknown,
    };
    let color = match bytes[COLOR_INDEX] {
        b'A' => FrameColor::Grey,
        b'B' => FrameColor::Brown,
        b'C' => FrameColor::Green,
        _ => FrameColor::Unknown,
    };

    Some(GlassesInfo {
        serial_number: serial.to_string(),
        style,
        color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular_brown() {
        let info = decode_serial("S110LBA0200001").unwrap();
        assert_eq!(info.style, FrameStyle::Rectangular);
        assert_eq!(info.color, FrameColor::Brown);
    }

    #[test]
    fn test_round_grey_and_unknown() {
        let info = decode_serial("S100LAA0200001").unwrap();
        assert_eq!((info.style, info.color), (FrameStyle::Round, FrameColor::Grey));

        let info = decode_serial("S190LZA0200001").unwrap();
        assert_eq!(
            (info.style, info.color),
            (FrameStyle::Unknown, FrameColor::Unknown)
        );
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(decode_serial("S110LB").is_none());
        assert!(decode_serial("S110LBA0200001X").is_none());
        assert!(decode_serial("S110LB-0200001").is_none());
    }

    #[test]
    fn test_extract_from_manufacturer_data() {
        let mut data = vec![0x01, 0x02, 0x00];
        data.extend_from_slice(b"S120LCA0201234");
        data.push(0xFF);
        assert_eq!(extract_serial(&data), Some("S120LCA0201234".into()));
        assert_eq!(extract_serial(&[0x01, 0x02, 0x03]), None);
    }
}
