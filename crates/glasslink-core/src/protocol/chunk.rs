//! Splitting a logical payload into link-sized frames
//!
//! ## Multi-frame layout
//!
//! ```text
//! [command_id: u8][total_frames: u8][frame_index: u8][sub_header ...][payload slice ...]
//! ```
//!
//! The sub-header is command specific (text frames carry display flags there)
//! and is repeated in every frame. Each frame is at most `max_frame_size` bytes.

use crate::errors::{GlasslinkError, Result};

/// Bytes taken by `[command_id, total_frames, frame_index]`
pub const MULTI_FRAME_HEADER_LEN: usize = 3;

/// Largest frame count the one-byte total field can express
pub const MAX_FRAMES: usize = u8::MAX as usize;

/// Split `payload` into frames tagged with `command_id`
///
/// An empty payload still produces one frame so the arm receives the command.
pub fn encode_chunks(
    command_id: u8,
    sub_header: &[u8],
    payload: &[u8],
    max_frame_size: usize,
) -> Result<Vec<Vec<u8>>> {
    let header_len = MULTI_FRAME_HEADER_LEN + sub_header.len();
    if max_frame_size <= header_len {
        return Err(GlasslinkError::FrameTooSmall {
            frame_size: max_frame_size,
            header_len,
        });
    }

    let slice_len = max_frame_size - header_len;
    let total = payload.len().div_ceil(slice_len).max(1);
    if total > MAX_FRAMES {
        return Err(GlasslinkError::PayloadTooLarge {
            frames: total,
            max: MAX_FRAMES,
        });
    }

    let frames = (0..total)
        .map(|index| {
            let start = index * slice_len;
            let end = (start + slice_len).min(payload.len());
            let slice = &payload[start.min(payload.len())..end];

            let mut frame = Vec::with_capacity(header_len + slice.len());
            frame.push(command_id);
            frame.push(total as u8);
            frame.push(index as u8);
            frame.extend_from_slice(sub_header);
            frame.extend_from_slice(slice);
            frame
        })
        .collect();

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_payload() {
        let frames = encode_chunks(0x4E, &[], b"hello", 20).unwrap();
        assert_eq!(frames, vec![vec![0x4E, 1, 0, b'h', b'e', b'l', b'l', b'o']]);
    }

    #[test]
    fn test_multi_frame_headers_and_sizes() {
        let payload: Vec<u8> = (0..50).collect();
        let frames = encode_chunks(0x04, &[0xAA], &payload, 14).unwrap();

        // 14 - 3 header - 1 sub-header = 10 payload bytes per frame
        assert_eq!(frames.len(), 5);
        for (index, frame) in frames.iter().enumerate() {
            assert!(frame.len() <= 14);
            assert_eq!(&frame[..4], &[0x04, 5, index as u8, 0xAA]);
        }

        let rebuilt: Vec<u8> = frames.iter().flat_map(|f| f[4..].to_vec()).collect();
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn test_last_frame_is_truncated() {
        let frames = encode_chunks(0x4E, &[], &[7u8; 25], 13).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].len(), MULTI_FRAME_HEADER_LEN + 5);
    }

    #[test]
    fn test_empty_payload_yields_header_frame() {
        let frames = encode_chunks(0x4E, &[1, 2], &[], 20).unwrap();
        assert_eq!(frames, vec![vec![0x4E, 1, 0, 1, 2]]);
    }

    #[test]
    fn test_frame_too_small() {
        let err = encode_chunks(0x4E, &[0; 5], b"x", 8).unwrap_err();
        assert!(matches!(err, GlasslinkError::FrameTooSmall { .. }));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; 300];
        let err = encode_chunks(0x4E, &[], &payload, 4).unwrap_err();
        assert_eq!(
            err,
            GlasslinkError::PayloadTooLarge {
                frames: 300,
                max: MAX_FRAMES
            }
        );
    }
}
