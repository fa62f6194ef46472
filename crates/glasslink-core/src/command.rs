//! Outbound command model consumed by the command queue

use core::time::Duration;

use crate::types::Side;

// ----------------------------------------------------------------------------
// Side Targeting
// ----------------------------------------------------------------------------

/// Which arm(s) a command is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideTarget {
    Both,
    Only(Side),
}

impl SideTarget {
    /// Sides to address, in wire order
    pub fn sides(self) -> &'static [Side] {
        match self {
            SideTarget::Both => &Side::BOTH,
            SideTarget::Only(Side::Left) => &[Side::Left],
            SideTarget::Only(Side::Right) => &[Side::Right],
        }
    }
}

// ----------------------------------------------------------------------------
// Buffered Command
// ----------------------------------------------------------------------------

/// An ordered list of frames plus delivery options
///
/// Built once by a caller and moved into the queue; the dispatcher never mutates
/// it, so the frames a caller built are exactly the frames that hit the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedCommand {
    frames: Vec<Vec<u8>>,
    target: SideTarget,
    post_delay: Option<Duration>,
    ignore_ack: bool,
}

impl BufferedCommand {
    /// Command made of pre-chunked frames, addressed to both sides
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            target: SideTarget::Both,
            post_delay: None,
            ignore_ack: false,
        }
    }

    /// Command made of a single frame, addressed to both sides
    pub fn single(frame: Vec<u8>) -> Self {
        Self::new(vec![frame])
    }

    /// Restrict the command to one side
    pub fn to_side(mut self, side: Side) -> Self {
        self.target = SideTarget::Only(side);
        self
    }

    /// Pause after the command completes before the next one starts
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = Some(delay);
        self
    }

    /// Send without waiting for an acknowledgement
    pub fn ignoring_ack(mut self) -> Self {
        self.ignore_ack = true;
        self
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn target(&self) -> SideTarget {
        self.target
    }

    pub fn post_delay(&self) -> Option<Duration> {
        self.post_delay
    }

    pub fn ignores_ack(&self) -> bool {
        self.ignore_ack
    }

    /// Command identifier of the first frame, used for logging
    pub fn command_id(&self) -> Option<u8> {
        self.frames.first().and_then(|frame| frame.first()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
