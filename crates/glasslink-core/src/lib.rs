//! Glasslink Core
//!
//! Hardware-independent building blocks for talking to a pair of smart-glasses
//! arms that act as one logical device. Nothing in this crate touches a radio or
//! a socket; the BLE and cloud crates drive these types from their own tasks.
//!
//! - [`protocol`] - command identifiers, frame chunking, command builders and
//!   notification decoding
//! - [`command`] - the immutable [`BufferedCommand`] handed to the command queue
//! - [`readiness`] - the per-side initialization state machine
//! - [`telemetry`] - the battery/case/head-position snapshot
//! - [`schedule`] - cancellable repeating tasks used for timers

pub mod command;
pub mod errors;
pub mod protocol;
pub mod readiness;
pub mod schedule;
pub mod telemetry;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use command::{BufferedCommand, SideTarget};
pub use errors::{GlasslinkError, Result};
pub use protocol::notification::{decode_notification, AckOutcome, DeviceEvent, DeviceOrder};
pub use readiness::{Readiness, ReadinessMachine, ReadinessTransition};
pub use schedule::RepeatingTask;
pub use telemetry::GlassesTelemetry;
pub use types::{FrameColor, FrameStyle, GlassesInfo, LinkStatus, Side, SideIdentity};
