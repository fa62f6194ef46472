//! Glasslink Cloud
//!
//! Persistent session with the cloud relay: one WebSocket carrying JSON
//! messages in both directions and raw audio frames upstream, recovered
//! automatically after transport failures.
//!
//! ```no_run
//! use glasslink_cloud::{CloudConfig, CloudSession, InboundMessage};
//!
//! # async fn demo() -> glasslink_cloud::CloudResult<()> {
//! let session = CloudSession::new(CloudConfig::default());
//! let mut inbound = session.subscribe();
//! session.connect("ws://localhost:8002/glasses-ws", "core-token").await?;
//!
//! // Capture code never blocks; the oldest frame is dropped when full
//! session.audio().push(vec![0u8; 320]);
//!
//! while let Ok(message) = inbound.recv().await {
//!     if let InboundMessage::DisplayEvent { layout, .. } = message {
//!         println!("display {:?}", layout);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod snapshot;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use audio::{AudioFrameQueue, AudioSender, AudioSink};
pub use config::CloudConfig;
pub use error::{CloudError, CloudResult};
pub use message::{CalendarEntry, DisplayLayout, GlassesLinkState, InboundMessage, OutboundMessage};
pub use session::{CloudSession, SessionStatus};
pub use snapshot::{BatteryReport, DeviceSnapshot, Location};
