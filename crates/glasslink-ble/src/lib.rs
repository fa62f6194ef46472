//! Bluetooth Low Energy link for dual-arm smart glasses
//!
//! The glasses are two independent peripherals, one per arm. This crate treats
//! them as one logical device: it finds and connects both arms, serializes
//! commands through a single ordered queue with per-side acknowledgements, and
//! reconnects the pair whenever either arm drops.
//!
//! ## Architecture
//!
//! - [`config`] - link configuration and dispatcher timing
//! - [`error`] - error types specific to the BLE link
//! - [`protocol`] - GATT UUIDs and advertisement matching
//! - [`discovery`] - adapter access, scanning, and advertisement inspection
//! - [`connection`] - connecting, subscribing, and tearing down one arm
//! - [`link`] - connected arms and the frame writer over them
//! - [`ack`] - per-side acknowledgement signals
//! - [`dispatcher`] - the ordered command queue and its consumer
//! - [`state`] - link state and readiness, free of I/O
//! - [`pairing`] - persisted arm identities
//! - [`controller`] - the [`GlassesController`] handle and its task
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use glasslink_ble::{BleConfig, GlassesController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BleConfig::new().with_pairing_file("/tmp/glasses.json");
//! let glasses = GlassesController::start(config).await?;
//!
//! glasses.start_discovery()?;
//! glasses.wait_until_ready(Duration::from_secs(30)).await?;
//! glasses.send_text("Hello from glasslink")?;
//! # Ok(())
//! # }
//! ```

pub mod ack;
pub mod config;
pub mod connection;
pub mod controller;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod link;
pub mod pairing;
pub mod protocol;
pub mod state;

// Public API exports
pub use ack::AckSignals;
pub use config::{BleConfig, DispatchTiming};
pub use controller::GlassesController;
pub use dispatcher::{
    command_channel, CommandOutcome, CommandQueue, CommandReceiver, DispatchEvent, Dispatcher,
    LinkWriter, SideResult,
};
pub use error::{BleError, BleResult};
pub use events::{GlassesEvent, GlassesStatus};
pub use pairing::{PairingRecord, PairingStore};
pub use protocol::{
    UART_RX_CHARACTERISTIC_UUID, UART_SERVICE_UUID, UART_TX_CHARACTERISTIC_UUID,
};
pub use state::{DeviceState, StateEffect};
