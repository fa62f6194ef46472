//! glasslink CLI library
//!
//! Application root for the glasses: builds the device controller and the
//! cloud session explicitly, bridges their events, and exposes one-shot
//! commands for the control surface.

pub mod bridge;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use bridge::{Bridge, GlassesSurface};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
