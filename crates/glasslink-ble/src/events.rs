//! Events published by the glasses controller

use glasslink_core::{DeviceOrder, GlassesInfo, GlassesTelemetry, LinkStatus, Readiness, Side};
use serde::{Deserialize, Serialize};

/// Everything observers of the glasses can react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlassesEvent {
    ReadinessChanged(bool),
    LinkStatusChanged { side: Side, status: LinkStatus },
    TelemetryChanged(GlassesTelemetry),
    Order { side: Side, order: DeviceOrder },
    VoiceData { side: Side, sequence: u8, data: Vec<u8> },
    InfoDecoded(GlassesInfo),
    SideUnresponsive(Side),
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlassesStatus {
    pub readiness: Readiness,
    pub left: LinkStatus,
    pub right: LinkStatus,
    pub telemetry: GlassesTelemetry,
}

impl GlassesStatus {
    pub fn link(&self, side: Side) -> LinkStatus {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}
