//! Glasses to cloud bridge
//!
//! Routes device events to the relay and relay requests to the device. The
//! cloud session keeps the latest battery and connection state in its
//! snapshot, so a relay reconnect resends them without help from here.

use std::future::Future;
use std::sync::Arc;

use glasslink_ble::{BleResult, GlassesController, GlassesEvent, GlassesStatus};
use glasslink_cloud::{CloudError, CloudResult, CloudSession, DisplayLayout, InboundMessage};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::error::Result;

// ----------------------------------------------------------------------------
// Device Seam
// ----------------------------------------------------------------------------

/// The part of the glasses the bridge drives
pub trait GlassesSurface: Send + Sync {
    fn status(&self) -> GlassesStatus;
    fn send_text(&self, text: &str) -> BleResult<()>;
    fn send_double_text_wall(&self, top: &str, bottom: &str) -> BleResult<()>;
    fn send_reference_card(&self, title: &str, body: &str) -> BleResult<()>;
    fn set_mic_enabled(&self, enabled: bool) -> BleResult<()>;
}

impl GlassesSurface for GlassesController {
    fn status(&self) -> GlassesStatus {
        GlassesController::status(self)
    }

    fn send_text(&self, text: &str) -> BleResult<()> {
        GlassesController::send_text(self, text)
    }

    fn send_double_text_wall(&self, top: &str, bottom: &str) -> BleResult<()> {
        GlassesController::send_double_text_wall(self, top, bottom)
    }

    fn send_reference_card(&self, title: &str, body: &str) -> BleResult<()> {
        GlassesController::send_reference_card(self, title, body)
    }

    fn set_mic_enabled(&self, enabled: bool) -> BleResult<()> {
        GlassesController::set_mic_enabled(self, enabled)
    }
}

impl<G: GlassesSurface + ?Sized> GlassesSurface for Arc<G> {
    fn status(&self) -> GlassesStatus {
        (**self).status()
    }

    fn send_text(&self, text: &str) -> BleResult<()> {
        (**self).send_text(text)
    }

    fn send_double_text_wall(&self, top: &str, bottom: &str) -> BleResult<()> {
        (**self).send_double_text_wall(top, bottom)
    }

    fn send_reference_card(&self, title: &str, body: &str) -> BleResult<()> {
        (**self).send_reference_card(title, body)
    }

    fn set_mic_enabled(&self, enabled: bool) -> BleResult<()> {
        (**self).set_mic_enabled(enabled)
    }
}

// ----------------------------------------------------------------------------
// Bridge
// ----------------------------------------------------------------------------

pub struct Bridge<G> {
    glasses: G,
    cloud: CloudSession,
}

impl<G: GlassesSurface> Bridge<G> {
    pub fn new(glasses: G, cloud: CloudSession) -> Self {
        Self { glasses, cloud }
    }

    /// Forward events both ways until `shutdown` resolves or the glasses stop
    pub async fn run(
        &self,
        mut glasses_events: broadcast::Receiver<GlassesEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let mut inbound = self.cloud.subscribe();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = glasses_events.recv() => match event {
                    Ok(event) => self.on_glasses_event(event),
                    Err(RecvError::Lagged(skipped)) => warn!("Bridge missed {} glasses events", skipped),
                    Err(RecvError::Closed) => {
                        info!("Glasses controller stopped");
                        break;
                    }
                },
                message = inbound.recv() => match message {
                    Ok(message) => self.on_cloud_message(message),
                    Err(RecvError::Lagged(skipped)) => warn!("Bridge missed {} cloud messages", skipped),
                    // Only happens once the session itself is gone
                    Err(RecvError::Closed) => break,
                },
                _ = &mut shutdown => {
                    info!("Bridge shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn on_glasses_event(&self, event: GlassesEvent) {
        match event {
            GlassesEvent::ReadinessChanged(ready) => {
                info!("Glasses {}", if ready { "ready" } else { "not ready" });
                report(self.cloud.send_connection_state(ready), "connection state");
            }
            GlassesEvent::TelemetryChanged(telemetry) => {
                let Some(level) = telemetry.combined_battery() else {
                    return;
                };
                let charging = telemetry.case_charging.unwrap_or(false);
                let unchanged = self
                    .cloud
                    .snapshot()
                    .battery
                    .map_or(false, |last| last.level == level && last.charging == charging);
                if !unchanged {
                    report(self.cloud.send_battery(level, charging), "battery");
                }
            }
            GlassesEvent::VoiceData { data, .. } => {
                if self.cloud.audio().push(data) {
                    debug!("Audio buffer full, dropped oldest frame");
                }
            }
            GlassesEvent::InfoDecoded(info) => {
                info!("Glasses identified: {}", info);
            }
            GlassesEvent::SideUnresponsive(side) => {
                warn!("{} arm did not acknowledge", side);
            }
            GlassesEvent::LinkStatusChanged { .. } | GlassesEvent::Order { .. } => {}
        }
    }

    pub fn on_cloud_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::MicrophoneStateChange { enabled } => {
                info!("Relay set microphone {}", if enabled { "on" } else { "off" });
                self.with_ready_glasses("microphone", |glasses| glasses.set_mic_enabled(enabled));
            }
            InboundMessage::DisplayEvent { layout, .. } => match layout {
                DisplayLayout::TextWall { text } => {
                    self.with_ready_glasses("text wall", |glasses| glasses.send_text(&text));
                }
                DisplayLayout::DoubleTextWall {
                    top_text,
                    bottom_text,
                } => {
                    self.with_ready_glasses("double text wall", |glasses| {
                        glasses.send_double_text_wall(&top_text, &bottom_text)
                    });
                }
                DisplayLayout::ReferenceCard { title, text } => {
                    self.with_ready_glasses("reference card", |glasses| {
                        glasses.send_reference_card(&title, &text)
                    });
                }
                DisplayLayout::Other => debug!("Unsupported display layout"),
            },
            InboundMessage::RequestSingle { data_type } if data_type == "battery" => {
                let status = self.glasses.status();
                match status.telemetry.combined_battery() {
                    Some(level) => {
                        let charging = status.telemetry.case_charging.unwrap_or(false);
                        report(self.cloud.send_battery(level, charging), "battery");
                    }
                    None => debug!("Battery requested before the glasses reported one"),
                }
            }
            InboundMessage::RequestSingle { data_type } => {
                debug!("Ignoring request for {:?}", data_type);
            }
            InboundMessage::Interim { text } => debug!("Transcript (interim): {}", text),
            InboundMessage::Final { text } => info!("Transcript: {}", text),
            InboundMessage::AppStarted { package_name } => info!("App started: {}", package_name),
            InboundMessage::AppStopped { package_name } => info!("App stopped: {}", package_name),
            InboundMessage::AuthError { message } | InboundMessage::ConnectionError { message } => {
                warn!(
                    "Relay rejected the session: {}",
                    message.as_deref().unwrap_or("no reason given")
                );
            }
            other => debug!("Relay message not bridged: {:?}", other),
        }
    }

    fn with_ready_glasses(&self, what: &str, action: impl FnOnce(&G) -> BleResult<()>) {
        if !self.glasses.status().readiness.is_ready() {
            debug!("Glasses not ready, dropping {}", what);
            return;
        }
        if let Err(e) = action(&self.glasses) {
            warn!("Failed to send {}: {}", what, e);
        }
    }
}

fn report(result: CloudResult<()>, what: &str) {
    match result {
        Ok(()) => debug!("Pushed {} to relay", what),
        // Kept in the snapshot and resent after the next handshake
        Err(CloudError::NotConnected) => debug!("Relay offline, {} deferred", what),
        Err(e) => warn!("Failed to push {}: {}", what, e),
    }
}
