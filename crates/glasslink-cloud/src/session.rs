//! Cloud relay session
//!
//! [`CloudSession`] owns the single WebSocket to the relay. Each successful
//! open gets a new generation number; tasks belonging to an older generation
//! are ignored when they report the link down, so a late close from a
//! replaced socket can never tear down its successor.
//!
//! Lifecycle:
//!
//! 1. `connect` opens the socket and, after the settle delay, sends
//!    `connection_init` followed by the calendar and location snapshot.
//! 2. `connection_ack` starts the audio sender and resets the attempt counter.
//! 3. A close or transport error stops the audio sender at once and starts the
//!    reconnect loop: open, wait a fixed time, check liveness, repeat.
//! 4. `auth_error` or `connection_error` from the relay halts reconnection
//!    until `connect` is called again.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use glasslink_core::RepeatingTask;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioFrameQueue, AudioSender, AudioSink};
use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::message::{CalendarEntry, GlassesLinkState, InboundMessage, OutboundMessage};
use crate::snapshot::{BatteryReport, DeviceSnapshot, Location};

const INBOUND_CAPACITY: usize = 64;

// ----------------------------------------------------------------------------
// Status
// ----------------------------------------------------------------------------

/// Connection status of the session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Relay rejected the session or the transport failed
    Error(String),
}

#[derive(Debug, Clone, Default)]
struct Credentials {
    server_url: String,
    core_token: Option<String>,
}

struct SocketTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    handshake: JoinHandle<()>,
}

impl SocketTasks {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
        self.handshake.abort();
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Handle to the cloud session. Cheap to clone.
#[derive(Clone)]
pub struct CloudSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: CloudConfig,
    credentials: Mutex<Credentials>,
    status: watch::Sender<SessionStatus>,
    inbound: broadcast::Sender<InboundMessage>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    generation: AtomicU64,
    halted: AtomicBool,
    reconnecting: AtomicBool,
    reconnect_attempts: AtomicU32,
    snapshot: Mutex<DeviceSnapshot>,
    audio: Arc<AudioFrameQueue>,
    audio_sender: Mutex<Option<AudioSender>>,
    socket: Mutex<Option<SocketTasks>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    pushes: Mutex<Vec<RepeatingTask>>,
}

impl CloudSession {
    /// Create a disconnected session. Nothing is spawned until `connect`.
    pub fn new(config: CloudConfig) -> Self {
        let (status, _) = watch::channel(SessionStatus::Disconnected);
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let credentials = Credentials {
            server_url: config.server_url.clone(),
            core_token: config.core_token.clone(),
        };
        let audio = Arc::new(AudioFrameQueue::new(config.audio_buffer_capacity));

        Self {
            inner: Arc::new(SessionInner {
                config,
                credentials: Mutex::new(credentials),
                status,
                inbound,
                outbound: Mutex::new(None),
                generation: AtomicU64::new(0),
                halted: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                reconnect_attempts: AtomicU32::new(0),
                snapshot: Mutex::new(DeviceSnapshot::default()),
                audio,
                audio_sender: Mutex::new(None),
                socket: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                pushes: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------------
    // Credentials and lifecycle
    // ------------------------------------------------------------------------

    pub fn set_server_url(&self, url: &str) -> CloudResult<()> {
        check_url(url)?;
        self.inner.credentials.lock().server_url = url.to_string();
        Ok(())
    }

    pub fn set_auth_token(&self, token: impl Into<String>) {
        self.inner.credentials.lock().core_token = Some(token.into());
    }

    /// Store the credentials and open the socket
    pub async fn connect(&self, url: &str, token: impl Into<String>) -> CloudResult<()> {
        check_url(url)?;
        {
            let mut credentials = self.inner.credentials.lock();
            credentials.server_url = url.to_string();
            credentials.core_token = Some(token.into());
        }
        self.start().await
    }

    /// Open the socket with the stored credentials.
    ///
    /// A transport failure is returned and the reconnect loop keeps trying in
    /// the background.
    pub async fn start(&self) -> CloudResult<()> {
        let inner = &self.inner;
        inner.config.validate().map_err(CloudError::InvalidConfig)?;
        if inner.credentials.lock().core_token.is_none() {
            return Err(CloudError::MissingToken);
        }
        inner.halted.store(false, Ordering::Release);
        inner.reconnect_attempts.store(0, Ordering::Release);
        inner.start_pushes();

        match inner.open().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Cloud connect failed: {}", e);
                inner.status.send_replace(SessionStatus::Error(e.to_string()));
                inner.spawn_reconnect();
                Err(e)
            }
        }
    }

    /// Close the socket and stop every background task
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.halted.store(true, Ordering::Release);
        inner.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = inner.reconnect_task.lock().take() {
            task.abort();
        }
        inner.reconnecting.store(false, Ordering::Release);
        inner.stop_audio_sender();
        inner.pushes.lock().clear();

        if let Some(tasks) = inner.socket.lock().take() {
            tasks.reader.abort();
            tasks.handshake.abort();
        }
        // The writer drains the close frame and exits once the channel drops
        if let Some(outbound) = inner.outbound.lock().take() {
            let _ = outbound.send(Message::Close(None));
        }
        inner.status.send_replace(SessionStatus::Disconnected);
        info!("Cloud session disconnected");
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Every decoded inbound message, including unknown types
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inner.inbound.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::Acquire)
    }

    /// Whether the audio sender loop is running
    pub fn is_audio_streaming(&self) -> bool {
        self.inner
            .audio_sender
            .lock()
            .as_ref()
            .map_or(false, |sender| !sender.is_finished())
    }

    /// Buffer fed by audio capture
    pub fn audio(&self) -> Arc<AudioFrameQueue> {
        self.inner.audio.clone()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner.snapshot.lock().clone()
    }

    /// Change the cached state without sending anything
    pub fn update_snapshot(&self, update: impl FnOnce(&mut DeviceSnapshot)) {
        update(&mut self.inner.snapshot.lock());
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    pub fn send(&self, message: &OutboundMessage) -> CloudResult<()> {
        self.inner.send(message)
    }

    /// Send one raw audio frame out of band
    pub fn send_binary(&self, frame: Vec<u8>) -> CloudResult<()> {
        self.inner.send_raw(Message::Binary(frame))
    }

    /// Replace the calendar and push the upcoming events
    pub fn send_calendar_events(&self, entries: Vec<CalendarEntry>) -> CloudResult<()> {
        self.inner.snapshot.lock().calendar = entries;
        self.inner.push_calendar()
    }

    pub fn send_location(&self, lat: f64, lng: f64) -> CloudResult<()> {
        self.inner.snapshot.lock().location = Some(Location { lat, lng });
        self.inner.push_location(None)
    }

    pub fn send_battery(&self, level: u8, charging: bool) -> CloudResult<()> {
        self.inner.snapshot.lock().battery = Some(BatteryReport { level, charging });
        self.inner.push_battery()
    }

    pub fn send_connection_state(&self, glasses_connected: bool) -> CloudResult<()> {
        self.inner.snapshot.lock().glasses_connected = glasses_connected;
        self.inner.push_connection_state()
    }

    pub fn send_datetime(&self) -> CloudResult<()> {
        self.inner.send(&OutboundMessage::datetime(Utc::now()))
    }
}

// ----------------------------------------------------------------------------
// Socket lifecycle
// ----------------------------------------------------------------------------

impl SessionInner {
    fn is_connected(&self) -> bool {
        let live = *self.status.borrow() == SessionStatus::Connected;
        live && self.outbound.lock().is_some()
    }

    async fn open(self: &Arc<Self>) -> CloudResult<()> {
        let Credentials {
            server_url,
            core_token,
        } = self.credentials.lock().clone();
        let core_token = core_token.ok_or(CloudError::MissingToken)?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(old) = self.socket.lock().take() {
            old.abort();
        }
        self.outbound.lock().take();
        self.stop_audio_sender();
        self.status.send_replace(SessionStatus::Connecting);

        info!("Connecting to cloud relay at {}", server_url);
        let (stream, _) = connect_async(server_url.as_str()).await?;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Cloud socket superseded while connecting");
            return Ok(());
        }
        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.lock() = Some(outbound_tx);
        self.status.send_replace(SessionStatus::Connected);
        info!(generation, "Cloud socket open");

        let weak = Arc::downgrade(self);
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!("Cloud write failed: {}", e);
                    if let Some(inner) = weak.upgrade() {
                        inner.link_down(generation, "write failed");
                    }
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let weak = Arc::downgrade(self);
        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => match weak.upgrade() {
                        Some(inner) => inner.handle_text(&text),
                        None => return,
                    },
                    Some(Ok(Message::Close(_))) | None => break "closed by relay",
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Cloud read failed: {}", e);
                        break "transport error";
                    }
                }
            };
            if let Some(inner) = weak.upgrade() {
                inner.link_down(generation, reason);
            }
        });

        let weak = Arc::downgrade(self);
        let settle = self.config.settle_delay();
        let handshake = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Some(inner) = weak.upgrade() {
                inner.send_handshake(generation, core_token);
            }
        });

        *self.socket.lock() = Some(SocketTasks {
            reader,
            writer,
            handshake,
        });
        Ok(())
    }

    fn send_handshake(&self, generation: u64, core_token: String) {
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        if let Err(e) = self.send(&OutboundMessage::connection_init(core_token)) {
            warn!("Could not send connection_init: {}", e);
            return;
        }
        debug!("Sent connection_init");
        // Best effort: a failure here shows up as a link drop on its own
        let _ = self.push_calendar();
        let _ = self.push_location(None);
        let _ = self.push_battery();
        let _ = self.push_connection_state();
    }

    /// Tear down after a close or transport error on `generation`
    fn link_down(self: &Arc<Self>, generation: u64, reason: &str) {
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(generation, "Ignoring close of replaced cloud socket");
            return;
        }
        if self.outbound.lock().take().is_none() {
            return;
        }
        self.stop_audio_sender();
        info!("Cloud link down: {}", reason);

        if self.halted.load(Ordering::Acquire) {
            warn!("Relay rejected the session, not reconnecting");
            return;
        }
        self.status.send_replace(SessionStatus::Disconnected);
        self.spawn_reconnect();
    }

    fn spawn_reconnect(self: &Arc<Self>) {
        if self.halted.load(Ordering::Acquire) || self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = tokio::spawn(reconnect_loop(Arc::downgrade(self)));
        if let Some(previous) = self.reconnect_task.lock().replace(handle) {
            previous.abort();
        }
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    fn handle_text(self: &Arc<Self>, text: &str) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping cloud frame: {}", e);
                return;
            }
        };

        match &message {
            InboundMessage::ConnectionAck { .. } => {
                info!("Cloud session acknowledged");
                self.reconnect_attempts.store(0, Ordering::Release);
                self.start_audio_sender();
            }
            InboundMessage::AuthError { message: detail }
            | InboundMessage::ConnectionError { message: detail } => {
                let reason = detail.clone().unwrap_or_else(|| "rejected by relay".into());
                error!("Cloud session rejected: {}", reason);
                self.halted.store(true, Ordering::Release);
                self.stop_audio_sender();
                self.status.send_replace(SessionStatus::Error(reason));
            }
            InboundMessage::RequestSingleLocation { correlation_id, .. } => {
                if let Err(e) = self.push_location(correlation_id.clone()) {
                    debug!("Location request not answered: {}", e);
                }
            }
            _ => {}
        }

        // No subscribers is fine
        let _ = self.inbound.send(message);
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    fn send(&self, message: &OutboundMessage) -> CloudResult<()> {
        self.send_raw(Message::Text(message.to_json()?))
    }

    fn send_raw(&self, message: Message) -> CloudResult<()> {
        if *self.status.borrow() != SessionStatus::Connected {
            return Err(CloudError::NotConnected);
        }
        self.outbound
            .lock()
            .as_ref()
            .ok_or(CloudError::NotConnected)?
            .send(message)
            .map_err(|_| CloudError::NotConnected)
    }

    /// Queue one audio frame, returning it when the socket can not take it
    fn send_frame(&self, frame: Vec<u8>) -> Result<(), Vec<u8>> {
        if *self.status.borrow() != SessionStatus::Connected {
            return Err(frame);
        }
        let outbound = self.outbound.lock();
        let Some(outbound) = outbound.as_ref() else {
            return Err(frame);
        };
        outbound
            .send(Message::Binary(frame))
            .map_err(|rejected| rejected.0.into_data())
    }

    fn push_calendar(&self) -> CloudResult<()> {
        let events = self
            .snapshot
            .lock()
            .upcoming(Utc::now(), self.config.max_calendar_events);
        for entry in events {
            self.send(&OutboundMessage::calendar_event(entry))?;
        }
        Ok(())
    }

    fn push_location(&self, correlation_id: Option<String>) -> CloudResult<()> {
        let location = self.snapshot.lock().location;
        match location {
            Some(Location { lat, lng }) => {
                self.send(&OutboundMessage::location(lat, lng, correlation_id))
            }
            None => Ok(()),
        }
    }

    fn push_battery(&self) -> CloudResult<()> {
        let battery = self.snapshot.lock().battery;
        match battery {
            Some(BatteryReport { level, charging }) => {
                self.send(&OutboundMessage::battery(level, charging))
            }
            None => Ok(()),
        }
    }

    fn push_connection_state(&self) -> CloudResult<()> {
        let state = if self.snapshot.lock().glasses_connected {
            GlassesLinkState::Connected
        } else {
            GlassesLinkState::Disconnected
        };
        self.send(&OutboundMessage::connection_state(
            self.config.model_name.clone(),
            state,
        ))
    }

    // ------------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------------

    fn start_audio_sender(self: &Arc<Self>) {
        let mut slot = self.audio_sender.lock();
        if slot.as_ref().map_or(false, |sender| !sender.is_finished()) {
            return;
        }
        *slot = Some(AudioSender::spawn(
            self.audio.clone(),
            SessionAudioSink(Arc::downgrade(self)),
            self.config.audio_poll_interval(),
        ));
    }

    fn stop_audio_sender(&self) {
        if let Some(sender) = self.audio_sender.lock().take() {
            sender.stop();
            debug!("Audio sender stopping");
        }
    }

    /// Calendar and date/time pushes, skipped while disconnected
    fn start_pushes(self: &Arc<Self>) {
        let mut pushes = self.pushes.lock();
        if !pushes.is_empty() {
            return;
        }

        let weak = Arc::downgrade(self);
        pushes.push(RepeatingTask::spawn(
            self.config.calendar_push_interval(),
            false,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        if inner.is_connected() {
                            let _ = inner.push_calendar();
                        } else {
                            debug!("Skipping calendar push while disconnected");
                        }
                    }
                }
            },
        ));

        let weak = Arc::downgrade(self);
        pushes.push(RepeatingTask::spawn(
            self.config.datetime_push_interval(),
            false,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        if inner.is_connected() {
                            let _ = inner.send(&OutboundMessage::datetime(Utc::now()));
                        } else {
                            debug!("Skipping datetime push while disconnected");
                        }
                    }
                }
            },
        ));
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(tasks) = self.socket.get_mut().take() {
            tasks.abort();
        }
        if let Some(task) = self.reconnect_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Retry until the socket is live again or the session is halted or dropped
async fn reconnect_loop(session: Weak<SessionInner>) {
    loop {
        let Some(inner) = session.upgrade() else {
            return;
        };
        if inner.halted.load(Ordering::Acquire) {
            inner.reconnecting.store(false, Ordering::Release);
            return;
        }
        let attempt = inner.reconnect_attempts.fetch_add(1, Ordering::AcqRel) + 1;
        info!(attempt, "Reconnecting to cloud relay");
        if let Err(e) = inner.open().await {
            warn!(attempt, "Cloud reconnect failed: {}", e);
            if !inner.halted.load(Ordering::Acquire) {
                inner.status.send_replace(SessionStatus::Error(e.to_string()));
            }
        }
        let wait = inner.config.reconnect_wait();
        drop(inner);

        tokio::time::sleep(wait).await;

        let Some(inner) = session.upgrade() else {
            return;
        };
        if inner.is_connected() {
            inner.reconnecting.store(false, Ordering::Release);
            // A drop after this point starts a fresh loop through link_down
            if inner.is_connected() || inner.reconnecting.swap(true, Ordering::AcqRel) {
                return;
            }
        }
    }
}

struct SessionAudioSink(Weak<SessionInner>);

impl AudioSink for SessionAudioSink {
    fn is_connected(&self) -> bool {
        self.0.upgrade().map_or(false, |inner| inner.is_connected())
    }

    fn send_audio(&self, frame: Vec<u8>) -> Result<(), Vec<u8>> {
        match self.0.upgrade() {
            Some(inner) => inner.send_frame(frame),
            None => Err(frame),
        }
    }
}

fn check_url(url: &str) -> CloudResult<()> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => Ok(()),
        _ => Err(CloudError::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_check_url() {
        assert!(check_url("ws://localhost:8002/glasses-ws").is_ok());
        assert!(check_url("wss://relay.example.com/glasses-ws").is_ok());
        assert!(check_url("http://relay.example.com").is_err());
        assert!(check_url("relay").is_err());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_rejected() {
        let session = CloudSession::new(CloudConfig::default());
        assert!(matches!(
            session.send_battery(80, false),
            Err(CloudError::NotConnected)
        ));
        // Snapshot still updated for the next handshake
        assert_eq!(
            session.snapshot().battery,
            Some(BatteryReport {
                level: 80,
                charging: false
            })
        );
        assert_eq!(session.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_start_rejects_zero_push_interval() {
        let config = CloudConfig::default()
            .with_core_token("token")
            .with_push_intervals(Duration::from_secs(60), Duration::ZERO);
        let session = CloudSession::new(config);
        assert!(matches!(
            session.start().await,
            Err(CloudError::InvalidConfig(_))
        ));
        assert!(session.inner.pushes.lock().is_empty());
        assert_eq!(session.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_start_without_token() {
        let session = CloudSession::new(CloudConfig::default());
        assert!(matches!(session.start().await, Err(CloudError::MissingToken)));
    }
}
