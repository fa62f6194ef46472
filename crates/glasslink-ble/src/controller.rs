//! Glasses controller: one logical device over two arms
//!
//! [`GlassesController`] is the handle callers hold. Behind it a single
//! controller task owns discovery, the links, pairing persistence, and the
//! timers; a separate dispatcher task drains the command queue. The two share
//! only the link set and the acknowledgement signals.
//!
//! ```text
//!   handle ──control──▶ controller task ◀── central events / notifications
//!     │                    │    ▲
//!     └──commands──▶ dispatcher ┘ (unresponsive sides)
//! ```

use std::sync::Arc;
use std::time::Duration;

use btleplug::api::CentralEvent;
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use glasslink_core::protocol::serial::decode_serial;
use glasslink_core::protocol::{commands, layout};
use glasslink_core::{decode_notification, DeviceEvent, RepeatingTask, Side, SideIdentity};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::ack::AckSignals;
use crate::config::BleConfig;
use crate::connection::{self, NotificationSender};
use crate::discovery::{CentralEvents, Scanner};
use crate::dispatcher::{command_channel, CommandQueue, DispatchEvent, Dispatcher};
use crate::error::{BleError, BleResult};
use crate::events::{GlassesEvent, GlassesStatus};
use crate::link::{DeviceLink, LinkSet};
use crate::pairing::{PairingRecord, PairingStore};
use crate::state::{DeviceState, StateEffect};

const EVENT_CAPACITY: usize = 256;

enum Control {
    SetSearchFilter(Option<String>),
    StartDiscovery,
    Disconnect,
    Forget,
    Shutdown(oneshot::Sender<()>),
}

enum ConnectAttempt {
    Established(DeviceLink),
    Failed(Side, BleError),
}

// ----------------------------------------------------------------------------
// Controller Handle
// ----------------------------------------------------------------------------

/// Handle to the glasses; commands are queued and never block the caller
pub struct GlassesController {
    control: mpsc::UnboundedSender<Control>,
    queue: CommandQueue,
    events: broadcast::Sender<GlassesEvent>,
    status: watch::Receiver<GlassesStatus>,
    max_frame_size: usize,
    task: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl GlassesController {
    /// Open the adapter and start the controller and dispatcher tasks
    ///
    /// Nothing connects until [`start_discovery`](Self::start_discovery).
    pub async fn start(config: BleConfig) -> BleResult<Self> {
        config.validate().map_err(BleError::InvalidConfig)?;
        let scanner = Scanner::new(&config).await?;
        let central_events = scanner.events().await?;

        let pairing = PairingStore::new(config.pairing_file.clone());
        let mut record = pairing.load()?;
        if config.search_filter.is_some() && config.search_filter != record.search_filter {
            record.set_search_filter(config.search_filter.clone());
            pairing.save(&record)?;
        }

        let links = LinkSet::new();
        let acks = Arc::new(AckSignals::new());
        let (queue, receiver) = command_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            links.clone(),
            acks.clone(),
            config.dispatch_timing(),
            dispatch_tx,
        );
        let dispatcher = tokio::spawn(dispatcher.run(receiver));

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status_tx, status) = watch::channel(GlassesStatus::default());
        let (control, control_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        let mut state = DeviceState::new();
        if let Some(info) = record.glasses.clone() {
            state.set_info(info);
        }

        let max_frame_size = config.max_frame_size;
        let task = ControllerTask {
            config,
            scanner,
            links,
            acks,
            queue: queue.clone(),
            pairing,
            record,
            state,
            events: events.clone(),
            status_tx,
            notify_tx,
            attempt_tx,
            tick_tx,
            reconnect: None,
            heartbeat: None,
            reconnect_attempts: 0,
            pending: [false; 2],
            active: false,
        };
        let inboxes = Inboxes {
            central: central_events,
            control: control_rx,
            dispatch: dispatch_rx,
            notifications: notify_rx,
            attempts: attempt_rx,
            ticks: tick_rx,
        };
        let task = tokio::spawn(task.run(inboxes));

        Ok(Self {
            control,
            queue,
            events,
            status,
            max_frame_size,
            task,
            dispatcher,
        })
    }

    fn send_control(&self, message: Control) -> BleResult<()> {
        self.control
            .send(message)
            .map_err(|_| BleError::ControllerStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GlassesEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> GlassesStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<GlassesStatus> {
        self.status.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.status.borrow().readiness.is_ready()
    }

    /// Wait until both arms are initialized
    pub async fn wait_until_ready(&self, limit: Duration) -> BleResult<()> {
        let mut status = self.status.clone();
        let result = match timeout(limit, status.wait_for(|s| s.readiness.is_ready())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(BleError::ControllerStopped),
            Err(_) => Err(BleError::NotReady(limit)),
        };
        result
    }

    /// Pick one pair among several; identities from another filter are forgotten
    pub fn set_search_filter(&self, filter: Option<String>) -> BleResult<()> {
        self.send_control(Control::SetSearchFilter(filter))
    }

    /// Reconnect remembered arms, falling back to a scan
    pub fn start_discovery(&self) -> BleResult<()> {
        self.send_control(Control::StartDiscovery)
    }

    pub fn disconnect(&self) -> BleResult<()> {
        self.send_control(Control::Disconnect)
    }

    /// Disconnect and drop the remembered pairing
    pub fn forget(&self) -> BleResult<()> {
        self.send_control(Control::Forget)
    }

    /// Raw access for callers building their own commands
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    // ------------------------------------------------------------------------
    // Control Surface
    // ------------------------------------------------------------------------

    pub fn send_text(&self, text: &str) -> BleResult<()> {
        let command = commands::text(&layout::text_wall(text), self.max_frame_size)?;
        self.queue.enqueue(command)
    }

    pub fn send_double_text_wall(&self, left: &str, right: &str) -> BleResult<()> {
        let command = commands::text(&layout::double_text_wall(left, right), self.max_frame_size)?;
        self.queue.enqueue(command)
    }

    pub fn send_reference_card(&self, title: &str, body: &str) -> BleResult<()> {
        let command = commands::text(&layout::reference_card(title, body), self.max_frame_size)?;
        self.queue.enqueue(command)
    }

    pub fn set_brightness(&self, percent: u8, auto: bool) -> BleResult<()> {
        self.queue.enqueue(commands::brightness(percent, auto)?)
    }

    pub fn set_head_up_angle(&self, degrees: u8) -> BleResult<()> {
        self.queue.enqueue(commands::head_up_angle(degrees)?)
    }

    pub fn set_dashboard_position(&self, height: u8, depth: u8) -> BleResult<()> {
        self.queue
            .enqueue(commands::dashboard_position(height, depth)?)
    }

    pub fn set_mic_enabled(&self, enabled: bool) -> BleResult<()> {
        self.queue.enqueue(commands::mic(enabled))
    }

    pub fn query_battery(&self) -> BleResult<()> {
        self.queue.enqueue(commands::battery_query())
    }

    pub fn query_serial(&self) -> BleResult<()> {
        self.queue.enqueue(commands::serial_query())
    }

    pub fn exit(&self) -> BleResult<()> {
        self.queue.enqueue(commands::exit())
    }

    /// Disconnect both arms and stop all tasks
    pub async fn shutdown(self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.control.send(Control::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        let _ = self.task.await;
        self.dispatcher.abort();
    }
}

// ----------------------------------------------------------------------------
// Controller Task
// ----------------------------------------------------------------------------

struct Inboxes {
    central: CentralEvents,
    control: mpsc::UnboundedReceiver<Control>,
    dispatch: mpsc::UnboundedReceiver<DispatchEvent>,
    notifications: mpsc::UnboundedReceiver<(Side, Vec<u8>)>,
    attempts: mpsc::UnboundedReceiver<ConnectAttempt>,
    ticks: mpsc::UnboundedReceiver<()>,
}

struct ControllerTask {
    config: BleConfig,
    scanner: Scanner,
    links: LinkSet,
    acks: Arc<AckSignals>,
    queue: CommandQueue,
    pairing: PairingStore,
    record: PairingRecord,
    state: DeviceState,
    events: broadcast::Sender<GlassesEvent>,
    status_tx: watch::Sender<GlassesStatus>,
    notify_tx: NotificationSender,
    attempt_tx: mpsc::UnboundedSender<ConnectAttempt>,
    tick_tx: mpsc::UnboundedSender<()>,
    reconnect: Option<RepeatingTask>,
    heartbeat: Option<RepeatingTask>,
    reconnect_attempts: u64,
    /// Connection attempt in flight, per side
    pending: [bool; 2],
    /// Discovery requested and not since disconnected
    active: bool,
}

fn index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

impl ControllerTask {
    async fn run(mut self, mut inboxes: Inboxes) {
        info!("Glasses controller started");

        loop {
            tokio::select! {
                message = inboxes.control.recv() => match message {
                    Some(Control::Shutdown(done)) => {
                        self.stop().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(message) => self.handle_control(message).await,
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                Some(event) = inboxes.central.next() => self.handle_central(event).await,
                Some((side, data)) = inboxes.notifications.recv() => {
                    self.handle_notification(side, &data).await;
                }
                Some(DispatchEvent::SideUnresponsive(side)) = inboxes.dispatch.recv() => {
                    let effects = self.state.side_unresponsive(side);
                    self.apply(effects).await;
                }
                Some(attempt) = inboxes.attempts.recv() => self.handle_attempt(attempt).await,
                Some(()) = inboxes.ticks.recv() => self.reconnect_tick().await,
            }
        }

        info!("Glasses controller stopped");
    }

    async fn handle_control(&mut self, message: Control) {
        match message {
            Control::SetSearchFilter(filter) => {
                info!("Search filter set to {:?}", filter);
                self.record.set_search_filter(filter);
                self.persist();
            }
            Control::StartDiscovery => {
                self.active = true;
                self.discover().await;
            }
            Control::Disconnect => self.stop().await,
            Control::Forget => {
                self.stop().await;
                self.record.forget();
                self.persist();
                info!("Forgot paired glasses");
            }
            Control::Shutdown(_) => {}
        }
    }

    /// Disconnect both arms and halt the timers, keeping the pairing
    async fn stop(&mut self) {
        self.active = false;
        self.reconnect = None;
        self.heartbeat = None;
        if let Err(e) = self.scanner.stop_scan().await {
            debug!("Failed to stop scan: {}", e);
        }
        for side in Side::BOTH {
            self.tear_down(side).await;
        }
        let effects = self.state.reset();
        self.apply(effects).await;
    }

    fn is_busy(&self, side: Side) -> bool {
        self.pending[index(side)] || self.state.link_status(side).is_connected()
    }

    fn search_filter(&self) -> Option<String> {
        self.record
            .search_filter
            .clone()
            .or_else(|| self.config.search_filter.clone())
    }

    fn persist(&self) {
        if let Err(e) = self.pairing.save(&self.record) {
            warn!("{}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Discovery and Connection
    // ------------------------------------------------------------------------

    /// Connect remembered arms directly; scan for whatever is left
    async fn discover(&mut self) {
        let mut covered = 0;
        for side in Side::BOTH {
            if self.is_busy(side) || self.connect_remembered(side).await {
                covered += 1;
            }
        }
        if covered < Side::BOTH.len() {
            if let Err(e) = self.scanner.start_scan().await {
                error!("Failed to start scan: {}", e);
            }
        }
    }

    async fn connect_remembered(&mut self, side: Side) -> bool {
        let Some(identity) = self.record.identity(side).cloned() else {
            return false;
        };
        match self.scanner.resolve(&identity).await {
            Some(peripheral) => {
                self.spawn_connect(side, peripheral, identity).await;
                true
            }
            None => false,
        }
    }

    async fn spawn_connect(&mut self, side: Side, peripheral: Peripheral, identity: SideIdentity) {
        self.pending[index(side)] = true;
        let effects = self.state.link_connecting(side);
        self.apply(effects).await;

        let config = self.config.clone();
        let notifications = self.notify_tx.clone();
        let attempts = self.attempt_tx.clone();
        tokio::spawn(async move {
            let attempt =
                match connection::establish(side, peripheral, identity, &config, notifications).await {
                    Ok(link) => ConnectAttempt::Established(link),
                    Err(e) => ConnectAttempt::Failed(side, e),
                };
            let _ = attempts.send(attempt);
        });
    }

    async fn handle_attempt(&mut self, attempt: ConnectAttempt) {
        match attempt {
            ConnectAttempt::Established(link) => {
                let side = link.side();
                self.pending[index(side)] = false;
                if !self.active {
                    connection::tear_down(link).await;
                    return;
                }
                if let Some(previous) = self.links.insert(link).await {
                    connection::tear_down(previous).await;
                }
                let effects = self.state.link_established(side);
                self.apply(effects).await;

                if Side::BOTH.iter().all(|s| self.state.link_status(*s).is_connected()) {
                    if let Err(e) = self.scanner.stop_scan().await {
                        debug!("Failed to stop scan: {}", e);
                    }
                }
            }
            ConnectAttempt::Failed(side, e) => {
                self.pending[index(side)] = false;
                warn!("Connection to {} arm failed: {}", side, e);
                if self.active {
                    let effects = self.state.link_failed(side);
                    self.apply(effects).await;
                }
            }
        }
    }

    async fn handle_central(&mut self, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                if !self.active {
                    return;
                }
                let filter = self.search_filter();
                let Some(advert) = self.scanner.inspect(&id, filter.as_deref()).await else {
                    return;
                };
                if self.is_busy(advert.side) {
                    return;
                }
                info!("Found {} arm {}", advert.side, advert.identity.name);

                if self.record.identity(advert.side) != Some(&advert.identity) {
                    self.record.set_identity(advert.side, advert.identity.clone());
                    self.persist();
                }
                if let Some(info) = advert.serial.as_deref().and_then(decode_serial) {
                    self.remember_info(info.clone());
                    let effects = self.state.set_info(info);
                    self.apply(effects).await;
                }

                self.spawn_connect(advert.side, advert.peripheral, advert.identity)
                    .await;

                let other = advert.side.other();
                if !self.is_busy(other) {
                    self.connect_remembered(other).await;
                }
            }
            CentralEvent::DeviceDisconnected(id) => {
                if let Some(side) = self.links.side_of(&id).await {
                    warn!("{} arm disconnected", side);
                    self.links.remove(side).await;
                    let mut effects = self.state.link_lost(side);
                    if !self.active {
                        effects.retain(|effect| *effect != StateEffect::StartReconnect);
                    }
                    self.apply(effects).await;
                }
            }
            _ => {}
        }
    }

    fn remember_info(&mut self, info: glasslink_core::GlassesInfo) {
        if self.record.glasses.as_ref() != Some(&info) {
            info!("Glasses {}", info);
            self.record.glasses = Some(info);
            self.persist();
        }
    }

    async fn tear_down(&mut self, side: Side) {
        if let Some(link) = self.links.remove(side).await {
            connection::tear_down(link).await;
        }
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    async fn handle_notification(&mut self, side: Side, data: &[u8]) {
        let Some(event) = decode_notification(data) else {
            return;
        };
        if let Some(outcome) = event.acknowledgement() {
            self.acks.release(side, outcome);
            self.links.mark_ack(side).await;
        }

        let effects = self.state.notification(side, &event);
        if let DeviceEvent::Serial(_) = event {
            if let Some(info) = self.state.status().telemetry.info.clone() {
                self.remember_info(info);
            }
        }
        self.apply(effects).await;

        let status = self.state.link_status(side);
        self.links.set_status(side, status).await;
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    async fn reconnect_tick(&mut self) {
        if self.state.is_ready() {
            info!("Glasses ready, stopping reconnect timer");
            self.reconnect = None;
            self.reconnect_attempts = 0;
            return;
        }
        self.reconnect_attempts += 1;
        info!("Reconnect attempt {}", self.reconnect_attempts);

        let mut needs_scan = false;
        for side in Side::BOTH {
            if self.pending[index(side)] {
                continue;
            }
            match self.state.link_status(side) {
                glasslink_core::LinkStatus::Initialized => {}
                glasslink_core::LinkStatus::ServicesDiscovered => {
                    // Linked but not initialized, repeat the handshake
                    let _ = self.queue.enqueue(commands::init(side));
                }
                _ => {
                    if !self.connect_remembered(side).await {
                        needs_scan = true;
                    }
                }
            }
        }
        if needs_scan {
            if let Err(e) = self.scanner.start_scan().await {
                error!("Failed to start scan: {}", e);
            }
        }
    }

    fn start_reconnect(&mut self) {
        if !self.active || self.reconnect.is_some() {
            return;
        }
        info!(
            "Starting reconnect timer every {:?}",
            self.config.reconnect_interval()
        );
        let ticks = self.tick_tx.clone();
        self.reconnect = Some(RepeatingTask::spawn(
            self.config.reconnect_interval(),
            true,
            move || {
                let _ = ticks.send(());
                async {}
            },
        ));
    }

    fn start_heartbeat(&mut self) {
        let queue = self.queue.clone();
        let mut sequence: u8 = 0;
        self.heartbeat = Some(RepeatingTask::spawn(
            self.config.heartbeat_interval(),
            false,
            move || {
                if queue.enqueue(commands::heartbeat(sequence)).is_err() {
                    debug!("Heartbeat skipped, queue closed");
                }
                sequence = sequence.wrapping_add(1);
                async {}
            },
        ));
    }

    async fn apply(&mut self, effects: Vec<StateEffect>) {
        for effect in effects {
            match effect {
                StateEffect::Enqueue(command) => {
                    if let Err(e) = self.queue.enqueue(command) {
                        error!("{}", e);
                    }
                }
                StateEffect::TearDown(side) => self.tear_down(side).await,
                StateEffect::ResetAcks => self.acks.reset_all(),
                StateEffect::StartReconnect => self.start_reconnect(),
                StateEffect::StopReconnect => {
                    self.reconnect = None;
                    self.reconnect_attempts = 0;
                }
                StateEffect::StartHeartbeat => self.start_heartbeat(),
                StateEffect::StopHeartbeat => self.heartbeat = None,
                StateEffect::Publish(event) => {
                    // No subscribers is fine
                    let _ = self.events.send(event);
                }
            }
        }
        self.status_tx.send_replace(self.state.status().clone());
    }
}
