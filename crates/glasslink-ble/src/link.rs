//! Connected arms and the frame writer over them

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Peripheral, PeripheralId};
use glasslink_core::{LinkStatus, Side, SideIdentity};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::dispatcher::LinkWriter;
use crate::error::{BleError, BleResult};

// ----------------------------------------------------------------------------
// Device Link
// ----------------------------------------------------------------------------

/// One connected arm
///
/// Owns the task forwarding its notifications; dropping the link stops it.
#[derive(Debug)]
pub struct DeviceLink {
    side: Side,
    identity: SideIdentity,
    peripheral: Peripheral,
    write_characteristic: Characteristic,
    status: LinkStatus,
    last_ack: Option<Instant>,
    forwarder: JoinHandle<()>,
}

impl DeviceLink {
    pub fn new(
        side: Side,
        identity: SideIdentity,
        peripheral: Peripheral,
        write_characteristic: Characteristic,
        forwarder: JoinHandle<()>,
    ) -> Self {
        Self {
            side,
            identity,
            peripheral,
            write_characteristic,
            status: LinkStatus::ServicesDiscovered,
            last_ack: None,
            forwarder,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn identity(&self) -> &SideIdentity {
        &self.identity
    }

    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    pub fn peripheral_id(&self) -> PeripheralId {
        self.peripheral.id()
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn last_ack(&self) -> Option<Instant> {
        self.last_ack
    }

    async fn write(&self, frame: &[u8]) -> BleResult<()> {
        self.peripheral
            .write(&self.write_characteristic, frame, WriteType::WithoutResponse)
            .await?;
        trace!("{} <- {}", self.side, hex::encode(frame));
        Ok(())
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

// ----------------------------------------------------------------------------
// Link Set
// ----------------------------------------------------------------------------

fn index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

/// Both arms' links, shared between the controller and the dispatcher
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: Arc<RwLock<[Option<DeviceLink>; 2]>>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a link, handing back the one it replaces
    pub async fn insert(&self, link: DeviceLink) -> Option<DeviceLink> {
        let mut links = self.links.write().await;
        links[index(link.side)].replace(link)
    }

    pub async fn remove(&self, side: Side) -> Option<DeviceLink> {
        self.links.write().await[index(side)].take()
    }

    /// Which side a peripheral belongs to, if it is one of ours
    pub async fn side_of(&self, id: &PeripheralId) -> Option<Side> {
        let links = self.links.read().await;
        links
            .iter()
            .flatten()
            .find(|link| link.peripheral_id() == *id)
            .map(|link| link.side)
    }

    pub async fn is_connected(&self, side: Side) -> bool {
        self.links.read().await[index(side)].is_some()
    }

    pub async fn set_status(&self, side: Side, status: LinkStatus) {
        if let Some(link) = self.links.write().await[index(side)].as_mut() {
            link.status = status;
        }
    }

    pub async fn mark_ack(&self, side: Side) {
        if let Some(link) = self.links.write().await[index(side)].as_mut() {
            link.last_ack = Some(Instant::now());
        }
    }
}

#[async_trait]
impl LinkWriter for LinkSet {
    async fn write(&self, side: Side, frame: &[u8]) -> BleResult<()> {
        let links = self.links.read().await;
        match &links[index(side)] {
            Some(link) => link.write(frame).await,
            None => Err(BleError::LinkNotConnected(side)),
        }
    }
}
