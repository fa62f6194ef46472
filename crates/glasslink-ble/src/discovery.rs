//! Adapter access, scanning, and advertisement inspection

use std::collections::HashSet;
use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use glasslink_core::protocol::serial::extract_serial;
use glasslink_core::{Side, SideIdentity};
use tracing::{debug, info};

use crate::config::BleConfig;
use crate::error::{BleError, BleResult};
use crate::protocol::match_advertised_name;

pub type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// An advertising arm that matched our name prefix and filter
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub side: Side,
    pub peripheral: Peripheral,
    pub identity: SideIdentity,
    /// Serial number carried in manufacturer data, if any
    pub serial: Option<String>,
}

/// Stable key used to remember a peripheral across runs
pub fn peripheral_address(id: &PeripheralId) -> String {
    format!("{:?}", id)
}

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

pub struct Scanner {
    adapter: Adapter,
    device_name_prefix: String,
}

impl Scanner {
    /// Open the first available adapter
    pub async fn new(config: &BleConfig) -> BleResult<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::AdapterNotAvailable)?;
        info!("BLE adapter initialized");

        Ok(Self {
            adapter,
            device_name_prefix: config.device_name_prefix.clone(),
        })
    }

    pub async fn events(&self) -> BleResult<CentralEvents> {
        Ok(self.adapter.events().await?)
    }

    /// Arms do not reliably advertise their service, so scan unfiltered and
    /// match on the name instead
    pub async fn start_scan(&self) -> BleResult<()> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!("Scanning for glasses");
        Ok(())
    }

    pub async fn stop_scan(&self) -> BleResult<()> {
        self.adapter.stop_scan().await?;
        debug!("Stopped scanning");
        Ok(())
    }

    /// Find a remembered peripheral among those the adapter already knows
    pub async fn resolve(&self, identity: &SideIdentity) -> Option<Peripheral> {
        let peripherals = match self.adapter.peripherals().await {
            Ok(peripherals) => peripherals,
            Err(e) => {
                debug!("Failed to list known peripherals: {}", e);
                return None;
            }
        };
        let found = peripherals
            .into_iter()
            .find(|p| peripheral_address(&p.id()) == identity.address);
        if found.is_some() {
            debug!("Resolved remembered peripheral {}", identity.name);
        }
        found
    }

    /// Inspect a discovered peripheral and keep it if it is one of our arms
    pub async fn inspect(&self, id: &PeripheralId, filter: Option<&str>) -> Option<Advertisement> {
        let peripheral = self.adapter.peripheral(id).await.ok()?;
        let properties = peripheral.properties().await.ok()??;
        let name = properties.local_name?;
        let side = match_advertised_name(&name, &self.device_name_prefix, filter)?;

        let serial = properties
            .manufacturer_data
            .values()
            .find_map(|data| extract_serial(data));

        Some(Advertisement {
            side,
            identity: SideIdentity::new(peripheral_address(id), name),
            peripheral,
            serial,
        })
    }

    /// Scan for `window` and collect every distinct arm that advertises
    pub async fn survey(&self, window: Duration, filter: Option<&str>) -> BleResult<Vec<Advertisement>> {
        let mut events = self.events().await?;
        self.start_scan().await?;

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDiscovered(id)) => {
                        if !seen.insert(peripheral_address(&id)) {
                            continue;
                        }
                        if let Some(advertisement) = self.inspect(&id, filter).await {
                            debug!("Survey found {}", advertisement.identity.name);
                            found.push(advertisement);
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        self.stop_scan().await?;
        Ok(found)
    }
}
