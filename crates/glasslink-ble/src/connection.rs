//! Establishing and tearing down a single arm's connection

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use glasslink_core::{Side, SideIdentity};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::BleConfig;
use crate::error::{BleError, BleResult};
use crate::link::DeviceLink;
use crate::protocol::{UART_RX_CHARACTERISTIC_UUID, UART_TX_CHARACTERISTIC_UUID};

/// Raw notifications from either arm, tagged with their side
pub type NotificationSender = mpsc::UnboundedSender<(Side, Vec<u8>)>;

// ----------------------------------------------------------------------------
// Connection Management
// ----------------------------------------------------------------------------

/// Connect, discover services, and subscribe to the arm's notifications
///
/// Notifications are forwarded to `notifications` until the link is dropped or
/// the peripheral goes away.
pub async fn establish(
    side: Side,
    peripheral: Peripheral,
    identity: SideIdentity,
    config: &BleConfig,
    notifications: NotificationSender,
) -> BleResult<DeviceLink> {
    if !peripheral.is_connected().await? {
        match timeout(config.connection_timeout(), peripheral.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                // Cancel the pending platform connect
                let _ = peripheral.disconnect().await;
                return Err(BleError::ConnectionTimeout { side });
            }
        }
    }
    info!("Connected to {} arm ({})", side, identity.name);

    peripheral.discover_services().await?;

    let characteristics = peripheral.characteristics();
    let find = |uuid: uuid::Uuid| {
        characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| BleError::CharacteristicNotFound {
                side,
                characteristic: uuid.to_string(),
            })
    };
    let tx_char = find(UART_TX_CHARACTERISTIC_UUID)?;
    let rx_char = find(UART_RX_CHARACTERISTIC_UUID)?;

    peripheral.subscribe(&rx_char).await?;
    let mut stream = peripheral.notifications().await?;

    let forwarder = tokio::spawn(async move {
        while let Some(notification) = stream.next().await {
            if notification.uuid != UART_RX_CHARACTERISTIC_UUID {
                continue;
            }
            if notifications.send((side, notification.value)).is_err() {
                break;
            }
        }
        debug!("Notification stream for {} arm ended", side);
    });

    Ok(DeviceLink::new(side, identity, peripheral, tx_char, forwarder))
}

/// Disconnect an arm; failures are logged since the link is gone either way
pub async fn tear_down(link: DeviceLink) {
    let side = link.side();
    if let Err(e) = link.peripheral().disconnect().await {
        warn!("Failed to disconnect {} arm: {}", side, e);
    }
    info!("Disconnected {} arm", side);
}
