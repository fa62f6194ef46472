//! GATT layout and advertisement matching for the glasses arms

use glasslink_core::Side;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// UART service both arms expose
pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the host writes command frames to
pub const UART_TX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the arm notifies replies and events on
pub const UART_RX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

// ----------------------------------------------------------------------------
// Advertisement Matching
// ----------------------------------------------------------------------------

/// Side of an advertised arm, if the name belongs to the glasses we are after
///
/// The name must start with `prefix`, contain `filter` when one is set, and
/// carry a side marker.
pub fn match_advertised_name(name: &str, prefix: &str, filter: Option<&str>) -> Option<Side> {
    if !name.starts_with(prefix) {
        return None;
    }
    if let Some(filter) = filter {
        if !filter.is_empty() && !name.contains(filter) {
            return None;
        }
    }
    Side::from_advertised_name(name)
}
