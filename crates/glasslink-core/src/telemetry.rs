//! Glasses telemetry snapshot

use serde::{Deserialize, Serialize};

use crate::protocol::notification::{DeviceEvent, DeviceOrder};
use crate::types::{GlassesInfo, Side};

/// Latest known battery, case, and wear state
///
/// `None` means unknown. Everything but `info` is cleared whenever readiness
/// drops so a stale value is never reported as current.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlassesTelemetry {
    pub left_battery: Option<u8>,
    pub right_battery: Option<u8>,
    pub case_battery: Option<u8>,
    pub case_open: Option<bool>,
    pub case_removed: bool,
    pub case_charging: Option<bool>,
    pub head_up: Option<bool>,
    pub info: Option<GlassesInfo>,
}

impl GlassesTelemetry {
    /// Both arms' charge; the glasses are only as charged as the weaker arm
    pub fn combined_battery(&self) -> Option<u8> {
        match (self.left_battery, self.right_battery) {
            (Some(left), Some(right)) => Some(left.min(right)),
            _ => None,
        }
    }

    pub fn side_battery(&self, side: Side) -> Option<u8> {
        match side {
            Side::Left => self.left_battery,
            Side::Right => self.right_battery,
        }
    }

    /// Forget live readings, keeping the decoded glasses info
    pub fn clear_cached(&mut self) {
        self.left_battery = None;
        self.right_battery = None;
        self.case_battery = None;
        self.case_open = None;
        self.case_removed = false;
        self.case_charging = None;
        self.head_up = None;
    }

    /// Fold an event from `side` into the snapshot, reporting whether anything changed
    pub fn apply(&mut self, side: Side, event: &DeviceEvent) -> bool {
        let before = self.clone();
        match event {
            DeviceEvent::Battery { percent, .. } => match side {
                Side::Left => self.left_battery = Some(*percent),
                Side::Right => self.right_battery = Some(*percent),
            },
            DeviceEvent::Order(order) => match order {
                DeviceOrder::HeadUp => self.head_up = Some(true),
                DeviceOrder::HeadDown => self.head_up = Some(false),
                DeviceOrder::CaseOpen => {
                    self.case_open = Some(true);
                    self.case_removed = false;
                }
                DeviceOrder::CaseClosed => {
                    self.case_open = Some(false);
                    self.case_removed = false;
                }
                DeviceOrder::CaseRemoved => self.case_removed = true,
                DeviceOrder::CaseChargingStatus { charging } => {
                    self.case_charging = Some(*charging)
                }
                DeviceOrder::CaseChargeInfo { battery_percent } => {
                    self.case_battery = Some(*battery_percent)
                }
                _ => {}
            },
            DeviceEvent::Serial(serial) => {
                if let Some(info) = crate::protocol::serial::decode_serial(serial) {
                    self.info = Some(info);
                }
            }
            _ => {}
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery(percent: u8) -> DeviceEvent {
        DeviceEvent::Battery {
            percent,
            voltage: 400,
        }
    }

    #[test]
    fn test_combined_is_minimum() {
        let mut telemetry = GlassesTelemetry::default();
        telemetry.apply(Side::Left, &battery(80));
        assert_eq!(telemetry.combined_battery(), None);

        telemetry.apply(Side::Right, &battery(65));
        assert_eq!(telemetry.combined_battery(), Some(65));
    }

    #[test]
    fn test_clear_cached_resets_to_unknown() {
        let mut telemetry = GlassesTelemetry::default();
        telemetry.apply(Side::Left, &battery(80));
        telemetry.apply(Side::Right, &battery(90));
        telemetry.apply(
            Side::Left,
            &DeviceEvent::Order(DeviceOrder::CaseChargeInfo {
                battery_percent: 40,
            }),
        );
        telemetry.apply(Side::Right, &DeviceEvent::Order(DeviceOrder::CaseOpen));
        telemetry.apply(Side::Right, &DeviceEvent::Order(DeviceOrder::CaseRemoved));
        telemetry.apply(Side::Left, &DeviceEvent::Order(DeviceOrder::HeadUp));
        telemetry.apply(Side::Left, &DeviceEvent::Serial("S110LBA0200001".into()));

        telemetry.clear_cached();
        assert_eq!(telemetry.left_battery, None);
        assert_eq!(telemetry.case_battery, None);
        assert_eq!(telemetry.combined_battery(), None);
        assert_eq!(telemetry.case_open, None);
        assert!(!telemetry.case_removed);
        assert_eq!(telemetry.head_up, None);
        assert!(telemetry.info.is_some());
    }

    #[test]
    fn test_case_and_head_state() {
        let mut telemetry = GlassesTelemetry::default();
        assert!(telemetry.apply(Side::Right, &DeviceEvent::Order(DeviceOrder::CaseOpen)));
        assert_eq!(telemetry.case_open, Some(true));

        assert!(telemetry.apply(Side::Right, &DeviceEvent::Order(DeviceOrder::CaseRemoved)));
        assert!(telemetry.case_removed);

        assert!(telemetry.apply(Side::Left, &DeviceEvent::Order(DeviceOrder::HeadUp)));
        assert!(!telemetry.apply(Side::Left, &DeviceEvent::Order(DeviceOrder::HeadUp)));
        assert_eq!(telemetry.head_up, Some(true));
    }

    #[test]
    fn test_serial_reply_fills_info() {
        let mut telemetry = GlassesTelemetry::default();
        telemetry.apply(Side::Left, &DeviceEvent::Serial("S110LBA0200001".into()));
        assert_eq!(
            telemetry.info.map(|info| info.serial_number),
            Some("S110LBA0200001".to_string())
        );
    }
}
