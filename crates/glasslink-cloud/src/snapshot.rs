//! Latest device-side state mirrored to the relay
//!
//! The session resends this after every handshake and on the periodic pushes,
//! so callers only update it and never have to remember what was sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::CalendarEntry;

/// Last known phone location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Last known glasses battery report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryReport {
    pub level: u8,
    pub charging: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub calendar: Vec<CalendarEntry>,
    pub location: Option<Location>,
    pub battery: Option<BatteryReport>,
    pub glasses_connected: bool,
}

impl DeviceSnapshot {
    /// Up to `max` events that have not ended yet, soonest first
    pub fn upcoming(&self, now: DateTime<Utc>, max: usize) -> Vec<CalendarEntry> {
        let mut events: Vec<CalendarEntry> = self
            .calendar
            .iter()
            .filter(|entry| entry.end > now)
            .cloned()
            .collect();
        events.sort_by_key(|entry| entry.start);
        events.truncate(max);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(id: &str, start: DateTime<Utc>, minutes: i64) -> CalendarEntry {
        CalendarEntry {
            event_id: id.into(),
            title: format!("event {}", id),
            start,
            end: start + Duration::minutes(minutes),
            location: None,
        }
    }

    #[test]
    fn test_upcoming_skips_past_and_sorts() {
        let now = Utc::now();
        let snapshot = DeviceSnapshot {
            calendar: vec![
                entry("late", now + Duration::hours(5), 30),
                entry("past", now - Duration::hours(2), 30),
                entry("running", now - Duration::minutes(10), 30),
                entry("soon", now + Duration::hours(1), 30),
            ],
            ..Default::default()
        };

        let ids: Vec<String> = snapshot
            .upcoming(now, 5)
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        assert_eq!(ids, vec!["running", "soon", "late"]);
        assert_eq!(snapshot.upcoming(now, 1).len(), 1);
    }
}
