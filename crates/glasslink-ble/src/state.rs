//! Link state of the pair, free of any radio I/O
//!
//! Every input returns the effects the controller has to carry out. Keeping the
//! decisions here lets them be tested without hardware.

use glasslink_core::protocol::{commands, CMD_INIT};
use glasslink_core::{
    AckOutcome, BufferedCommand, DeviceEvent, GlassesInfo, LinkStatus, ReadinessMachine,
    ReadinessTransition, Side,
};
use tracing::{debug, info};

use crate::events::{GlassesEvent, GlassesStatus};

/// Work the controller must do after a state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEffect {
    Enqueue(BufferedCommand),
    TearDown(Side),
    ResetAcks,
    StartReconnect,
    StopReconnect,
    StartHeartbeat,
    StopHeartbeat,
    Publish(GlassesEvent),
}

#[derive(Debug, Default)]
pub struct DeviceState {
    status: GlassesStatus,
    readiness: ReadinessMachine,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &GlassesStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn link_status(&self, side: Side) -> LinkStatus {
        self.status.link(side)
    }

    fn set_link(&mut self, side: Side, status: LinkStatus, effects: &mut Vec<StateEffect>) {
        let slot = match side {
            Side::Left => &mut self.status.left,
            Side::Right => &mut self.status.right,
        };
        if *slot != status {
            *slot = status;
            effects.push(StateEffect::Publish(GlassesEvent::LinkStatusChanged { side, status }));
        }
    }

    fn publish_telemetry(&self, effects: &mut Vec<StateEffect>) {
        effects.push(StateEffect::Publish(GlassesEvent::TelemetryChanged(
            self.status.telemetry.clone(),
        )));
    }

    // ------------------------------------------------------------------------
    // Link Lifecycle
    // ------------------------------------------------------------------------

    pub fn link_connecting(&mut self, side: Side) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        self.set_link(side, LinkStatus::Connecting, &mut effects);
        effects
    }

    /// Services are discovered and notifications subscribed; start the handshake
    pub fn link_established(&mut self, side: Side) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        self.set_link(side, LinkStatus::ServicesDiscovered, &mut effects);
        effects.push(StateEffect::Enqueue(commands::init(side)));
        effects
    }

    /// A connection attempt gave up; the reconnect timer tries again
    pub fn link_failed(&mut self, side: Side) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        self.set_link(side, LinkStatus::Disconnected, &mut effects);
        effects.push(StateEffect::StartReconnect);
        effects
    }

    /// A side dropped; an established pair is torn down as a whole
    pub fn link_lost(&mut self, side: Side) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        let paired = Side::BOTH
            .iter()
            .all(|s| self.link_status(*s).is_connected());

        self.set_link(side, LinkStatus::Disconnected, &mut effects);
        if paired {
            info!("{} arm lost, tearing down the pair", side);
            effects.push(StateEffect::TearDown(side.other()));
            self.set_link(side.other(), LinkStatus::Disconnected, &mut effects);
        }

        self.drop_readiness(&mut effects);
        effects.push(StateEffect::StartReconnect);
        effects
    }

    /// Back to a cold state, e.g. after an explicit disconnect
    pub fn reset(&mut self) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        for side in Side::BOTH {
            self.set_link(side, LinkStatus::Disconnected, &mut effects);
        }
        self.drop_readiness(&mut effects);
        effects
    }

    fn drop_readiness(&mut self, effects: &mut Vec<StateEffect>) {
        effects.push(StateEffect::ResetAcks);
        let transition = self.readiness.reset();
        self.readiness_lowered(transition, effects);
    }

    fn readiness_lowered(&mut self, transition: ReadinessTransition, effects: &mut Vec<StateEffect>) {
        if transition == ReadinessTransition::BecameNotReady {
            effects.push(StateEffect::StopHeartbeat);
            effects.push(StateEffect::Publish(GlassesEvent::ReadinessChanged(false)));
        }
        self.status.readiness = self.readiness.state();

        let before = self.status.telemetry.clone();
        self.status.telemetry.clear_cached();
        if self.status.telemetry != before {
            self.publish_telemetry(effects);
        }
    }

    /// The dispatcher gave up on a side
    ///
    /// A side that is still linked drops back to `ServicesDiscovered`, so the
    /// reconnect timer repeats its init instead of finding the pair ready.
    pub fn side_unresponsive(&mut self, side: Side) -> Vec<StateEffect> {
        let mut effects = vec![StateEffect::Publish(GlassesEvent::SideUnresponsive(side))];
        if self.link_status(side) == LinkStatus::Initialized {
            info!("{} arm stopped answering, repeating its handshake", side);
            self.set_link(side, LinkStatus::ServicesDiscovered, &mut effects);
            let transition = self.readiness.side_uninitialized(side);
            self.readiness_lowered(transition, &mut effects);
        }
        effects.push(StateEffect::StartReconnect);
        effects
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    pub fn notification(&mut self, side: Side, event: &DeviceEvent) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        match event {
            DeviceEvent::Ack {
                command: CMD_INIT,
                outcome,
            } => self.init_acknowledged(side, *outcome, &mut effects),
            DeviceEvent::Ack { .. } | DeviceEvent::Heartbeat { .. } => {}
            DeviceEvent::Battery { .. } => {
                if self.status.telemetry.apply(side, event) {
                    self.publish_telemetry(&mut effects);
                }
            }
            DeviceEvent::Order(order) => {
                if self.status.telemetry.apply(side, event) {
                    self.publish_telemetry(&mut effects);
                }
                effects.push(StateEffect::Publish(GlassesEvent::Order {
                    side,
                    order: *order,
                }));
            }
            DeviceEvent::Serial(_) => {
                if self.status.telemetry.apply(side, event) {
                    if let Some(info) = self.status.telemetry.info.clone() {
                        effects.push(StateEffect::Publish(GlassesEvent::InfoDecoded(info)));
                    }
                }
            }
            DeviceEvent::VoiceData { sequence, data } => {
                effects.push(StateEffect::Publish(GlassesEvent::VoiceData {
                    side,
                    sequence: *sequence,
                    data: data.clone(),
                }));
            }
        }
        effects
    }

    fn init_acknowledged(&mut self, side: Side, outcome: AckOutcome, effects: &mut Vec<StateEffect>) {
        if !outcome.is_success() {
            debug!("{} arm rejected initialization", side);
            return;
        }
        if !self.link_status(side).is_connected() {
            debug!("Ignoring init ack from disconnected {} arm", side);
            return;
        }

        self.set_link(side, LinkStatus::Initialized, effects);
        let transition = self.readiness.side_initialized(side);
        self.status.readiness = self.readiness.state();

        if transition == ReadinessTransition::BecameReady {
            info!("Both arms ready");
            effects.push(StateEffect::StopReconnect);
            effects.push(StateEffect::StartHeartbeat);
            effects.push(StateEffect::Publish(GlassesEvent::ReadinessChanged(true)));
            effects.push(StateEffect::Enqueue(commands::battery_query()));
            if self.status.telemetry.info.is_none() {
                effects.push(StateEffect::Enqueue(commands::serial_query()));
            }
        }
    }

    /// Glasses info decoded from an advertisement
    pub fn set_info(&mut self, info: GlassesInfo) -> Vec<StateEffect> {
        if self.status.telemetry.info.as_ref() == Some(&info) {
            return Vec::new();
        }
        self.status.telemetry.info = Some(info.clone());
        vec![StateEffect::Publish(GlassesEvent::InfoDecoded(info))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glasslink_core::protocol::ACK_SUCCESS;
    use glasslink_core::{decode_notification, Readiness};

    fn init_ack() -> DeviceEvent {
        decode_notification(&[CMD_INIT, ACK_SUCCESS]).unwrap()
    }

    fn ready_state() -> DeviceState {
        let mut state = DeviceState::new();
        for side in Side::BOTH {
            state.link_established(side);
            state.notification(side, &init_ack());
        }
        state
    }

    fn has(effects: &[StateEffect], effect: &StateEffect) -> bool {
        effects.contains(effect)
    }

    #[test]
    fn test_established_link_queues_init() {
        let mut state = DeviceState::new();
        let effects = state.link_established(Side::Left);
        assert!(has(&effects, &StateEffect::Enqueue(commands::init(Side::Left))));
        assert_eq!(state.link_status(Side::Left), LinkStatus::ServicesDiscovered);
    }

    #[test]
    fn test_ready_after_both_init_acks() {
        let mut state = DeviceState::new();
        state.link_established(Side::Left);
        state.link_established(Side::Right);

        let effects = state.notification(Side::Left, &init_ack());
        assert!(!has(&effects, &StateEffect::Publish(GlassesEvent::ReadinessChanged(true))));
        assert_eq!(state.status().readiness, Readiness::LeftReady);

        let effects = state.notification(Side::Right, &init_ack());
        assert!(has(&effects, &StateEffect::Publish(GlassesEvent::ReadinessChanged(true))));
        assert!(has(&effects, &StateEffect::StopReconnect));
        assert!(has(&effects, &StateEffect::StartHeartbeat));
        assert!(has(&effects, &StateEffect::Enqueue(commands::battery_query())));
        assert!(state.is_ready());
    }

    #[test]
    fn test_init_ack_from_unconnected_side_is_ignored() {
        let mut state = DeviceState::new();
        let effects = state.notification(Side::Left, &init_ack());
        assert!(effects.is_empty());
        assert_eq!(state.link_status(Side::Left), LinkStatus::Disconnected);
    }

    #[test]
    fn test_link_lost_tears_down_pair_and_clears_cached_state() {
        let mut state = ready_state();
        state.notification(
            Side::Left,
            &DeviceEvent::Battery {
                percent: 70,
                voltage: 390,
            },
        );
        state.notification(
            Side::Right,
            &DeviceEvent::Order(glasslink_core::DeviceOrder::CaseOpen),
        );
        state.notification(
            Side::Right,
            &DeviceEvent::Order(glasslink_core::DeviceOrder::CaseRemoved),
        );
        state.notification(
            Side::Left,
            &DeviceEvent::Order(glasslink_core::DeviceOrder::HeadUp),
        );
        assert_eq!(state.status().telemetry.left_battery, Some(70));
        assert_eq!(state.status().telemetry.case_open, Some(true));
        assert!(state.status().telemetry.case_removed);

        let effects = state.link_lost(Side::Left);
        assert!(has(&effects, &StateEffect::TearDown(Side::Right)));
        assert!(has(&effects, &StateEffect::ResetAcks));
        assert!(has(&effects, &StateEffect::StopHeartbeat));
        assert!(has(&effects, &StateEffect::StartReconnect));
        assert!(has(&effects, &StateEffect::Publish(GlassesEvent::ReadinessChanged(false))));

        assert!(!state.is_ready());
        assert_eq!(state.status().readiness, Readiness::NotReady);
        let telemetry = &state.status().telemetry;
        assert_eq!(telemetry.left_battery, None);
        assert_eq!(telemetry.case_open, None);
        assert!(!telemetry.case_removed);
        assert_eq!(telemetry.head_up, None);
        assert_eq!(state.link_status(Side::Right), LinkStatus::Disconnected);
    }

    #[test]
    fn test_link_lost_while_half_connected() {
        let mut state = DeviceState::new();
        state.link_established(Side::Left);
        let effects = state.link_lost(Side::Left);
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, StateEffect::TearDown(_))));
        assert!(has(&effects, &StateEffect::StartReconnect));
    }

    #[test]
    fn test_orders_and_voice_are_published() {
        let mut state = ready_state();
        let effects = state.notification(
            Side::Right,
            &DeviceEvent::VoiceData {
                sequence: 1,
                data: vec![1, 2],
            },
        );
        assert_eq!(
            effects,
            vec![StateEffect::Publish(GlassesEvent::VoiceData {
                side: Side::Right,
                sequence: 1,
                data: vec![1, 2]
            })]
        );

        let effects = state.notification(
            Side::Left,
            &DeviceEvent::Order(glasslink_core::DeviceOrder::DoubleTap),
        );
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_unresponsive_side_repeats_handshake() {
        let mut state = ready_state();
        let effects = state.side_unresponsive(Side::Right);
        assert!(has(&effects, &StateEffect::StartReconnect));
        assert!(has(&effects, &StateEffect::StopHeartbeat));
        assert!(has(&effects, &StateEffect::Publish(GlassesEvent::ReadinessChanged(false))));
        assert!(!state.is_ready());
        assert_eq!(state.link_status(Side::Right), LinkStatus::ServicesDiscovered);
        assert_eq!(state.link_status(Side::Left), LinkStatus::Initialized);
        assert_eq!(state.status().readiness, Readiness::LeftReady);

        let effects = state.notification(Side::Right, &init_ack());
        assert!(state.is_ready());
        assert!(has(&effects, &StateEffect::StopReconnect));
    }

    #[test]
    fn test_unresponsive_side_before_init() {
        let mut state = DeviceState::new();
        state.link_established(Side::Left);
        let effects = state.side_unresponsive(Side::Left);
        assert_eq!(
            effects,
            vec![
                StateEffect::Publish(GlassesEvent::SideUnresponsive(Side::Left)),
                StateEffect::StartReconnect,
            ]
        );
        assert_eq!(state.link_status(Side::Left), LinkStatus::ServicesDiscovered);
    }
}
