//! Aggregate readiness of the two arms
//!
//! ```text
//!            init(L)              init(R)
//! NotReady ──────────▶ LeftReady ─────────┐
//!     │                                   ▼
//!     └──init(R)──▶ RightReady ──init(L)─▶ BothReady
//!
//! disconnect(any side) from any state ──▶ NotReady
//! uninitialized(side) ──▶ only that side drops, the other keeps its flag
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Readiness {
    #[default]
    NotReady,
    LeftReady,
    RightReady,
    BothReady,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::BothReady)
    }
}

/// Change in the aggregate flag caused by a per-side event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessTransition {
    Unchanged,
    BecameReady,
    BecameNotReady,
}

/// Tracks per-side initialization and derives [`Readiness`]
#[derive(Debug, Clone, Default)]
pub struct ReadinessMachine {
    left: bool,
    right: bool,
}

impl ReadinessMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Readiness {
        match (self.left, self.right) {
            (false, false) => Readiness::NotReady,
            (true, false) => Readiness::LeftReady,
            (false, true) => Readiness::RightReady,
            (true, true) => Readiness::BothReady,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn is_side_ready(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// A side acknowledged its initialization
    pub fn side_initialized(&mut self, side: Side) -> ReadinessTransition {
        let was_ready = self.is_ready();
        match side {
            Side::Left => self.left = true,
            Side::Right => self.right = true,
        }
        if !was_ready && self.is_ready() {
            ReadinessTransition::BecameReady
        } else {
            ReadinessTransition::Unchanged
        }
    }

    /// A side that is still linked has to repeat its initialization
    pub fn side_uninitialized(&mut self, side: Side) -> ReadinessTransition {
        let was_ready = self.is_ready();
        match side {
            Side::Left => self.left = false,
            Side::Right => self.right = false,
        }
        if was_ready {
            ReadinessTransition::BecameNotReady
        } else {
            ReadinessTransition::Unchanged
        }
    }

    pub fn reset(&mut self) -> ReadinessTransition {
        let was_ready = self.is_ready();
        self.left = false;
        self.right = false;
        if was_ready {
            ReadinessTransition::BecameNotReady
        } else {
            ReadinessTransition::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_only_when_both_initialized() {
        let mut machine = ReadinessMachine::new();
        assert_eq!(machine.state(), Readiness::NotReady);

        assert_eq!(
            machine.side_initialized(Side::Right),
            ReadinessTransition::Unchanged
        );
        assert_eq!(machine.state(), Readiness::RightReady);

        assert_eq!(
            machine.side_initialized(Side::Left),
            ReadinessTransition::BecameReady
        );
        assert!(machine.is_ready());

        // Repeated init does not fire again
        assert_eq!(
            machine.side_initialized(Side::Left),
            ReadinessTransition::Unchanged
        );
    }

    #[test]
    fn test_disconnect_resets_both_sides() {
        let mut machine = ReadinessMachine::new();
        machine.side_initialized(Side::Left);
        machine.side_initialized(Side::Right);

        assert_eq!(machine.reset(), ReadinessTransition::BecameNotReady);
        assert_eq!(machine.state(), Readiness::NotReady);
        assert!(!machine.is_side_ready(Side::Left));
    }

    #[test]
    fn test_uninitialized_side_keeps_the_other() {
        let mut machine = ReadinessMachine::new();
        machine.side_initialized(Side::Left);
        machine.side_initialized(Side::Right);

        assert_eq!(
            machine.side_uninitialized(Side::Right),
            ReadinessTransition::BecameNotReady
        );
        assert_eq!(machine.state(), Readiness::LeftReady);
        assert_eq!(
            machine.side_uninitialized(Side::Right),
            ReadinessTransition::Unchanged
        );
        assert_eq!(
            machine.side_initialized(Side::Right),
            ReadinessTransition::BecameReady
        );
    }

    #[test]
    fn test_disconnect_while_partial() {
        let mut machine = ReadinessMachine::new();
        machine.side_initialized(Side::Left);
        assert_eq!(machine.reset(), ReadinessTransition::Unchanged);
        assert_eq!(machine.state(), Readiness::NotReady);
    }
}
