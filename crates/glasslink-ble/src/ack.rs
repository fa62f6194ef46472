//! Per-side acknowledgement signals
//!
//! Each side has a single slot holding the sender half of a oneshot channel.
//! The dispatcher arms the slot right before writing a command and awaits the
//! receiver; the notification path takes the sender and fires it. An ack that
//! arrives while nothing is armed finds an empty slot and is dropped, so a late
//! ack can never resolve a later command.

use glasslink_core::{AckOutcome, Side};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Default)]
pub struct AckSignals {
    left: Mutex<Option<oneshot::Sender<AckOutcome>>>,
    right: Mutex<Option<oneshot::Sender<AckOutcome>>>,
}

impl AckSignals {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, side: Side) -> &Mutex<Option<oneshot::Sender<AckOutcome>>> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Arm `side` for the next acknowledgement, replacing any previous wait
    pub fn arm(&self, side: Side) -> oneshot::Receiver<AckOutcome> {
        let (tx, rx) = oneshot::channel();
        *self.slot(side).lock() = Some(tx);
        rx
    }

    /// Deliver an acknowledgement; returns whether a waiter received it
    pub fn release(&self, side: Side, outcome: AckOutcome) -> bool {
        let sender = self.slot(side).lock().take();
        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => {
                debug!("Dropping {:?} ack from {} arm, nothing pending", outcome, side);
                false
            }
        }
    }

    /// Abandon the wait on `side`; the waiter observes a closed channel
    pub fn force_release(&self, side: Side) {
        self.slot(side).lock().take();
    }

    /// Return both sides to the not-yet-received state
    pub fn reset_all(&self) {
        for side in Side::BOTH {
            self.force_release(side);
        }
    }

    pub fn is_armed(&self, side: Side) -> bool {
        self.slot(side).lock().is_some()
    }
}
