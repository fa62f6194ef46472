//! Ordered command queue and its single consumer
//!
//! Commands are pulled one at a time. For each targeted side (left first) the
//! frames are written in order, then the dispatcher waits for that side's
//! acknowledgement with a timeout that grows on every retry. A side that never
//! answers is given up on after the configured number of attempts; the command
//! still completes and the next one starts.

use std::sync::Arc;

use async_trait::async_trait;
use glasslink_core::{AckOutcome, BufferedCommand, Side};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::ack::AckSignals;
use crate::config::DispatchTiming;
use crate::error::{BleError, BleResult};

// ----------------------------------------------------------------------------
// Link Writer
// ----------------------------------------------------------------------------

/// Raw frame writes to one arm
#[async_trait]
pub trait LinkWriter: Send + Sync {
    async fn write(&self, side: Side, frame: &[u8]) -> BleResult<()>;
}

#[async_trait]
impl<W: LinkWriter + ?Sized> LinkWriter for Arc<W> {
    async fn write(&self, side: Side, frame: &[u8]) -> BleResult<()> {
        (**self).write(side, frame).await
    }
}

// ----------------------------------------------------------------------------
// Outcomes and Events
// ----------------------------------------------------------------------------

/// What happened to a command on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideResult {
    /// The arm acknowledged success
    Acknowledged,
    /// Written without waiting for an acknowledgement
    Sent,
    /// No success acknowledgement within the retry budget
    Unresponsive,
}

/// Completion report for a tracked command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    pub results: Vec<(Side, SideResult)>,
}

impl CommandOutcome {
    pub fn result(&self, side: Side) -> Option<SideResult> {
        self.results
            .iter()
            .find(|(s, _)| *s == side)
            .map(|(_, result)| *result)
    }

    /// Every targeted side took the command
    pub fn is_delivered(&self) -> bool {
        self.results
            .iter()
            .all(|(_, result)| *result != SideResult::Unresponsive)
    }
}

/// Out-of-band reports from the dispatcher to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A side exhausted its attempts; the link needs recovery
    SideUnresponsive(Side),
}

// ----------------------------------------------------------------------------
// Command Queue
// ----------------------------------------------------------------------------

struct QueuedCommand {
    command: BufferedCommand,
    completion: Option<oneshot::Sender<CommandOutcome>>,
}

/// Producer half of the command queue; cheap to clone, never blocks
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<QueuedCommand>,
}

/// Consumer half, owned by the [`Dispatcher`]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<QueuedCommand>,
}

/// Create a connected queue pair
pub fn command_channel() -> (CommandQueue, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandQueue { tx }, CommandReceiver { rx })
}

impl CommandQueue {
    /// Append a command; fire and forget
    pub fn enqueue(&self, command: BufferedCommand) -> BleResult<()> {
        self.tx
            .send(QueuedCommand {
                command,
                completion: None,
            })
            .map_err(|_| BleError::QueueClosed)
    }

    /// Append a command and get notified once the dispatcher has finished it
    pub fn enqueue_tracked(
        &self,
        command: BufferedCommand,
    ) -> BleResult<oneshot::Receiver<CommandOutcome>> {
        let (completion, rx) = oneshot::channel();
        self.tx
            .send(QueuedCommand {
                command,
                completion: Some(completion),
            })
            .map_err(|_| BleError::QueueClosed)?;
        Ok(rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

/// Single consumer of the command queue
pub struct Dispatcher<W> {
    writer: W,
    acks: Arc<AckSignals>,
    timing: DispatchTiming,
    events: mpsc::UnboundedSender<DispatchEvent>,
}

impl<W: LinkWriter> Dispatcher<W> {
    pub fn new(
        writer: W,
        acks: Arc<AckSignals>,
        timing: DispatchTiming,
        events: mpsc::UnboundedSender<DispatchEvent>,
    ) -> Self {
        Self {
            writer,
            acks,
            timing,
            events,
        }
    }

    /// Drain the queue until every producer is gone
    pub async fn run(self, mut receiver: CommandReceiver) {
        info!("Command dispatcher started");
        while let Some(queued) = receiver.rx.recv().await {
            let outcome = self.process(&queued.command).await;
            if let Some(completion) = queued.completion {
                // Caller may have stopped waiting
                let _ = completion.send(outcome);
            }
            let pause = queued
                .command
                .post_delay()
                .unwrap_or(self.timing.min_command_delay);
            sleep(pause).await;
        }
        info!("Command dispatcher stopped");
    }

    /// Deliver one command to every side it targets
    pub async fn process(&self, command: &BufferedCommand) -> CommandOutcome {
        let mut outcome = CommandOutcome::default();
        if command.is_empty() {
            return outcome;
        }

        self.acks.reset_all();

        for &side in command.target().sides() {
            let result = if command.ignores_ack() {
                self.write_frames(side, command).await;
                SideResult::Sent
            } else {
                self.deliver(side, command).await
            };
            outcome.results.push((side, result));
        }
        outcome
    }

    async fn deliver(&self, side: Side, command: &BufferedCommand) -> SideResult {
        for attempt in 0..self.timing.max_attempts {
            let ack = self.acks.arm(side);
            self.write_frames(side, command).await;

            let wait = self.timing.ack_timeout(attempt);
            match timeout(wait, ack).await {
                Ok(Ok(AckOutcome::Success)) => return SideResult::Acknowledged,
                Ok(Ok(AckOutcome::Failure)) => {
                    debug!(
                        "{} arm rejected command {:02X?} (attempt {})",
                        side,
                        command.command_id(),
                        attempt + 1
                    );
                }
                Ok(Err(_)) => {
                    debug!("Ack wait on {} arm was released (attempt {})", side, attempt + 1);
                }
                Err(_) => {
                    debug!(
                        "No ack from {} arm within {:?} (attempt {})",
                        side,
                        wait,
                        attempt + 1
                    );
                }
            }
        }

        self.acks.force_release(side);
        warn!(
            "{} arm did not acknowledge command {:02X?} after {} attempts",
            side,
            command.command_id(),
            self.timing.max_attempts
        );
        let _ = self.events.send(DispatchEvent::SideUnresponsive(side));
        SideResult::Unresponsive
    }

    async fn write_frames(&self, side: Side, command: &BufferedCommand) {
        let frames = command.frames();
        for (index, frame) in frames.iter().enumerate() {
            if let Err(e) = self.writer.write(side, frame).await {
                debug!("Write to {} arm failed: {}", side, e);
            }
            if index + 1 < frames.len() {
                sleep(self.timing.inter_frame_delay).await;
            }
        }
    }
}
