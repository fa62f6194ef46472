//! Command queue behaviour against an in-memory link
//!
//! The writer records every frame with the (paused) clock time it was written
//! and answers according to a per-side script, so ordering, retry counts, and
//! timeout growth can be checked exactly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use glasslink_ble::{
    command_channel, AckSignals, BleResult, CommandQueue, DispatchEvent, DispatchTiming,
    Dispatcher, LinkWriter, SideResult,
};
use glasslink_core::{AckOutcome, BufferedCommand, Side};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Reply {
    Ack,
    Silent,
}

struct ScriptedLink {
    acks: Arc<AckSignals>,
    left: Reply,
    right: Reply,
    writes: Mutex<Vec<(Side, Vec<u8>, Instant)>>,
}

#[async_trait]
impl LinkWriter for ScriptedLink {
    async fn write(&self, side: Side, frame: &[u8]) -> BleResult<()> {
        self.writes.lock().push((side, frame.to_vec(), Instant::now()));
        let reply = match side {
            Side::Left => self.left,
            Side::Right => self.right,
        };
        if reply == Reply::Ack {
            self.acks.release(side, AckOutcome::Success);
        }
        Ok(())
    }
}

struct Harness {
    link: Arc<ScriptedLink>,
    queue: CommandQueue,
    events: mpsc::UnboundedReceiver<DispatchEvent>,
}

fn start(left: Reply, right: Reply) -> Harness {
    let acks = Arc::new(AckSignals::new());
    let link = Arc::new(ScriptedLink {
        acks: acks.clone(),
        left,
        right,
        writes: Mutex::new(Vec::new()),
    });
    let (events_tx, events) = mpsc::unbounded_channel();
    let (queue, receiver) = command_channel();
    let dispatcher = Dispatcher::new(link.clone(), acks, DispatchTiming::default(), events_tx);
    tokio::spawn(dispatcher.run(receiver));
    Harness {
        link,
        queue,
        events,
    }
}

// ----------------------------------------------------------------------------
// Ordering Tests
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_commands_never_interleave() {
    let harness = start(Reply::Ack, Reply::Ack);

    let mut last = None;
    for id in 0..10u8 {
        let frames = vec![vec![id, 3, 0], vec![id, 3, 1], vec![id, 3, 2]];
        last = Some(
            harness
                .queue
                .enqueue_tracked(BufferedCommand::new(frames))
                .unwrap(),
        );
    }
    last.unwrap().await.unwrap();

    let writes = harness.link.writes.lock();
    assert_eq!(writes.len(), 10 * 2 * 3);

    // Each command: left frames 0..3, then right frames 0..3, then the next id
    for (position, (side, frame, _)) in writes.iter().enumerate() {
        let command = (position / 6) as u8;
        let expected_side = if position % 6 < 3 { Side::Left } else { Side::Right };
        assert_eq!(frame[0], command);
        assert_eq!(frame[2] as usize, position % 3);
        assert_eq!(*side, expected_side);
    }
}

#[tokio::test(start_paused = true)]
async fn test_tracked_outcome_reports_each_side() {
    let harness = start(Reply::Ack, Reply::Ack);
    let outcome = harness
        .queue
        .enqueue_tracked(BufferedCommand::single(vec![0x01, 0x20, 0x00]).to_side(Side::Right))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(outcome.results, vec![(Side::Right, SideResult::Acknowledged)]);
    assert!(outcome.is_delivered());
}

// ----------------------------------------------------------------------------
// Retry Tests
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_silent_side_gets_five_attempts_with_growing_timeouts() {
    let mut harness = start(Reply::Ack, Reply::Silent);
    let outcome = harness
        .queue
        .enqueue_tracked(BufferedCommand::single(vec![0x4E, 1, 0]))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(outcome.result(Side::Left), Some(SideResult::Acknowledged));
    assert_eq!(outcome.result(Side::Right), Some(SideResult::Unresponsive));

    let right_writes: Vec<Instant> = harness
        .link
        .writes
        .lock()
        .iter()
        .filter(|(side, _, _)| *side == Side::Right)
        .map(|(_, _, at)| *at)
        .collect();
    assert_eq!(right_writes.len(), 5);

    let gaps: Vec<Duration> = right_writes.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.windows(2).all(|pair| pair[0] < pair[1]), "{gaps:?}");
    assert_eq!(gaps[0], Duration::from_millis(300));

    assert_eq!(
        harness.events.recv().await,
        Some(DispatchEvent::SideUnresponsive(Side::Right))
    );
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_side_does_not_stall_queue() {
    let harness = start(Reply::Silent, Reply::Silent);
    harness
        .queue
        .enqueue(BufferedCommand::single(vec![0x0B, 30, 1]))
        .unwrap();
    let next = harness
        .queue
        .enqueue_tracked(BufferedCommand::single(vec![0x18]).ignoring_ack())
        .unwrap();

    let outcome = next.await.unwrap();
    assert_eq!(outcome.result(Side::Left), Some(SideResult::Sent));
    assert_eq!(harness.link.writes.lock().len(), 5 + 5 + 2);
}

#[tokio::test(start_paused = true)]
async fn test_stray_ack_does_not_leak_into_next_command() {
    let acks = Arc::new(AckSignals::new());
    let link = Arc::new(ScriptedLink {
        acks: acks.clone(),
        left: Reply::Silent,
        right: Reply::Silent,
        writes: Mutex::new(Vec::new()),
    });
    let (events_tx, _events) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(link.clone(), acks.clone(), DispatchTiming::default(), events_tx);

    // A late ack with nothing pending is dropped
    assert!(!acks.release(Side::Left, AckOutcome::Success));

    let outcome = dispatcher
        .process(&BufferedCommand::single(vec![0x4D, 1]).to_side(Side::Left))
        .await;
    assert_eq!(outcome.result(Side::Left), Some(SideResult::Unresponsive));
    assert!(!acks.is_armed(Side::Left));
}
