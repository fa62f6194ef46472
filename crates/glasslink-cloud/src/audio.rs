//! Audio upload pipeline
//!
//! Capture code pushes frames into an [`AudioFrameQueue`] without ever
//! blocking. An [`AudioSender`] drains the queue onto the cloud socket while
//! the session is connected; frames that can not be sent are put back at the
//! front so ordering survives a short outage.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Frame Queue
// ----------------------------------------------------------------------------

/// Bounded drop-oldest buffer of raw audio frames
#[derive(Debug)]
pub struct AudioFrameQueue {
    capacity: usize,
    frames: Mutex<VecDeque<Vec<u8>>>,
}

impl AudioFrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Admit a frame, evicting the oldest one first when full.
    ///
    /// Returns `true` when a frame was evicted.
    pub fn push(&self, frame: Vec<u8>) -> bool {
        let mut frames = self.frames.lock();
        let evicted = if frames.len() >= self.capacity {
            frames.pop_front();
            true
        } else {
            false
        };
        frames.push_back(frame);
        evicted
    }

    pub fn pop(&self) -> Option<Vec<u8>> {
        self.frames.lock().pop_front()
    }

    /// Return an unsent frame to the head of the queue.
    ///
    /// Newer frames win: if the queue filled up in the meantime the returned
    /// frame is the one dropped.
    pub fn push_front(&self, frame: Vec<u8>) {
        let mut frames = self.frames.lock();
        if frames.len() < self.capacity {
            frames.push_front(frame);
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ----------------------------------------------------------------------------
// Sender Loop
// ----------------------------------------------------------------------------

/// Destination of drained audio frames
pub trait AudioSink: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Hand one frame to the transport, getting it back if it was not accepted
    fn send_audio(&self, frame: Vec<u8>) -> Result<(), Vec<u8>>;
}

/// Handle to a running sender loop
#[derive(Debug)]
pub struct AudioSender {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl AudioSender {
    pub fn spawn<S: AudioSink>(queue: Arc<AudioFrameQueue>, sink: S, poll: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = tokio::spawn(async move {
            debug!("Audio sender started");
            while !flag.load(Ordering::Acquire) {
                if !sink.is_connected() {
                    tokio::time::sleep(poll).await;
                    continue;
                }
                let Some(frame) = queue.pop() else {
                    tokio::time::sleep(poll).await;
                    continue;
                };
                match sink.send_audio(frame) {
                    Ok(()) => tokio::task::yield_now().await,
                    Err(frame) => {
                        trace!("Audio frame not accepted, requeueing");
                        queue.push_front(frame);
                        tokio::time::sleep(poll).await;
                    }
                }
            }
            debug!("Audio sender stopped");
        });
        Self { stop, handle }
    }

    /// Ask the loop to exit. It does so within one poll interval.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for AudioSender {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_keeps_newest_frames() {
        let queue = AudioFrameQueue::new(3);
        for i in 0..3u8 {
            assert!(!queue.push(vec![i]));
        }
        assert!(queue.push(vec![3]));
        assert_eq!(queue.len(), 3);
        let drained: Vec<Vec<u8>> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_push_front_restores_order() {
        let queue = AudioFrameQueue::new(4);
        queue.push(vec![1]);
        queue.push(vec![2]);
        let head = queue.pop().unwrap();
        queue.push_front(head);
        assert_eq!(queue.pop(), Some(vec![1]));
    }

    #[test]
    fn test_push_front_on_full_queue_drops_stale_frame() {
        let queue = AudioFrameQueue::new(2);
        let stale = vec![0];
        queue.push(vec![1]);
        queue.push(vec![2]);
        queue.push_front(stale);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(vec![1]));
    }

    struct Recorder {
        connected: Arc<AtomicBool>,
        refuse_next: Arc<AtomicBool>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl AudioSink for Recorder {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn send_audio(&self, frame: Vec<u8>) -> Result<(), Vec<u8>> {
            if !self.is_connected() || self.refuse_next.swap(false, Ordering::SeqCst) {
                return Err(frame);
            }
            self.sent.lock().push(frame);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sender_waits_for_connection_and_stops() {
        let queue = Arc::new(AudioFrameQueue::new(8));
        let connected = Arc::new(AtomicBool::new(false));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = AudioSender::spawn(
            queue.clone(),
            Recorder {
                connected: connected.clone(),
                refuse_next: Arc::new(AtomicBool::new(false)),
                sent: sent.clone(),
            },
            Duration::from_millis(10),
        );

        queue.push(vec![1]);
        queue.push(vec![2]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sent.lock().is_empty());
        assert_eq!(queue.len(), 2);

        connected.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*sent.lock(), vec![vec![1], vec![2]]);

        sender.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sender.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_frame_is_retried_first() {
        let queue = Arc::new(AudioFrameQueue::new(8));
        let refuse_next = Arc::new(AtomicBool::new(true));
        let sent = Arc::new(Mutex::new(Vec::new()));
        queue.push(vec![1, 2, 3]);
        queue.push(vec![4]);

        let _sender = AudioSender::spawn(
            queue.clone(),
            Recorder {
                connected: Arc::new(AtomicBool::new(true)),
                refuse_next: refuse_next.clone(),
                sent: sent.clone(),
            },
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!refuse_next.load(Ordering::SeqCst));
        assert_eq!(*sent.lock(), vec![vec![1, 2, 3], vec![4]]);
        assert!(queue.is_empty());
    }
}
