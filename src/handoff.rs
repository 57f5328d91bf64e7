//! Bounded hand-off between the producer thread and the visualization tick.
//!
//! Both ends are non-blocking: the producer never waits on a slow consumer
//! and the consumer returns immediately when its read policy is not met.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::audio::SampleFrame;
use crate::config::{Config, Variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffPolicy {
    /// Single slot; a frame offered while the slot is occupied is dropped.
    OverwriteIfFull,
    /// FIFO of up to `capacity` chunks, drained `threshold` at a time.
    /// A chunk offered to a full queue is dropped.
    Accumulate { threshold: usize, capacity: usize },
}

impl HandoffPolicy {
    pub fn for_config(config: &Config) -> Self {
        match config.variant {
            Variant::Hardware => HandoffPolicy::OverwriteIfFull,
            Variant::Software => HandoffPolicy::Accumulate {
                threshold: config.num_chunks(),
                capacity: config.queue_capacity,
            },
        }
    }

    fn capacity(self) -> usize {
        match self {
            HandoffPolicy::OverwriteIfFull => 1,
            HandoffPolicy::Accumulate { threshold, capacity } => capacity.max(threshold).max(1),
        }
    }

    fn threshold(self) -> usize {
        match self {
            HandoffPolicy::OverwriteIfFull => 1,
            HandoffPolicy::Accumulate { threshold, .. } => threshold.max(1),
        }
    }
}

/// Result of offering a frame to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The queue was full; the frame was discarded.
    Dropped,
    /// The consumer is gone.
    Closed,
}

pub struct HandoffSender {
    tx: mpsc::Sender<SampleFrame>,
    dropped: u64,
}

impl HandoffSender {
    pub fn offer(&mut self, frame: SampleFrame) -> Enqueued {
        match self.tx.try_send(frame) {
            Ok(()) => Enqueued::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::debug!("Hand-off queue full, frame dropped ({} so far)", self.dropped);
                Enqueued::Dropped
            }
            Err(TrySendError::Closed(_)) => Enqueued::Closed,
        }
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub struct HandoffReceiver {
    rx: mpsc::Receiver<SampleFrame>,
    threshold: usize,
}

impl HandoffReceiver {
    /// Take the next visualization frame if the policy allows it.
    ///
    /// Returns `None` without dequeuing anything while fewer than
    /// `threshold` units are buffered. Otherwise dequeues exactly
    /// `threshold` units and joins them in arrival order.
    pub fn try_take(&mut self) -> Option<SampleFrame> {
        if self.rx.len() < self.threshold {
            return None;
        }
        let mut parts = Vec::with_capacity(self.threshold);
        while parts.len() < self.threshold {
            match self.rx.try_recv() {
                Ok(frame) => parts.push(frame),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        SampleFrame::concat(parts)
    }

    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

pub fn handoff_channel(policy: HandoffPolicy) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(policy.capacity());
    (
        HandoffSender { tx, dropped: 0 },
        HandoffReceiver {
            rx,
            threshold: policy.threshold(),
        },
    )
}
