//! Hand-off queue from the real-time capture thread to the async side.
//!
//! The producer half never waits: under [`OverflowPolicy::Skip`] the queue
//! holds one snapshot and a full queue drops the newcomer, under
//! [`OverflowPolicy::Unbounded`] every snapshot is queued. The only lock the
//! producer touches is the [`QueueInfo`] counter lock.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::constants::pipeline::BOUNDED_QUEUE_CAPACITY;
use crate::error::{AppError, Result};
use crate::pipeline::window::Snapshot;
use crate::types::OverflowPolicy;

/// Counter values at one instant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Snapshots currently waiting in the queue.
    pub queued: usize,
    /// Snapshots dropped since the last report.
    pub skipped: u64,
    /// Snapshots fully dispatched since the last report.
    pub processed: u64,
}

/// Queue counters shared by the bridge, the dispatch loop and the reporter.
#[derive(Debug, Default)]
pub struct QueueInfo {
    counters: Mutex<QueueStats>,
}

impl QueueInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one snapshot as fully dispatched.
    pub fn record_processed(&self) {
        self.counters.lock().processed += 1;
    }

    /// Current values without resetting anything.
    pub fn peek(&self) -> QueueStats {
        *self.counters.lock()
    }

    /// Read all counters, then reset `skipped` and `processed`.
    ///
    /// `queued` is the live queue depth and is never reset.
    pub fn take_report(&self) -> QueueStats {
        let mut counters = self.counters.lock();
        let report = *counters;
        counters.skipped = 0;
        counters.processed = 0;
        report
    }

    fn record_dequeued(&self) {
        let mut counters = self.counters.lock();
        counters.queued = counters.queued.saturating_sub(1);
    }
}

/// Items travelling through the hand-off queue.
#[derive(Debug)]
pub enum PipelineItem {
    Snapshot(Snapshot),
    /// Sentinel: the dispatch loop terminates on receipt.
    Shutdown,
}

/// Outcome of offering a snapshot to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Enqueued,
    /// The bounded queue was full; counted as skipped.
    Dropped,
    /// The consumer is gone.
    Closed,
}

#[derive(Debug, Clone)]
enum SenderKind {
    Bounded(mpsc::Sender<PipelineItem>),
    Unbounded(mpsc::UnboundedSender<PipelineItem>),
}

#[derive(Debug)]
enum ReceiverKind {
    Bounded(mpsc::Receiver<PipelineItem>),
    Unbounded(mpsc::UnboundedReceiver<PipelineItem>),
}

/// Producer half. Cloneable; safe to call from a non-async thread.
#[derive(Debug, Clone)]
pub struct HandoffSender {
    inner: SenderKind,
    info: Arc<QueueInfo>,
}

/// Consumer half, owned by the dispatch loop.
#[derive(Debug)]
pub struct HandoffReceiver {
    inner: ReceiverKind,
    info: Arc<QueueInfo>,
}

/// Create the hand-off queue for the given policy.
pub fn handoff(policy: OverflowPolicy, info: Arc<QueueInfo>) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = match policy {
        OverflowPolicy::Skip => {
            let (tx, rx) = mpsc::channel(BOUNDED_QUEUE_CAPACITY);
            (SenderKind::Bounded(tx), ReceiverKind::Bounded(rx))
        }
        OverflowPolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (SenderKind::Unbounded(tx), ReceiverKind::Unbounded(rx))
        }
    };

    (
        HandoffSender {
            inner: tx,
            info: Arc::clone(&info),
        },
        HandoffReceiver { inner: rx, info },
    )
}

impl HandoffSender {
    /// Non-blocking enqueue of one snapshot.
    ///
    /// `queued` is raised before the send so the consumer can never
    /// decrement it first; a send that does not land takes it back.
    pub fn offer(&self, snapshot: Snapshot) -> Admission {
        self.info.counters.lock().queued += 1;
        let item = PipelineItem::Snapshot(snapshot);

        let sent = match &self.inner {
            SenderKind::Bounded(tx) => match tx.try_send(item) {
                Ok(()) => Admission::Enqueued,
                Err(TrySendError::Full(_)) => Admission::Dropped,
                Err(TrySendError::Closed(_)) => Admission::Closed,
            },
            SenderKind::Unbounded(tx) => match tx.send(item) {
                Ok(()) => Admission::Enqueued,
                Err(_) => Admission::Closed,
            },
        };

        if sent != Admission::Enqueued {
            let mut counters = self.info.counters.lock();
            counters.queued = counters.queued.saturating_sub(1);
            if sent == Admission::Dropped {
                counters.skipped += 1;
            }
        }
        sent
    }

    /// Enqueue the shutdown sentinel, waiting for room if the queue is
    /// bounded and full. Async side only.
    pub async fn shutdown(&self) -> Result<()> {
        let sent = match &self.inner {
            SenderKind::Bounded(tx) => tx.send(PipelineItem::Shutdown).await.is_ok(),
            SenderKind::Unbounded(tx) => tx.send(PipelineItem::Shutdown).is_ok(),
        };

        if sent {
            Ok(())
        } else {
            Err(AppError::PipelineClosed)
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        match self.inner {
            SenderKind::Bounded(_) => OverflowPolicy::Skip,
            SenderKind::Unbounded(_) => OverflowPolicy::Unbounded,
        }
    }
}

impl HandoffReceiver {
    /// Wait for the next item. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<PipelineItem> {
        let item = match &mut self.inner {
            ReceiverKind::Bounded(rx) => rx.recv().await,
            ReceiverKind::Unbounded(rx) => rx.recv().await,
        };

        if let Some(PipelineItem::Snapshot(_)) = &item {
            self.info.record_dequeued();
        }
        item
    }
}
