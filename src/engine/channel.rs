//! Bounded stage channels
//!
//! Fixed-capacity FIFO coupling between pipeline stages. `push` suspends the
//! producer while the channel is full, `pop` suspends the consumer while it is
//! empty; this is the backpressure mechanism that lets a slow downstream stage
//! throttle capture instead of growing memory without bound.
//!
//! Each channel carries a named [`DepthGauge`] so the stats reporter can
//! sample occupancy without touching the endpoints.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Error returned by [`StageSender::push`] when the consumer is gone.
#[derive(Debug)]
pub struct ChannelClosed(pub &'static str);

impl fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel '{}' closed", self.0)
    }
}

impl std::error::Error for ChannelClosed {}

/// Read-only occupancy view of one channel.
#[derive(Debug, Clone)]
pub struct DepthGauge {
    name: &'static str,
    capacity: usize,
    depth: Arc<AtomicUsize>,
}

impl DepthGauge {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Producer endpoint of a bounded stage channel.
#[derive(Clone)]
pub struct StageSender<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    depth: Arc<AtomicUsize>,
}

impl<T> StageSender<T> {
    /// Enqueue one item, suspending while the channel is at capacity.
    pub async fn push(&self, item: T) -> Result<(), ChannelClosed> {
        self.tx
            .send(item)
            .await
            .map_err(|_| ChannelClosed(self.name))?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Consumer endpoint of a bounded stage channel.
pub struct StageReceiver<T> {
    rx: mpsc::Receiver<T>,
    depth: Arc<AtomicUsize>,
}

impl<T> StageReceiver<T> {
    /// Dequeue the oldest item, suspending while the channel is empty.
    /// Returns `None` once every producer is gone.
    pub async fn pop(&mut self) -> Option<T> {
        let item = self.rx.recv().await;
        if item.is_some() {
            let _ = self
                .depth
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                    Some(d.saturating_sub(1))
                });
        }
        item
    }
}

/// Create a named bounded channel of the given capacity.
pub fn bounded<T>(
    name: &'static str,
    capacity: usize,
) -> (StageSender<T>, StageReceiver<T>, DepthGauge) {
    let (tx, rx) = mpsc::channel(capacity);
    let depth = Arc::new(AtomicUsize::new(0));

    let gauge = DepthGauge {
        name,
        capacity,
        depth: depth.clone(),
    };
    let sender = StageSender {
        name,
        tx,
        depth: depth.clone(),
    };
    let receiver = StageReceiver { rx, depth };

    (sender, receiver, gauge)
}
