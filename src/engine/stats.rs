//! Pipeline counters and the periodic stats reporter
//!
//! One process-wide counter set. Every mutation goes through a [`SharedStats`]
//! accessor, and the reporter's multi-field snapshot happens under the same
//! lock, so a sample never mixes counters from different instants.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::channel::DepthGauge;
use crate::database::Database;

/// Process-wide pipeline counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Completed captures pushed downstream.
    pub captures: u64,
    /// Flow files normalized into batches.
    pub processed: u64,
    /// Batches evaluated against the registry.
    pub predictions: u64,
    /// Alerts emitted.
    pub alerts: u64,
}

/// Shared handle over the counters. Cloned into each stage; stages mutate
/// only their own counter, the reporter only reads.
#[derive(Clone, Default)]
pub struct SharedStats {
    inner: Arc<Mutex<PipelineStats>>,
}

impl SharedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_captures(&self) {
        self.inner.lock().captures += 1;
    }

    pub fn incr_processed(&self) {
        self.inner.lock().processed += 1;
    }

    pub fn incr_predictions(&self) {
        self.inner.lock().predictions += 1;
    }

    pub fn incr_alerts(&self) {
        self.inner.lock().alerts += 1;
    }

    /// Copy of the counters alone.
    pub fn snapshot(&self) -> PipelineStats {
        self.inner.lock().clone()
    }

    /// Counters plus channel depths, read under the counters' lock.
    pub fn sample(&self, gauges: &[DepthGauge]) -> StatsSnapshot {
        let guard = self.inner.lock();
        let queues = gauges
            .iter()
            .map(|g| QueueDepth {
                name: g.name(),
                depth: g.depth(),
                capacity: g.capacity(),
            })
            .collect();
        StatsSnapshot {
            stats: guard.clone(),
            queues,
            sampled_at: Utc::now(),
        }
    }
}

/// Occupancy of one channel at sample time.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDepth {
    pub name: &'static str,
    pub depth: usize,
    pub capacity: usize,
}

/// One periodic sample: counters and queue depths at a single instant.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub stats: PipelineStats,
    pub queues: Vec<QueueDepth>,
    pub sampled_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Depth of the named queue, zero if absent.
    pub fn depth_of(&self, name: &str) -> usize {
        self.queues
            .iter()
            .find(|q| q.name == name)
            .map(|q| q.depth)
            .unwrap_or(0)
    }
}

/// Periodic read-only stats worker.
pub struct StatsReporter {
    stats: SharedStats,
    gauges: Vec<DepthGauge>,
    interval: Duration,
    db: Option<Database>,
}

impl StatsReporter {
    pub fn new(
        stats: SharedStats,
        gauges: Vec<DepthGauge>,
        interval: Duration,
        db: Option<Database>,
    ) -> Self {
        Self {
            stats,
            gauges,
            interval,
            db,
        }
    }

    /// Sample, log and forward forever.
    pub async fn run(self) {
        loop {
            tokio::time::sleep(self.interval).await;

            let snap = self.stats.sample(&self.gauges);
            let queues: Vec<String> = snap
                .queues
                .iter()
                .map(|q| format!("{}={}/{}", q.name, q.depth, q.capacity))
                .collect();
            info!(
                captures = snap.stats.captures,
                processed = snap.stats.processed,
                predictions = snap.stats.predictions,
                alerts = snap.stats.alerts,
                queues = %queues.join(" "),
                "pipeline stats"
            );

            if let Some(db) = &self.db {
                if let Err(e) = db.log_system_metrics(&snap) {
                    warn!("failed to record system metrics: {:#}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::channel::bounded;

    #[test]
    fn test_counter_accessors() {
        let stats = SharedStats::new();
        stats.incr_captures();
        stats.incr_captures();
        stats.incr_processed();
        stats.incr_alerts();

        let snap = stats.snapshot();
        assert_eq!(snap.captures, 2);
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.predictions, 0);
        assert_eq!(snap.alerts, 1);
    }

    #[tokio::test]
    async fn test_sample_includes_queue_depths() {
        let stats = SharedStats::new();
        let (tx, _rx, gauge) = bounded::<u32>("capture", 5);
        tx.push(1).await.unwrap();
        tx.push(2).await.unwrap();

        let snap = stats.sample(&[gauge]);
        assert_eq!(snap.depth_of("capture"), 2);
        assert_eq!(snap.depth_of("missing"), 0);
        assert_eq!(snap.queues[0].capacity, 5);
    }
}
