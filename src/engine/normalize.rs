//! Normalization stage
//!
//! Loads each flow file into an in-memory [`FlowRecordBatch`] against the
//! canonical column schema. Rounding and zero-filling happen inside the
//! reader, so everything downstream sees complete rows. Unparseable files are
//! dropped; the flow file is deleted after the attempt either way.

use std::path::Path;

use tracing::{debug, info, warn};

use super::channel::{StageReceiver, StageSender};
use super::stats::SharedStats;
use crate::flow::{self, FlowRecordBatch};
use crate::models::FlowFileArtifact;

/// Dedicated normalization worker.
pub struct NormalizeWorker {
    rx: StageReceiver<FlowFileArtifact>,
    tx: StageSender<FlowRecordBatch>,
    stats: SharedStats,
}

impl NormalizeWorker {
    pub fn new(
        rx: StageReceiver<FlowFileArtifact>,
        tx: StageSender<FlowRecordBatch>,
        stats: SharedStats,
    ) -> Self {
        Self { rx, tx, stats }
    }

    /// Normalization loop. Runs until the conversion stage disappears.
    pub async fn run(mut self) {
        info!("normalization worker started");

        while let Some(artifact) = self.rx.pop().await {
            match flow::read_flow_csv(&artifact.path) {
                Ok(batch) => {
                    debug!(
                        rows = batch.len(),
                        flow = %artifact.path.display(),
                        "flow file normalized"
                    );
                    if self.tx.push(batch).await.is_err() {
                        warn!("prediction stage gone, stopping normalization worker");
                        remove_best_effort(&artifact.path);
                        break;
                    }
                    self.stats.incr_processed();
                }
                Err(e) => warn!(
                    flow = %artifact.path.display(),
                    "failed to parse flow file, dropping: {:#}",
                    e
                ),
            }

            remove_best_effort(&artifact.path);
        }
    }
}

fn remove_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), "failed to delete flow file: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::channel::bounded;
    use crate::flow::schema;

    #[tokio::test]
    async fn test_flow_file_becomes_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.csv");
        std::fs::write(
            &path,
            "f1,192.168.1.5,443,10.0.0.9,80,6,2024-01-01 10:00:00,1000\n\
             f2,192.168.1.6,22,10.0.0.9,80,6,2024-01-01 10:00:01,2000\n",
        )
        .unwrap();

        let (flow_tx, flow_rx, _) = bounded("processing", 5);
        let (batch_tx, mut batch_rx, _) = bounded("prediction", 5);
        let stats = SharedStats::new();
        let worker = NormalizeWorker::new(flow_rx, batch_tx, stats.clone());

        flow_tx
            .push(FlowFileArtifact { path: path.clone() })
            .await
            .unwrap();
        drop(flow_tx);
        worker.run().await;

        let batch = batch_rx.pop().await.expect("batch expected");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.text(0, schema::SOURCE_IP), "192.168.1.5");
        assert_eq!(stats.snapshot().processed, 1);
        // Flow file deleted after normalization.
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unreadable_flow_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");

        let (flow_tx, flow_rx, _) = bounded("processing", 5);
        let (batch_tx, mut batch_rx, _) = bounded("prediction", 5);
        let stats = SharedStats::new();
        let worker = NormalizeWorker::new(flow_rx, batch_tx, stats.clone());

        flow_tx
            .push(FlowFileArtifact { path: missing })
            .await
            .unwrap();
        drop(flow_tx);
        worker.run().await;

        assert!(batch_rx.pop().await.is_none());
        assert_eq!(stats.snapshot().processed, 0);
    }
}
