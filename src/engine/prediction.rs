//! Prediction stage
//!
//! Evaluates every registered attack type against each batch and hands the
//! result list straight to the alert manager within the same loop iteration.
//! Prediction and alerting share this consumer deliberately; there is nothing
//! to buffer between them.

use std::sync::Arc;

use tracing::{debug, info};

use super::channel::StageReceiver;
use super::stats::SharedStats;
use crate::alert::AlertManager;
use crate::detect::ClassifierRegistry;
use crate::flow::FlowRecordBatch;

/// Dedicated prediction + alerting worker.
pub struct PredictionWorker {
    rx: StageReceiver<FlowRecordBatch>,
    registry: Arc<ClassifierRegistry>,
    alerts: AlertManager,
    stats: SharedStats,
}

impl PredictionWorker {
    pub fn new(
        rx: StageReceiver<FlowRecordBatch>,
        registry: Arc<ClassifierRegistry>,
        alerts: AlertManager,
        stats: SharedStats,
    ) -> Self {
        Self {
            rx,
            registry,
            alerts,
            stats,
        }
    }

    /// Prediction loop. Runs until the normalization stage disappears.
    pub async fn run(mut self) {
        info!(classifiers = self.registry.len(), "prediction worker started");

        while let Some(batch) = self.rx.pop().await {
            debug!(rows = batch.len(), "evaluating batch");
            let results = self.registry.evaluate(&batch);
            self.stats.incr_predictions();
            self.alerts.handle_results(&results, &self.stats);
        }
    }
}
