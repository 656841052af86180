pub mod alert;
pub mod config;
pub mod database;
pub mod detect;
pub mod engine;
pub mod flow;
pub mod models;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use detect::ClassifierRegistry;
use engine::PipelineEngine;
use models::PredictionResult;

/// Core flowsentry instance
pub struct FlowSentry {
    config: Config,
}

impl FlowSentry {
    /// Create a new flowsentry instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the live pipeline until interrupted, then print final counters.
    pub async fn run(self) -> Result<()> {
        let pipeline = PipelineEngine::new(self.config).start()?;

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;

        let stats = pipeline.stats().snapshot();
        info!(
            captures = stats.captures,
            processed = stats.processed,
            predictions = stats.predictions,
            alerts = stats.alerts,
            "shutting down"
        );
        pipeline.shutdown();
        Ok(())
    }

    /// Classify an existing flow CSV against the configured registry without
    /// running the live pipeline. Returns one result per loaded classifier.
    pub fn analyze_file(&self, path: &Path) -> Result<Vec<PredictionResult>> {
        let batch = flow::read_flow_csv(path)?;
        info!(rows = batch.len(), "loaded flow file");

        let registry = ClassifierRegistry::load(
            &self.config.detection.models_dir,
            &self.config.detection.attack_types,
        );
        Ok(registry.evaluate(&batch))
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
