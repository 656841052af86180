//! Pipeline engine
//!
//! Wires the five stage workers together with bounded channels and runs them
//! indefinitely.
//!
//! # Architecture
//! ```text
//! ┌──────────┐  capture:5   ┌────────────┐  processing:5  ┌───────────────┐
//! │ Capture  │─────────────▶│ Conversion │───────────────▶│ Normalization │
//! │ (tool)   │              │ (tool+strip)│               │ (csv → batch) │
//! └──────────┘              └────────────┘                └───────┬───────┘
//!                                                                 │ prediction:10
//!                                                                 ▼
//!                                                        ┌────────────────┐
//!                                                        │   Prediction   │
//!                                                        │  + Alerting    │
//!                                                        └────────────────┘
//!
//!                    ┌───────────────┐
//!                    │ Stats Reporter│  (samples counters + queue depths)
//!                    └───────────────┘
//! ```
//!
//! Every channel is bounded, so a slow downstream stage fills its input queue
//! and eventually stalls capture on `push`. That backpressure is the only
//! admission control the pipeline needs.

pub mod capture;
pub mod channel;
pub mod conversion;
pub mod normalize;
pub mod prediction;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alert::{AlertManager, AlertPolicy};
use crate::config::Config;
use crate::database::Database;
use crate::detect::ClassifierRegistry;

use capture::CaptureWorker;
use channel::bounded;
use conversion::ConversionWorker;
use normalize::NormalizeWorker;
use prediction::PredictionWorker;
use stats::{SharedStats, StatsReporter};

/// Builds and launches the staged pipeline.
pub struct PipelineEngine {
    config: Config,
}

impl PipelineEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Validate config, load the registry, open the metrics sink and spawn
    /// all five workers. Returns a handle over the running pipeline.
    pub fn start(self) -> Result<RunningPipeline> {
        self.config.validate()?;
        self.config
            .ensure_directories()
            .context("failed to bootstrap pipeline directories")?;

        let db = open_metrics_sink(&self.config);
        let registry = Arc::new(ClassifierRegistry::load(
            &self.config.detection.models_dir,
            &self.config.detection.attack_types,
        ));
        info!(classifiers = registry.len(), "classifier registry loaded");

        let stats = SharedStats::new();

        let (capture_tx, capture_rx, capture_gauge) =
            bounded("capture", self.config.channels.capture);
        let (flow_tx, flow_rx, processing_gauge) =
            bounded("processing", self.config.channels.processing);
        let (batch_tx, batch_rx, prediction_gauge) =
            bounded("prediction", self.config.channels.prediction);

        let alert_manager = AlertManager::new(
            AlertPolicy {
                report_threshold: self.config.detection.report_threshold,
                alert_threshold: self.config.detection.alert_threshold,
                reports_dir: self.config.alerts.reports_dir.clone(),
                templates_dir: self.config.alerts.templates_dir.clone(),
                static_dir: self.config.alerts.static_dir.clone(),
            },
            db.clone(),
        );

        let reporter = StatsReporter::new(
            stats.clone(),
            vec![capture_gauge, processing_gauge, prediction_gauge],
            Duration::from_secs(self.config.stats.interval_secs),
            db,
        );

        let handles = vec![
            tokio::spawn(
                CaptureWorker::new(self.config.capture.clone(), capture_tx, stats.clone()).run(),
            ),
            tokio::spawn(
                ConversionWorker::new(self.config.conversion.clone(), capture_rx, flow_tx).run(),
            ),
            tokio::spawn(NormalizeWorker::new(flow_rx, batch_tx, stats.clone()).run()),
            tokio::spawn(
                PredictionWorker::new(batch_rx, registry, alert_manager, stats.clone()).run(),
            ),
            tokio::spawn(reporter.run()),
        ];

        info!("pipeline started");
        Ok(RunningPipeline { stats, handles })
    }
}

/// Open the metrics sink, or run without one.
fn open_metrics_sink(config: &Config) -> Option<Database> {
    if !config.metrics.enabled {
        info!("metrics sink disabled");
        return None;
    }
    match Database::open(&config.metrics.db_path) {
        Ok(db) => {
            info!(path = %config.metrics.db_path.display(), "metrics sink opened");
            Some(db)
        }
        Err(e) => {
            warn!("metrics sink unavailable, continuing without it: {:#}", e);
            None
        }
    }
}

/// Handle over a launched pipeline.
pub struct RunningPipeline {
    stats: SharedStats,
    handles: Vec<JoinHandle<()>>,
}

impl RunningPipeline {
    /// Shared counters, for status output and the shutdown summary.
    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Abort every worker task.
    pub fn shutdown(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.capture.command = "false".to_string();
        config.capture.retry_backoff_secs = 60;
        config.capture.output_dir = root.join("captures");
        config.conversion.flow_dir = root.join("flows");
        config.detection.models_dir = root.join("models");
        config.alerts.reports_dir = root.join("reports");
        config.alerts.templates_dir = root.join("templates");
        config.alerts.static_dir = root.join("static");
        config.metrics.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_start_bootstraps_and_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let pipeline = PipelineEngine::new(config).start().unwrap();
        assert!(dir.path().join("captures").is_dir());
        assert!(dir.path().join("reports").is_dir());
        assert_eq!(pipeline.stats().snapshot().captures, 0);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.detection.report_threshold = 90.0;

        assert!(PipelineEngine::new(config).start().is_err());
    }

    #[tokio::test]
    async fn test_live_pipeline_end_to_end() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.capture.retry_backoff_secs = 1;

        // Capture stand-in: writes a header line plus two flow rows, one of
        // which is far over the model threshold.
        let script = dir.path().join("fake-dumpcap.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             while [ \"$1\" != \"-w\" ]; do shift; done\nshift\n\
             printf 'Header Line\\n' > \"$1\"\n\
             printf 'f1,10.0.0.5,443,10.0.0.9,80,6,ts,100\\n' >> \"$1\"\n\
             printf 'f2,10.0.0.6,443,10.0.0.9,80,6,ts,900\\n' >> \"$1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        config.capture.command = script.to_string_lossy().into_owned();
        // Extraction stand-in with the same (input, outdir) contract.
        config.conversion.command = "cp".to_string();
        config.detection.attack_types = vec!["Port_Scan".to_string()];

        std::fs::create_dir_all(&config.detection.models_dir).unwrap();
        let model = crate::detect::ModelFile {
            attack_type: "Port_Scan".to_string(),
            features: vec!["Flow Duration".to_string()],
            model: crate::detect::ModelSpec::Linear {
                weights: vec![1.0],
                bias: 0.0,
                threshold: 500.0,
            },
        };
        std::fs::write(
            config.detection.models_dir.join("Port_Scan.json"),
            serde_json::to_string(&model).unwrap(),
        )
        .unwrap();

        std::fs::create_dir_all(&config.alerts.templates_dir).unwrap();
        std::fs::write(
            config.alerts.templates_dir.join("Port_Scan.txt"),
            "ALERT {source_ip} {percentage}",
        )
        .unwrap();

        let static_dir = config.alerts.static_dir.clone();
        let pipeline = PipelineEngine::new(config).start().unwrap();

        // 50% anomalous clears both thresholds; wait for the alert.
        let mut alerted = false;
        for _ in 0..200 {
            if pipeline.stats().snapshot().alerts >= 1 {
                alerted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        pipeline.shutdown();
        assert!(alerted, "pipeline never emitted an alert");

        let snap = pipeline.stats().snapshot();
        assert!(snap.captures >= 1);
        assert!(snap.processed >= 1);
        assert!(snap.predictions >= 1);

        let text =
            std::fs::read_to_string(static_dir.join(crate::alert::CURRENT_ALERT_TEXT)).unwrap();
        assert_eq!(text, "ALERT 10.0.0.6 50%");
    }
}
