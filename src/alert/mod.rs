//! Severity policy and alert emission
//!
//! Consumes the per-attack-type results of one batch and applies the
//! two-threshold policy: results above the report threshold get a durable
//! anomaly report and sink metrics; the single most severe of those, when it
//! also clears the alert threshold, becomes the current alert artifact pair
//! (rendered template text plus chart copy). Exactly one alert is "current" at
//! a time; a newer severe batch overwrites it.
//!
//! Nothing in here can take the pipeline down: every rendering, IO or sink
//! failure is logged and swallowed.

pub mod report;
pub mod template;
pub mod visualization;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::engine::stats::SharedStats;
use crate::models::{attack_slug, Alert, PredictionResult};

/// File name of the current rendered alert text.
pub const CURRENT_ALERT_TEXT: &str = "attack_details.txt";
/// File name of the current alert chart copy.
pub const CURRENT_ALERT_CHART: &str = "attack_chart.svg";

/// Threshold and directory configuration for the manager.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    /// Results strictly above this save an anomaly report.
    pub report_threshold: f64,
    /// The most severe result strictly above this emits an alert.
    pub alert_threshold: f64,
    pub reports_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

/// Applies the severity policy to each batch's result list.
pub struct AlertManager {
    policy: AlertPolicy,
    db: Option<Database>,
}

impl AlertManager {
    pub fn new(policy: AlertPolicy, db: Option<Database>) -> Self {
        Self { policy, db }
    }

    /// Handle one batch's results: visualizations and sink metrics for every
    /// clean result, reports above the report threshold, then at most one
    /// alert for the most severe result above the alert threshold.
    pub fn handle_results(&self, results: &[PredictionResult], stats: &SharedStats) {
        let mut report_paths: Vec<(&str, PathBuf)> = Vec::new();

        for result in results {
            if let Some(err) = &result.error {
                warn!(attack = %result.attack_type, "classifier failed: {}", err);
                continue;
            }

            if !result.verdicts.is_empty() {
                if let Err(e) = visualization::save_visualization(
                    &result.attack_type,
                    &result.verdicts,
                    &self.policy.static_dir,
                ) {
                    warn!(attack = %result.attack_type, "failed to save chart: {:#}", e);
                }
            }

            if let Some(db) = &self.db {
                if let Err(e) = db.log_attack_metrics(result) {
                    warn!(attack = %result.attack_type, "failed to record metrics: {:#}", e);
                }
            }

            if result.anomaly_percentage > self.policy.report_threshold {
                info!(
                    attack = %result.attack_type,
                    percentage = result.anomaly_percentage,
                    "anomalous traffic above report threshold"
                );
                if !result.anomalous_rows.is_empty() {
                    match report::save_anomaly_report(
                        &result.attack_type,
                        &result.anomalous_rows,
                        &self.policy.reports_dir,
                        Utc::now(),
                    ) {
                        Ok(path) => {
                            debug!(report = %path.display(), "saved anomaly report");
                            report_paths.push((result.attack_type.as_str(), path));
                        }
                        Err(e) => {
                            warn!(attack = %result.attack_type, "failed to save report: {:#}", e)
                        }
                    }
                }
            }
        }

        let Some(most_severe) = select_most_severe(results, self.policy.report_threshold) else {
            return;
        };

        if most_severe.anomaly_percentage > self.policy.alert_threshold {
            let report_file = report_paths
                .iter()
                .find(|(attack, _)| *attack == most_severe.attack_type)
                .map(|(_, path)| path.as_path());
            match self.emit_alert(most_severe, report_file) {
                Ok(()) => stats.incr_alerts(),
                Err(e) => warn!(attack = %most_severe.attack_type, "failed to emit alert: {:#}", e),
            }
        }
    }

    /// Render the template and overwrite the current-alert artifact pair.
    fn emit_alert(&self, result: &PredictionResult, report_file: Option<&Path>) -> Result<()> {
        let template_path = self
            .policy
            .templates_dir
            .join(format!("{}.txt", attack_slug(&result.attack_type)));
        let template = std::fs::read_to_string(&template_path)
            .with_context(|| format!("failed to read template: {}", template_path.display()))?;

        let source_ip = result.source_ip.as_deref().unwrap_or("Unknown");
        let rendered = template::render(&template, source_ip, result.anomaly_percentage);

        let text_path = self.policy.static_dir.join(CURRENT_ALERT_TEXT);
        std::fs::write(&text_path, rendered)
            .with_context(|| format!("failed to write alert text: {}", text_path.display()))?;

        let chart = visualization::chart_path(&result.attack_type, &self.policy.static_dir);
        if chart.exists() {
            std::fs::copy(&chart, self.policy.static_dir.join(CURRENT_ALERT_CHART))?;
        } else {
            debug!(attack = %result.attack_type, "no chart artifact to copy for alert");
        }

        let alert = Alert {
            attack_type: result.attack_type.clone(),
            source_ip: result.source_ip.clone(),
            percentage: result.anomaly_percentage,
            timestamp: Utc::now(),
        };
        info!(
            attack = %alert.attack_type,
            source_ip = %source_ip,
            percentage = alert.percentage,
            "alert emitted"
        );

        if let Some(db) = &self.db {
            let report = report_file.map(|p| p.to_string_lossy().into_owned());
            if let Err(e) = db.log_alert(&alert, report.as_deref()) {
                warn!("failed to record alert: {:#}", e);
            }
        }

        Ok(())
    }
}

/// Most severe result: highest percentage among error-free results strictly
/// above the report threshold. Ties keep the earliest result in registry
/// order (the comparison is strict).
pub fn select_most_severe(
    results: &[PredictionResult],
    report_threshold: f64,
) -> Option<&PredictionResult> {
    let mut best: Option<&PredictionResult> = None;
    for result in results {
        if result.error.is_some() || result.anomaly_percentage <= report_threshold {
            continue;
        }
        if best.map_or(true, |b| result.anomaly_percentage > b.anomaly_percentage) {
            best = Some(result);
        }
    }
    best
}
