use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flow::FlowRecordBatch;

/// A finished packet capture, owned by whoever holds it until the conversion
/// stage deletes the file.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// A converted, header-stripped flow file awaiting normalization.
#[derive(Debug, Clone)]
pub struct FlowFileArtifact {
    pub path: PathBuf,
}

/// Per-row classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Benign traffic (encoded 1 by the classifiers).
    Normal,
    /// Anomalous traffic (encoded 0).
    Anomaly,
}

impl Verdict {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Verdict::Anomaly)
    }
}

/// Outcome of evaluating one attack type against one batch.
///
/// Invariant (when `error` is `None`): `normal_count + anomaly_count` equals
/// the number of rows evaluated, and `anomaly_percentage` is the rounded
/// anomaly share in `[0, 100]`.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub attack_type: String,
    /// Modal source IP among anomalous rows, when any exist.
    pub source_ip: Option<String>,
    pub anomaly_percentage: f64,
    pub normal_count: usize,
    pub anomaly_count: usize,
    /// The anomalous rows themselves, for report persistence.
    pub anomalous_rows: FlowRecordBatch,
    /// Row-aligned verdicts, for the visualization artifact.
    pub verdicts: Vec<Verdict>,
    /// Set when this classifier failed; the other results stay valid.
    pub error: Option<String>,
}

impl PredictionResult {
    /// A result representing a per-classifier failure.
    pub fn failed(attack_type: &str, error: String) -> Self {
        Self {
            attack_type: attack_type.to_string(),
            source_ip: None,
            anomaly_percentage: 0.0,
            normal_count: 0,
            anomaly_count: 0,
            anomalous_rows: FlowRecordBatch::new(),
            verdicts: Vec::new(),
            error: Some(error),
        }
    }

    /// Rows evaluated for this result.
    pub fn total(&self) -> usize {
        self.normal_count + self.anomaly_count
    }
}

/// An emitted alert; handed to the sinks, not retained.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub attack_type: String,
    pub source_ip: Option<String>,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

/// Filesystem-safe form of an attack-type name, used for model, chart and
/// report file names.
pub fn attack_slug(name: &str) -> String {
    name.replace([' ', '/'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_slug() {
        assert_eq!(attack_slug("Port_Scan"), "Port_Scan");
        assert_eq!(attack_slug("DoS GoldenEye"), "DoS_GoldenEye");
        assert_eq!(attack_slug("Web Attack"), "Web_Attack");
    }

    #[test]
    fn test_failed_result() {
        let r = PredictionResult::failed("Bot_Attack", "model exploded".into());
        assert_eq!(r.total(), 0);
        assert_eq!(r.anomaly_percentage, 0.0);
        assert!(r.error.is_some());
    }
}
